//! Proxy class loading and instantiation
//!
//! Proxy classes arrive as encoded images from an external generator. The
//! [`ProxyClassLoader`] defines them into a class-loading unit, choosing the
//! first usable define route:
//!
//! 1. the unit's own primitive, or one inherited from an ancestor
//! 2. the same primitive, forced accessible by a privileged host
//! 3. the host's internal define primitive, resolved once and cached
//!
//! Instances are allocated without running the class initializer whenever the
//! host allows it, so injection can populate a proxy before any user logic.

mod host;
mod image;
mod loader;
mod object;
mod unit;

pub use host::{HostRuntime, NativeHost};
pub use image::{ImageError, ProxyImage, MAGIC, MAX_INSTANCE_SIZE, VERSION};
pub use loader::{DefineRoute, ProxyClassLoader};
pub use object::{
    is_proxy, unwrap_delegate, AllocationError, AllocationRoute, DependentWrapper, ProxyObject,
    ProxyStorage,
};
pub use unit::{
    normalize_class_name, AccessFlag, ClassLoadingUnit, ClassSpace, DefineError, DefinePrimitive,
    NativeDefinePrimitive,
};

use thiserror::Error;

/// Errors raised while defining or instantiating proxy classes
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Defining the class failed
    #[error("Failed to define proxy class {name}: {source}")]
    Define {
        /// Requested class name
        name: String,
        /// Underlying define failure
        #[source]
        source: DefineError,
    },

    /// No define primitive is reachable and the host has no internal one
    #[error("Cannot get an internal define primitive from host '{host}'")]
    InternalDefineUnavailable {
        /// Host name
        host: String,
    },

    /// A concurrent define won the race but the class cannot be found
    #[error("Proxy class {name} was defined concurrently but is not visible from unit '{unit}'")]
    LookupFailed {
        /// Normalized class name
        name: String,
        /// Unit searched
        unit: String,
    },

    /// Allocating an instance failed
    #[error("Failed to allocate instance of proxy class {class}: {source}")]
    Allocation {
        /// Class name
        class: String,
        /// Underlying allocation failure
        #[source]
        source: AllocationError,
    },

    /// The bean needs a proxy but none was realized for it
    #[error("No realized proxy class for bean '{definition}'")]
    MissingProxyClass {
        /// Bean name
        definition: String,
    },
}
