//! Covey SDK - collaborator-facing types for the contextual instance runtime
//!
//! This crate holds the types a container hands to the Covey engine without
//! depending on the engine itself:
//! - `Contextual` - a resolved bean definition and its lifecycle hooks
//! - `ScopeKind` / `BeanKind` - how instances of a definition are cached and created
//! - Interceptor and decorator descriptors (passivation metadata)
//! - `CreationalContext` - the disposal token threaded through creation and teardown
//! - `ProxyBlueprint` / `RealizedProxyClass` - generated proxy images and their loaded form
//! - `AnnotationManager` - the injection-point passivation query
//!
//! # Example
//!
//! ```ignore
//! use covey_sdk::{Contextual, CreationalContext, ScopeKind};
//!
//! let ctx = CreationalContext::new();
//! let instance = definition.produce(&ctx)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod annotation;
pub mod class;
pub mod contextual;
pub mod creational;
pub mod descriptor;
pub mod error;
pub mod scope;

pub use annotation::{AnnotationManager, PermissiveAnnotationManager};
pub use class::{ClassLayout, ProxyBlueprint, RealizedProxyClass};
pub use contextual::{BeanKind, Contextual, DefinitionKey, Instance};
pub use creational::{CreationalContext, CreationalContextId, DependentInstance};
pub use descriptor::{
    DecoratorDescriptor, DescriptorForm, InterceptionStack, InterceptorDescriptor,
    InterceptorSource,
};
pub use error::{HookError, HookResult};
pub use scope::{CachePolicy, ScopeKind, ScopeParseError, ScopeTag};
