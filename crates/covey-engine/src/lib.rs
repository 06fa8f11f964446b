//! Covey Engine
//!
//! Instance management for a dependency-injection runtime once a bean
//! definition has been resolved:
//! - **Context**: per-scope instance stores and the registry that routes
//!   lookups to them (`context` module)
//! - **Factory**: creation and teardown of contextual instances, including the
//!   raw-versus-proxy decision for dependent beans (`factory` module)
//! - **Proxy**: definition of generated proxy classes and allocation of their
//!   instances (`proxy` module)
//! - **Passivation**: validation of a bean's decorators and interceptors
//!   against passivation rules (`passivation` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use covey_engine::{EngineOptions, ScopeRegistry};
//! use covey_sdk::CreationalContext;
//!
//! let registry = ScopeRegistry::new(EngineOptions::default());
//! let ctx = CreationalContext::shared();
//! let instance = registry.instance(&definition, Some(&ctx))?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Engine configuration
pub mod config;

/// Scope stores and the scope registry
pub mod context;

/// Contextual instance creation and teardown
pub mod factory;

/// Passivation validation of interceptors and decorators
pub mod passivation;

/// Proxy class definition and allocation
pub mod proxy;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{EngineOptions, HostCapabilities};
pub use context::{InstanceRecord, ScopeRegistry, ScopeStore};
pub use factory::ContextualInstanceFactory;
pub use passivation::{PassivationValidator, PassivationViolation, ViolationKind};
pub use proxy::{DependentWrapper, ProxyClassLoader, ProxyError};

use covey_sdk::{HookError, ScopeKind};
use thiserror::Error;

/// Errors raised by scope stores and the instance factory
#[derive(Debug, Error)]
pub enum ContextError {
    /// The scope's store is not active
    #[error("Context with scope {scope} is not active with respect to the current thread")]
    NotActive {
        /// Scope of the inactive store
        scope: ScopeKind,
    },

    /// A proxy class could not be defined or instantiated
    #[error("Proxy generation failed: {0}")]
    ProxyGeneration(#[from] ProxyError),

    /// A definition breaks the passivation rules of its scope
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] PassivationViolation),

    /// A lifecycle hook of the definition failed
    #[error(transparent)]
    Hook(HookError),
}

impl From<HookError> for ContextError {
    fn from(err: HookError) -> Self {
        ContextError::Hook(err)
    }
}

/// Result type for context operations
pub type ContextResult<T> = Result<T, ContextError>;
