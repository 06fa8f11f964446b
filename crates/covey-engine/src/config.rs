//! Engine configuration
//!
//! Options are plain structs with `Default`. They can also be read from JSON,
//! where every field is optional:
//!
//! ```json
//! {
//!   "host": { "uninit_allocation": false },
//!   "active_scopes": ["application", "request"]
//! }
//! ```

use covey_sdk::ScopeKind;
use serde::Deserialize;

/// Low-level facilities the host runtime offers to the proxy loader
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HostCapabilities {
    /// Privileged writes may force a guarded define primitive open
    pub privileged_access: bool,

    /// An internal define primitive is available as a last resort
    pub internal_define: bool,

    /// Instances may be allocated without running their initializer
    pub uninit_allocation: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            privileged_access: true,
            internal_define: true,
            uninit_allocation: true,
        }
    }
}

/// Options for building a [`ScopeRegistry`](crate::context::ScopeRegistry)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Host capabilities for the native host
    pub host: HostCapabilities,

    /// Scopes activated when the registry is built
    pub active_scopes: Vec<ScopeKind>,

    /// Validate passivating scope stores before marking them passivation-capable
    pub passivating_scopes_require_validation: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            host: HostCapabilities::default(),
            active_scopes: vec![ScopeKind::Application],
            passivating_scopes_require_validation: true,
        }
    }
}

impl EngineOptions {
    /// Parse options from a JSON document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
