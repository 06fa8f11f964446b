//! Host runtime capabilities
//!
//! The host decides which low-level facilities the proxy loader may use:
//! privileged writes of a primitive's access flag, an internal define
//! primitive for units that expose none, and allocation of instances without
//! running their initializer.

use super::unit::{AccessFlag, DefinePrimitive, NativeDefinePrimitive};
use crate::config::HostCapabilities;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Low-level facilities offered by the host runtime
pub trait HostRuntime: Send + Sync {
    /// Host name for diagnostics
    fn name(&self) -> &str;

    /// Force the primitive's access flag open with a privileged write
    ///
    /// Returns `false` if the host has no privileged access.
    fn force_accessible(&self, primitive: &dyn DefinePrimitive) -> bool;

    /// Resolve the host's internal define primitive
    ///
    /// Expensive; the loader calls this at most once and caches the result.
    fn resolve_internal_define(&self) -> Option<Arc<dyn DefinePrimitive>>;

    /// Check if instances may be allocated without running their initializer
    fn supports_uninit_allocation(&self) -> bool;
}

/// In-process host with configurable capabilities
#[derive(Debug)]
pub struct NativeHost {
    capabilities: HostCapabilities,
    internal_resolutions: AtomicUsize,
}

impl NativeHost {
    /// Create a host offering the given capabilities
    pub fn new(capabilities: HostCapabilities) -> Self {
        Self {
            capabilities,
            internal_resolutions: AtomicUsize::new(0),
        }
    }

    /// Capabilities this host was configured with
    pub fn capabilities(&self) -> &HostCapabilities {
        &self.capabilities
    }

    /// How many times the internal define primitive was resolved
    pub fn internal_resolutions(&self) -> usize {
        self.internal_resolutions.load(Ordering::Acquire)
    }
}

impl Default for NativeHost {
    fn default() -> Self {
        Self::new(HostCapabilities::default())
    }
}

impl HostRuntime for NativeHost {
    fn name(&self) -> &str {
        "native"
    }

    fn force_accessible(&self, primitive: &dyn DefinePrimitive) -> bool {
        if !self.capabilities.privileged_access {
            return false;
        }
        primitive.access().force();
        true
    }

    fn resolve_internal_define(&self) -> Option<Arc<dyn DefinePrimitive>> {
        if !self.capabilities.internal_define {
            return None;
        }
        self.internal_resolutions.fetch_add(1, Ordering::AcqRel);
        Some(Arc::new(NativeDefinePrimitive::new(AccessFlag::open())))
    }

    fn supports_uninit_allocation(&self) -> bool {
        self.capabilities.uninit_allocation
    }
}
