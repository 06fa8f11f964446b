//! Proxy instances
//!
//! A proxy instance is raw storage of its class layout plus write-once slots
//! for the delegate and creational context. The slots are filled after
//! allocation, so a proxy is usable before any initializer logic runs.

use covey_sdk::{CreationalContext, Instance, RealizedProxyClass};
use once_cell::sync::OnceCell;
use std::alloc::{alloc_zeroed, dealloc, Layout, LayoutError};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;
use thiserror::Error;

/// How a proxy instance was allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationRoute {
    /// Zeroed storage; the initializer never ran
    Uninitialized,
    /// Storage written by the class's no-argument initializer
    Constructor,
}

/// Errors raised while allocating proxy storage
#[derive(Debug, Error)]
pub enum AllocationError {
    /// The class layout is not a valid allocator layout
    #[error("Invalid instance layout: {0}")]
    InvalidLayout(#[from] LayoutError),

    /// The allocator returned null
    #[error("Out of memory allocating {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },
}

/// Heap storage for one proxy instance
pub struct ProxyStorage {
    ptr: NonNull<u8>,
    layout: Layout,
}

// Storage is exclusively owned and only read through shared references once built.
unsafe impl Send for ProxyStorage {}
unsafe impl Sync for ProxyStorage {}

impl ProxyStorage {
    /// Allocate zeroed storage for `layout`
    pub fn zeroed(layout: Layout) -> Result<Self, AllocationError> {
        if layout.size() == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                layout,
            });
        }

        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(AllocationError::OutOfMemory {
            size: layout.size(),
        })?;
        Ok(Self { ptr, layout })
    }

    /// Storage layout
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// View the storage as bytes
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for ProxyStorage {
    fn drop(&mut self) {
        if self.layout.size() != 0 {
            unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
        }
    }
}

impl fmt::Debug for ProxyStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyStorage")
            .field("size", &self.layout.size())
            .field("align", &self.layout.align())
            .finish()
    }
}

/// An instance of a realized proxy class
pub struct ProxyObject {
    class: RealizedProxyClass,
    storage: ProxyStorage,
    route: AllocationRoute,
    delegate: OnceCell<Instance>,
    context: OnceCell<Arc<CreationalContext>>,
}

impl ProxyObject {
    /// Allocate an instance of `class` using the given route
    pub(crate) fn allocate(
        class: &RealizedProxyClass,
        route: AllocationRoute,
    ) -> Result<Self, AllocationError> {
        let layout = class.layout().to_layout()?;
        let mut storage = ProxyStorage::zeroed(layout)?;

        if route == AllocationRoute::Constructor {
            let initializer = class.initializer();
            storage.as_bytes_mut()[..initializer.len()].copy_from_slice(initializer);
        }

        Ok(Self {
            class: class.clone(),
            storage,
            route,
            delegate: OnceCell::new(),
            context: OnceCell::new(),
        })
    }

    /// The proxy's class
    pub fn class(&self) -> &RealizedProxyClass {
        &self.class
    }

    /// Instance storage
    pub fn storage(&self) -> &ProxyStorage {
        &self.storage
    }

    /// How this instance was allocated
    pub fn route(&self) -> AllocationRoute {
        self.route
    }

    /// Set the object calls are forwarded to; returns `false` if already set
    pub fn bind_delegate(&self, delegate: Instance) -> bool {
        self.delegate.set(delegate).is_ok()
    }

    /// The object calls are forwarded to
    pub fn delegate(&self) -> Option<&Instance> {
        self.delegate.get()
    }

    /// Set the creational context; returns `false` if already set
    pub fn bind_context(&self, context: Arc<CreationalContext>) -> bool {
        self.context.set(context).is_ok()
    }

    /// The creational context the proxy was created under
    pub fn context(&self) -> Option<&Arc<CreationalContext>> {
        self.context.get()
    }
}

impl fmt::Debug for ProxyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyObject")
            .field("class", &self.class.name())
            .field("route", &self.route)
            .field("has_delegate", &self.delegate.get().is_some())
            .finish()
    }
}

/// Result of asking for a dependent-scope wrapper
#[derive(Debug, Clone)]
pub enum DependentWrapper {
    /// The bean has no interceptors or decorators; use the raw instance
    Unproxied,
    /// The wrapper to hand out in place of the raw instance
    Proxied(Instance),
}

impl DependentWrapper {
    /// Check if a wrapper was created
    pub fn is_proxy(&self) -> bool {
        matches!(self, DependentWrapper::Proxied(_))
    }
}

/// Check if an instance is a proxy object
pub fn is_proxy(instance: &Instance) -> bool {
    instance.downcast_ref::<ProxyObject>().is_some()
}

/// Get the delegate of a proxy, or the instance itself if it is not a proxy
pub fn unwrap_delegate(instance: &Instance) -> Instance {
    instance
        .downcast_ref::<ProxyObject>()
        .and_then(|proxy| proxy.delegate().cloned())
        .unwrap_or_else(|| Arc::clone(instance))
}
