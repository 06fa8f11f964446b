//! Proxy blueprints and realized proxy classes
//!
//! The bytecode generator emits a [`ProxyBlueprint`]: an opaque image plus the
//! fully-qualified class name. Loading it into a class-loading unit yields a
//! [`RealizedProxyClass`], a cheap handle the engine uses to allocate proxy
//! instances.

use std::alloc::{Layout, LayoutError};
use std::fmt;
use std::sync::Arc;

/// Generated proxy class image, produced outside the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyBlueprint {
    /// Fully-qualified class name (`/` or `.` separated)
    pub name: String,
    /// Encoded proxy image
    pub bytes: Arc<[u8]>,
}

impl ProxyBlueprint {
    /// Create a blueprint from a name and encoded image
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Storage layout of a proxy class instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLayout {
    /// Size of an instance in bytes
    pub size: usize,
    /// Alignment requirement (power of two)
    pub align: usize,
}

impl ClassLayout {
    /// Create a layout description
    pub fn new(size: usize, align: usize) -> Self {
        Self { size, align }
    }

    /// Convert to an allocator layout
    pub fn to_layout(&self) -> Result<Layout, LayoutError> {
        Layout::from_size_align(self.size, self.align)
    }
}

struct ClassInner {
    name: String,
    layout: ClassLayout,
    initializer: Vec<u8>,
    defining_unit: String,
}

/// A proxy class loaded into a class-loading unit
///
/// Clones share the same class; equality is identity of the loaded class.
#[derive(Clone)]
pub struct RealizedProxyClass {
    inner: Arc<ClassInner>,
}

impl RealizedProxyClass {
    /// Create a loaded class handle
    ///
    /// `initializer` is the leading instance state written by the
    /// no-argument initializer; bytes past `layout.size` are dropped and the
    /// rest of the instance stays zeroed.
    pub fn new(
        name: impl Into<String>,
        layout: ClassLayout,
        initializer: Vec<u8>,
        defining_unit: impl Into<String>,
    ) -> Self {
        let mut initializer = initializer;
        initializer.truncate(layout.size);
        Self {
            inner: Arc::new(ClassInner {
                name: name.into(),
                layout,
                initializer,
                defining_unit: defining_unit.into(),
            }),
        }
    }

    /// Fully-qualified, dot-separated class name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Instance storage layout
    pub fn layout(&self) -> ClassLayout {
        self.inner.layout
    }

    /// Leading instance state produced by the no-argument initializer
    ///
    /// May be shorter than the instance; the remainder is zero.
    pub fn initializer(&self) -> &[u8] {
        &self.inner.initializer
    }

    /// Name of the unit the class was defined in
    pub fn defining_unit(&self) -> &str {
        &self.inner.defining_unit
    }

    /// Check if two handles refer to the same loaded class
    pub fn ptr_eq(&self, other: &RealizedProxyClass) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for RealizedProxyClass {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for RealizedProxyClass {}

impl fmt::Debug for RealizedProxyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealizedProxyClass")
            .field("name", &self.inner.name)
            .field("layout", &self.inner.layout)
            .field("defining_unit", &self.inner.defining_unit)
            .finish()
    }
}
