//! Class-loading units and define primitives
//!
//! A class-loading unit is a namespace proxy classes are defined into. A unit
//! may declare a define primitive of its own or inherit one from an ancestor.
//! Primitives carry an access flag: a primitive that is not accessible must be
//! opened (or forced open by a privileged host) before it may be invoked.

use super::image::{ImageError, ProxyImage};
use covey_sdk::RealizedProxyClass;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by a define primitive
#[derive(Debug, Error)]
pub enum DefineError {
    /// A class with this name is already defined in the unit
    #[error("Duplicate class definition: {name} in unit '{unit}'")]
    Duplicate {
        /// Normalized class name
        name: String,
        /// Unit the class was defined in
        unit: String,
    },

    /// The primitive was invoked without being accessible
    #[error("Define primitive is not accessible from unit '{unit}'")]
    AccessDenied {
        /// Unit the define was attempted in
        unit: String,
    },

    /// The proxy image could not be decoded
    #[error("Malformed proxy image: {0}")]
    Malformed(#[from] ImageError),

    /// The image declares a different class than requested
    #[error("Proxy image declares class {found}, expected {expected}")]
    NameMismatch {
        /// Requested class name
        expected: String,
        /// Class name found in the image
        found: String,
    },
}

/// Normalize a class name to its dot-separated form
pub fn normalize_class_name(name: &str) -> String {
    name.replace('/', ".")
}

/// Accessibility state of a define primitive
pub struct AccessFlag {
    accessible: AtomicBool,
    guarded: bool,
}

impl AccessFlag {
    /// Already accessible
    pub fn open() -> Self {
        Self {
            accessible: AtomicBool::new(true),
            guarded: false,
        }
    }

    /// Not accessible, but a request for access is granted
    pub fn closed() -> Self {
        Self {
            accessible: AtomicBool::new(false),
            guarded: false,
        }
    }

    /// Not accessible, and requests for access are denied
    ///
    /// Only a privileged host write can open a guarded flag.
    pub fn guarded() -> Self {
        Self {
            accessible: AtomicBool::new(false),
            guarded: true,
        }
    }

    /// Check if the primitive may be invoked
    pub fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Acquire)
    }

    /// Check if ordinary access requests are denied
    pub fn is_guarded(&self) -> bool {
        self.guarded
    }

    /// Request access through the ordinary path
    pub fn request(&self) -> bool {
        if self.guarded {
            return false;
        }
        self.accessible.store(true, Ordering::Release);
        true
    }

    /// Privileged write of the access flag, bypassing the guard
    pub fn force(&self) {
        self.accessible.store(true, Ordering::Release);
    }
}

impl fmt::Debug for AccessFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessFlag")
            .field("accessible", &self.is_accessible())
            .field("guarded", &self.guarded)
            .finish()
    }
}

/// Primitive that turns a proxy image into a class inside a unit
pub trait DefinePrimitive: Send + Sync {
    /// Accessibility state of this primitive
    fn access(&self) -> &AccessFlag;

    /// Define `name` from `bytes` inside `unit`
    fn define(
        &self,
        unit: &dyn ClassLoadingUnit,
        name: &str,
        bytes: &[u8],
    ) -> Result<RealizedProxyClass, DefineError>;
}

/// Namespace proxy classes are defined into
pub trait ClassLoadingUnit: Send + Sync {
    /// Unit name for diagnostics
    fn name(&self) -> &str;

    /// Define primitive declared by this unit itself (not inherited)
    fn define_primitive(&self) -> Option<Arc<dyn DefinePrimitive>>;

    /// Parent unit, if any
    fn parent(&self) -> Option<Arc<dyn ClassLoadingUnit>>;

    /// Look up a class by its dot-separated name, delegating to ancestors
    fn find_class(&self, name: &str) -> Option<RealizedProxyClass>;

    /// Publish a freshly defined class into this unit
    ///
    /// Fails with [`DefineError::Duplicate`] if the name is already taken.
    fn publish(&self, class: RealizedProxyClass) -> Result<RealizedProxyClass, DefineError>;
}

/// Define primitive backed by the proxy image decoder
pub struct NativeDefinePrimitive {
    access: AccessFlag,
}

impl NativeDefinePrimitive {
    /// Create a primitive with the given accessibility
    pub fn new(access: AccessFlag) -> Self {
        Self { access }
    }
}

impl DefinePrimitive for NativeDefinePrimitive {
    fn access(&self) -> &AccessFlag {
        &self.access
    }

    fn define(
        &self,
        unit: &dyn ClassLoadingUnit,
        name: &str,
        bytes: &[u8],
    ) -> Result<RealizedProxyClass, DefineError> {
        if !self.access.is_accessible() {
            return Err(DefineError::AccessDenied {
                unit: unit.name().to_string(),
            });
        }

        let image = ProxyImage::decode(bytes)?;
        let expected = normalize_class_name(name);
        let found = normalize_class_name(&image.name);
        if expected != found {
            return Err(DefineError::NameMismatch { expected, found });
        }

        let class = RealizedProxyClass::new(found, image.layout, image.initializer, unit.name());
        unit.publish(class)
    }
}

impl fmt::Debug for NativeDefinePrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeDefinePrimitive")
            .field("access", &self.access)
            .finish()
    }
}

/// In-process class-loading unit
///
/// Classes are stored by dot-separated name. Lookups fall back to the parent
/// chain; definitions always land in this unit.
pub struct ClassSpace {
    name: String,
    parent: Option<Arc<dyn ClassLoadingUnit>>,
    primitive: Option<Arc<dyn DefinePrimitive>>,
    classes: DashMap<String, RealizedProxyClass>,
}

impl ClassSpace {
    /// Create a root unit declaring a closed native define primitive
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            primitive: Some(Arc::new(NativeDefinePrimitive::new(AccessFlag::closed()))),
            classes: DashMap::new(),
        }
    }

    /// Create a unit that declares no define primitive of its own
    pub fn without_primitive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            primitive: None,
            classes: DashMap::new(),
        }
    }

    /// Set the parent unit
    pub fn with_parent(mut self, parent: Arc<dyn ClassLoadingUnit>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Replace the declared define primitive
    pub fn with_primitive(mut self, primitive: Arc<dyn DefinePrimitive>) -> Self {
        self.primitive = Some(primitive);
        self
    }

    /// Number of classes defined directly in this unit
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Names of classes defined directly in this unit
    pub fn class_names(&self) -> Vec<String> {
        self.classes.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl ClassLoadingUnit for ClassSpace {
    fn name(&self) -> &str {
        &self.name
    }

    fn define_primitive(&self) -> Option<Arc<dyn DefinePrimitive>> {
        self.primitive.clone()
    }

    fn parent(&self) -> Option<Arc<dyn ClassLoadingUnit>> {
        self.parent.clone()
    }

    fn find_class(&self, name: &str) -> Option<RealizedProxyClass> {
        let name = normalize_class_name(name);
        if let Some(class) = self.classes.get(&name) {
            return Some(class.value().clone());
        }
        self.parent.as_ref().and_then(|parent| parent.find_class(&name))
    }

    fn publish(&self, class: RealizedProxyClass) -> Result<RealizedProxyClass, DefineError> {
        match self.classes.entry(class.name().to_string()) {
            Entry::Occupied(_) => Err(DefineError::Duplicate {
                name: class.name().to_string(),
                unit: self.name.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(class.clone());
                Ok(class)
            }
        }
    }
}

impl fmt::Debug for ClassSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassSpace")
            .field("name", &self.name)
            .field("has_parent", &self.parent.is_some())
            .field("has_primitive", &self.primitive.is_some())
            .field("classes", &self.classes.len())
            .finish()
    }
}
