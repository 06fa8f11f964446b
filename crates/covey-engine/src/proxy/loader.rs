//! Proxy class loader

use super::host::HostRuntime;
use super::object::{AllocationRoute, DependentWrapper, ProxyObject};
use super::unit::{normalize_class_name, ClassLoadingUnit, DefineError, DefinePrimitive};
use super::ProxyError;
use arc_swap::ArcSwapOption;
use covey_sdk::{Contextual, CreationalContext, Instance, ProxyBlueprint, RealizedProxyClass};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Which primitive defined a class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineRoute {
    /// Primitive declared by the target unit
    Declared,
    /// Primitive inherited from an ancestor `depth` levels up
    Inherited {
        /// Distance to the declaring ancestor
        depth: usize,
    },
    /// Primitive opened with a privileged host write
    Forced {
        /// Distance to the declaring unit (0 = target unit)
        depth: usize,
    },
    /// Host's internal define primitive
    Internal,
}

struct ResolvedPrimitive(Arc<dyn DefinePrimitive>);

/// Defines proxy classes from images and allocates bare instances
///
/// The internal define primitive and the allocation route are resolved on
/// first use and never re-probed.
pub struct ProxyClassLoader {
    host: Arc<dyn HostRuntime>,
    internal_define: ArcSwapOption<ResolvedPrimitive>,
    resolution_lock: Mutex<()>,
    allocation_route: OnceCell<AllocationRoute>,
}

impl ProxyClassLoader {
    /// Create a loader on top of the given host
    pub fn new(host: Arc<dyn HostRuntime>) -> Self {
        Self {
            host,
            internal_define: ArcSwapOption::empty(),
            resolution_lock: Mutex::new(()),
            allocation_route: OnceCell::new(),
        }
    }

    /// The host runtime
    pub fn host(&self) -> &Arc<dyn HostRuntime> {
        &self.host
    }

    /// Define a class from a generator blueprint
    pub fn define_class(
        &self,
        unit: &dyn ClassLoadingUnit,
        blueprint: &ProxyBlueprint,
    ) -> Result<RealizedProxyClass, ProxyError> {
        self.define_class_bytes(unit, &blueprint.name, &blueprint.bytes)
    }

    /// Define `name` from `bytes` inside `unit`
    ///
    /// If another caller defined the same name first, the already-published
    /// class is returned instead of an error.
    #[tracing::instrument(level = "debug", skip_all, fields(unit = unit.name(), class = name))]
    pub fn define_class_bytes(
        &self,
        unit: &dyn ClassLoadingUnit,
        name: &str,
        bytes: &[u8],
    ) -> Result<RealizedProxyClass, ProxyError> {
        let (primitive, route) = self.select_primitive(unit)?;
        debug!(?route, "defining proxy class");

        match primitive.define(unit, name, bytes) {
            Ok(defined) => Ok(unit.find_class(defined.name()).unwrap_or(defined)),
            Err(DefineError::Duplicate { .. }) => {
                let normalized = normalize_class_name(name);
                debug!("proxy class already defined, reusing published class");
                unit.find_class(&normalized)
                    .ok_or_else(|| ProxyError::LookupFailed {
                        name: normalized,
                        unit: unit.name().to_string(),
                    })
            }
            Err(source) => Err(ProxyError::Define {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn select_primitive(
        &self,
        unit: &dyn ClassLoadingUnit,
    ) -> Result<(Arc<dyn DefinePrimitive>, DefineRoute), ProxyError> {
        if let Some((primitive, depth)) = find_declared_primitive(unit) {
            let access = primitive.access();
            if access.is_accessible() || access.request() {
                let route = if depth == 0 {
                    DefineRoute::Declared
                } else {
                    DefineRoute::Inherited { depth }
                };
                return Ok((primitive, route));
            }

            if self.host.force_accessible(primitive.as_ref()) {
                return Ok((primitive, DefineRoute::Forced { depth }));
            }
            debug!(depth, "define primitive is guarded, falling back to internal define");
        }

        Ok((self.internal_define()?, DefineRoute::Internal))
    }

    fn internal_define(&self) -> Result<Arc<dyn DefinePrimitive>, ProxyError> {
        if let Some(resolved) = self.internal_define.load_full() {
            return Ok(Arc::clone(&resolved.0));
        }

        let _guard = self.resolution_lock.lock();
        if let Some(resolved) = self.internal_define.load_full() {
            return Ok(Arc::clone(&resolved.0));
        }

        let primitive =
            self.host
                .resolve_internal_define()
                .ok_or_else(|| ProxyError::InternalDefineUnavailable {
                    host: self.host.name().to_string(),
                })?;
        debug!(host = self.host.name(), "resolved internal define primitive");

        let resolved = Arc::new(ResolvedPrimitive(Arc::clone(&primitive)));
        let _ = self
            .internal_define
            .compare_and_swap(&None::<Arc<ResolvedPrimitive>>, Some(resolved));
        Ok(primitive)
    }

    /// Check if the internal define primitive has been resolved
    pub fn internal_define_resolved(&self) -> bool {
        self.internal_define.load().is_some()
    }

    /// Allocate an instance of `class` without running its initializer
    ///
    /// Hosts that forbid uninitialized allocation get the initializer path
    /// instead, which writes the class's initializer state into the storage.
    pub fn allocate_instance(&self, class: &RealizedProxyClass) -> Result<ProxyObject, ProxyError> {
        ProxyObject::allocate(class, self.allocation_route()).map_err(|source| {
            ProxyError::Allocation {
                class: class.name().to_string(),
                source,
            }
        })
    }

    /// Allocation route in use, probed on first call
    pub fn allocation_route(&self) -> AllocationRoute {
        *self.allocation_route.get_or_init(|| {
            if self.host.supports_uninit_allocation() {
                AllocationRoute::Uninitialized
            } else {
                info!(
                    host = self.host.name(),
                    "uninitialized allocation unavailable, proxies will run their initializer"
                );
                AllocationRoute::Constructor
            }
        })
    }

    /// Wrap a raw dependent instance in its proxy if the bean has participants
    ///
    /// Returns [`DependentWrapper::Unproxied`] when the bean has no
    /// interceptors or decorators that need call routing.
    pub fn create_dependent_wrapper(
        &self,
        definition: &Arc<dyn Contextual>,
        raw: &Instance,
        ctx: &Arc<CreationalContext>,
    ) -> Result<DependentWrapper, ProxyError> {
        if !definition.stack().requires_proxy() {
            return Ok(DependentWrapper::Unproxied);
        }

        let class = definition
            .proxy_class()
            .ok_or_else(|| ProxyError::MissingProxyClass {
                definition: definition.name().to_string(),
            })?;

        let proxy = self.allocate_instance(&class)?;
        proxy.bind_delegate(Arc::clone(raw));
        proxy.bind_context(Arc::clone(ctx));
        debug!(
            bean = definition.name(),
            class = class.name(),
            "created dependent proxy"
        );

        Ok(DependentWrapper::Proxied(Arc::new(proxy)))
    }
}

impl fmt::Debug for ProxyClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyClassLoader")
            .field("host", &self.host.name())
            .field("internal_define_resolved", &self.internal_define_resolved())
            .field("allocation_route", &self.allocation_route.get())
            .finish()
    }
}

/// Find the nearest define primitive declared by `unit` or one of its ancestors
fn find_declared_primitive(
    unit: &dyn ClassLoadingUnit,
) -> Option<(Arc<dyn DefinePrimitive>, usize)> {
    if let Some(primitive) = unit.define_primitive() {
        return Some((primitive, 0));
    }

    let mut depth = 1;
    let mut current = unit.parent();
    while let Some(ancestor) = current {
        if let Some(primitive) = ancestor.define_primitive() {
            return Some((primitive, depth));
        }
        current = ancestor.parent();
        depth += 1;
    }
    None
}
