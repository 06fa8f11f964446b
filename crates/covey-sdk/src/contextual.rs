//! Bean definitions (contextuals) and their lifecycle hooks

use crate::class::RealizedProxyClass;
use crate::creational::CreationalContext;
use crate::descriptor::InterceptionStack;
use crate::error::HookResult;
use crate::scope::ScopeKind;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A live bean instance
///
/// Instances are compared by identity (`Arc::ptr_eq`), never structurally.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Category of a bean definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BeanKind {
    /// Container-managed class bean; receives post-construct callbacks
    #[default]
    Managed,
    /// Instance obtained from a producer method or field
    Producer,
    /// Container-internal bookkeeping bean; never wrapped in a proxy
    Internal,
}

/// A resolved bean definition
///
/// Created once by the surrounding container and shared read-only. The engine
/// keys caches by the identity of the `Arc` holding the definition (see
/// [`DefinitionKey`]), so two structurally equal definitions in different
/// allocations are different beans.
///
/// Only `produce` is mandatory; the remaining hooks default to no-ops.
pub trait Contextual: Send + Sync {
    /// Bean name for diagnostics
    fn name(&self) -> &str;

    /// Declared scope
    fn scope(&self) -> &ScopeKind;

    /// Bean category
    fn kind(&self) -> BeanKind {
        BeanKind::Managed
    }

    /// Decorators and interceptors attached to this bean
    fn stack(&self) -> &InterceptionStack;

    /// Proxy class already realized for this bean by the bytecode generator
    fn proxy_class(&self) -> Option<RealizedProxyClass> {
        None
    }

    /// Create a raw instance, or `None` if the producer yields nothing
    fn produce(&self, ctx: &CreationalContext) -> HookResult<Option<Instance>>;

    /// Populate the instance's injection points
    fn inject(&self, _instance: &Instance, _ctx: &CreationalContext) -> HookResult<()> {
        Ok(())
    }

    /// Run post-construct callbacks
    fn post_construct(&self, _instance: &Instance) -> HookResult<()> {
        Ok(())
    }

    /// Run pre-destroy callbacks
    fn pre_destroy(&self, _instance: &Instance) -> HookResult<()> {
        Ok(())
    }

    /// Release the instance
    fn destroy(&self, _instance: &Instance, _ctx: &CreationalContext) -> HookResult<()> {
        Ok(())
    }
}

impl fmt::Debug for dyn Contextual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contextual")
            .field("name", &self.name())
            .field("scope", self.scope())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Identity of a definition, derived from its `Arc` allocation
///
/// Only meaningful while the definition is alive; stores hold the `Arc`
/// alongside the key so the address cannot be reused underneath them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefinitionKey(usize);

impl DefinitionKey {
    /// Key for the given definition
    pub fn of(definition: &Arc<dyn Contextual>) -> Self {
        DefinitionKey(Arc::as_ptr(definition) as *const () as usize)
    }

    /// Get the raw key value
    pub fn as_usize(&self) -> usize {
        self.0
    }
}
