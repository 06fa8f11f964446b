//! Scope registry

use super::store::ScopeStore;
use crate::config::EngineOptions;
use crate::factory::ContextualInstanceFactory;
use crate::passivation::PassivationValidator;
use crate::proxy::{HostRuntime, NativeHost, ProxyClassLoader};
use crate::{ContextError, ContextResult};
use covey_sdk::{CachePolicy, Contextual, CreationalContext, Instance, ScopeKind};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Scopes that always have a store
const BUILTIN_SCOPES: [ScopeKind; 4] = [
    ScopeKind::Application,
    ScopeKind::Session,
    ScopeKind::Request,
    ScopeKind::Conversation,
];

/// Owns one store per cached scope and routes instance lookups to them
pub struct ScopeRegistry {
    options: EngineOptions,
    factory: Arc<ContextualInstanceFactory>,
    validator: PassivationValidator,
    stores: RwLock<FxHashMap<ScopeKind, Arc<ScopeStore>>>,
}

impl ScopeRegistry {
    /// Create a registry on a native host configured from `options`
    pub fn new(options: EngineOptions) -> Self {
        let host = Arc::new(NativeHost::new(options.host.clone()));
        Self::with_host(options, host)
    }

    /// Create a registry on the given host
    ///
    /// Builtin scopes get a store each; scopes listed in
    /// `options.active_scopes` are activated, registering custom scopes as
    /// needed.
    pub fn with_host(options: EngineOptions, host: Arc<dyn HostRuntime>) -> Self {
        let loader = Arc::new(ProxyClassLoader::new(host));
        let factory = Arc::new(ContextualInstanceFactory::new(loader));

        let stores = BUILTIN_SCOPES
            .iter()
            .map(|scope| {
                let store = Arc::new(ScopeStore::new(scope.clone(), Arc::clone(&factory)));
                (scope.clone(), store)
            })
            .collect();

        let registry = Self {
            options,
            factory,
            validator: PassivationValidator::permissive(),
            stores: RwLock::new(stores),
        };
        for scope in registry.options.active_scopes.clone() {
            registry.activate(&scope);
        }
        registry
    }

    /// Replace the validator used for passivating scopes
    pub fn with_validator(mut self, validator: PassivationValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Options the registry was built with
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The shared instance factory
    pub fn factory(&self) -> &Arc<ContextualInstanceFactory> {
        &self.factory
    }

    /// Get the store of `scope`, if one is registered
    pub fn store(&self, scope: &ScopeKind) -> Option<Arc<ScopeStore>> {
        self.stores.read().get(scope).cloned()
    }

    /// Register a store for `scope`, returning the existing one if present
    ///
    /// Returns `None` for the dependent scope, which is never cached.
    pub fn register_scope(&self, scope: ScopeKind) -> Option<Arc<ScopeStore>> {
        if scope.cache_policy() == CachePolicy::Transient {
            return None;
        }
        if let Some(store) = self.store(&scope) {
            return Some(store);
        }

        let mut stores = self.stores.write();
        let store = stores.entry(scope.clone()).or_insert_with(|| {
            debug!(%scope, "registered scope store");
            Arc::new(ScopeStore::new(scope, Arc::clone(&self.factory)))
        });
        Some(Arc::clone(store))
    }

    /// Activate `scope`, registering its store if needed
    pub fn activate(&self, scope: &ScopeKind) {
        if let Some(store) = self.register_scope(scope.clone()) {
            store.set_active(true);
        }
    }

    /// Deactivate `scope`; its cached instances are kept
    pub fn deactivate(&self, scope: &ScopeKind) {
        if let Some(store) = self.store(scope) {
            store.set_active(false);
        }
    }

    /// Check if `scope` is active
    ///
    /// The dependent scope is always active.
    pub fn is_active(&self, scope: &ScopeKind) -> bool {
        if scope.is_dependent() {
            return true;
        }
        self.store(scope).is_some_and(|store| store.is_active())
    }

    /// Get or create the instance of `definition` in its declared scope
    ///
    /// Dependent definitions are created on every call (nothing is created
    /// without a creational context). Definitions of a passivating scope are
    /// validated before creation unless validation is disabled.
    pub fn instance(
        &self,
        definition: &Arc<dyn Contextual>,
        ctx: Option<&Arc<CreationalContext>>,
    ) -> ContextResult<Option<Instance>> {
        let scope = definition.scope();
        if scope.is_dependent() {
            return match ctx {
                Some(ctx) => self.factory.create(definition, ctx),
                None => Ok(None),
            };
        }

        let store = self.store(scope).ok_or_else(|| ContextError::NotActive {
            scope: scope.clone(),
        })?;

        if scope.is_passivating()
            && self.options.passivating_scopes_require_validation
            && ctx.is_some()
            && !store.contains(definition)
        {
            self.validator.validate(definition.as_ref())?;
        }

        store.get_or_create(definition, ctx)
    }

    /// Get the cached instance of `definition` without creating one
    pub fn get(&self, definition: &Arc<dyn Contextual>) -> ContextResult<Option<Instance>> {
        let scope = definition.scope();
        if scope.is_dependent() {
            return Ok(None);
        }
        match self.store(scope) {
            Some(store) => store.get(definition),
            None => Err(ContextError::NotActive {
                scope: scope.clone(),
            }),
        }
    }

    /// Validate the cached definitions of `scope` and mark it passivation-capable
    pub fn mark_passivation_capable(&self, scope: &ScopeKind) -> ContextResult<()> {
        let store = self.store(scope).ok_or_else(|| ContextError::NotActive {
            scope: scope.clone(),
        })?;
        store.mark_passivation_capable(&self.validator)
    }

    /// Destroy every instance cached in `scope`
    pub fn destroy_scope(&self, scope: &ScopeKind) -> ContextResult<()> {
        match self.store(scope) {
            Some(store) => store.destroy_all(),
            None => Ok(()),
        }
    }

    /// Destroy every instance in every scope
    ///
    /// All stores are destroyed even if one fails; the first failure is
    /// returned.
    pub fn destroy_all(&self) -> ContextResult<()> {
        let stores: Vec<Arc<ScopeStore>> = self.stores.read().values().cloned().collect();
        let mut first_error = None;
        for store in stores {
            if let Err(err) = store.destroy_all() {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Scopes with a registered store
    pub fn scopes(&self) -> Vec<ScopeKind> {
        let mut scopes: Vec<ScopeKind> = self.stores.read().keys().cloned().collect();
        scopes.sort_by_key(|scope| scope.name());
        scopes
    }
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl fmt::Debug for ScopeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeRegistry")
            .field("scopes", &self.scopes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covey_sdk::{DecoratorDescriptor, HookResult, InterceptionStack};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Bean {
        scope: ScopeKind,
        stack: InterceptionStack,
        produced: AtomicUsize,
    }

    impl Bean {
        fn new(scope: ScopeKind) -> Self {
            Self {
                scope,
                stack: InterceptionStack::default(),
                produced: AtomicUsize::new(0),
            }
        }
    }

    impl Contextual for Bean {
        fn name(&self) -> &str {
            "Bean"
        }

        fn scope(&self) -> &ScopeKind {
            &self.scope
        }

        fn stack(&self) -> &InterceptionStack {
            &self.stack
        }

        fn produce(&self, _ctx: &CreationalContext) -> HookResult<Option<Instance>> {
            self.produced.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Arc::new(())))
        }
    }

    #[test]
    fn test_default_registry_activates_application_only() {
        let registry = ScopeRegistry::default();

        assert!(registry.is_active(&ScopeKind::Application));
        assert!(registry.is_active(&ScopeKind::Dependent));
        assert!(!registry.is_active(&ScopeKind::Request));
        assert!(registry.store(&ScopeKind::Dependent).is_none());
        assert_eq!(
            registry.scopes(),
            vec![
                ScopeKind::Application,
                ScopeKind::Conversation,
                ScopeKind::Request,
                ScopeKind::Session,
            ]
        );
    }

    #[test]
    fn test_custom_scope_from_options() {
        let options = EngineOptions {
            active_scopes: vec![ScopeKind::Custom("batch".to_string())],
            ..EngineOptions::default()
        };
        let registry = ScopeRegistry::new(options);
        let batch = ScopeKind::Custom("batch".to_string());

        assert!(registry.is_active(&batch));
        assert!(!registry.is_active(&ScopeKind::Application));

        let definition: Arc<dyn Contextual> = Arc::new(Bean::new(batch.clone()));
        let ctx = CreationalContext::shared();
        let first = registry.instance(&definition, Some(&ctx)).unwrap().unwrap();
        let second = registry.instance(&definition, Some(&ctx)).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unregistered_scope_is_not_active() {
        let registry = ScopeRegistry::default();
        let definition: Arc<dyn Contextual> =
            Arc::new(Bean::new(ScopeKind::Custom("missing".to_string())));

        assert!(matches!(
            registry.instance(&definition, Some(&CreationalContext::shared())),
            Err(ContextError::NotActive { .. })
        ));
    }

    #[test]
    fn test_dependent_routing() {
        let registry = ScopeRegistry::default();
        let bean = Arc::new(Bean::new(ScopeKind::Dependent));
        let definition: Arc<dyn Contextual> = bean.clone();
        let ctx = CreationalContext::shared();

        assert!(registry.instance(&definition, None).unwrap().is_none());
        let first = registry.instance(&definition, Some(&ctx)).unwrap().unwrap();
        let second = registry.instance(&definition, Some(&ctx)).unwrap().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(bean.produced.load(Ordering::SeqCst), 2);
        assert!(registry.get(&definition).unwrap().is_none());
    }

    #[test]
    fn test_passivating_scope_validates_on_creation() {
        let registry = ScopeRegistry::new(EngineOptions {
            active_scopes: vec![ScopeKind::Session],
            ..EngineOptions::default()
        });
        let mut bean = Bean::new(ScopeKind::Session);
        bean.stack = InterceptionStack::new().decorator(DecoratorDescriptor::new("Audit", false));
        let bean = Arc::new(bean);
        let definition: Arc<dyn Contextual> = bean.clone();

        assert!(matches!(
            registry.instance(&definition, Some(&CreationalContext::shared())),
            Err(ContextError::Configuration(_))
        ));
        assert_eq!(bean.produced.load(Ordering::SeqCst), 0);

        let lenient = ScopeRegistry::new(EngineOptions {
            active_scopes: vec![ScopeKind::Session],
            passivating_scopes_require_validation: false,
            ..EngineOptions::default()
        });
        assert!(lenient
            .instance(&definition, Some(&CreationalContext::shared()))
            .unwrap()
            .is_some());
        assert!(lenient
            .mark_passivation_capable(&ScopeKind::Session)
            .is_err());
    }

    #[test]
    fn test_destroy_scope() {
        let registry = ScopeRegistry::default();
        let definition: Arc<dyn Contextual> = Arc::new(Bean::new(ScopeKind::Application));
        registry
            .instance(&definition, Some(&CreationalContext::shared()))
            .unwrap();

        registry.destroy_scope(&ScopeKind::Application).unwrap();
        assert!(registry.get(&definition).unwrap().is_none());
        assert!(registry.destroy_all().is_ok());
    }
}
