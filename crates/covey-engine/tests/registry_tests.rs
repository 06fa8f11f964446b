//! Scope Registry Tests
//!
//! Covers routing of instance lookups by declared scope:
//! - Stores built from engine options
//! - Dependent routing without a store
//! - Scope activation and custom scopes
//! - Whole-registry teardown
//!
//! # Running Tests
//! ```bash
//! cargo test --test registry_tests
//! ```

mod common;

use common::{definition, TestBean};
use covey_engine::proxy::{is_proxy, NativeHost};
use covey_engine::{ContextError, EngineOptions, ScopeRegistry};
use covey_sdk::{CreationalContext, DecoratorDescriptor, InterceptionStack, ScopeKind};
use std::sync::Arc;

// ===== Construction Tests =====

#[test]
fn test_options_from_json_drive_activation() {
    let options = EngineOptions::from_json(
        r#"{ "active_scopes": ["application", "request", "custom:tenant"] }"#,
    )
    .unwrap();
    let registry = ScopeRegistry::new(options);

    assert!(registry.is_active(&ScopeKind::Application));
    assert!(registry.is_active(&ScopeKind::Request));
    assert!(registry.is_active(&ScopeKind::Custom("tenant".to_string())));
    assert!(!registry.is_active(&ScopeKind::Session));
    assert_eq!(registry.scopes().len(), 5);
}

#[test]
fn test_registry_on_custom_host() {
    let host = Arc::new(NativeHost::default());
    let registry = ScopeRegistry::with_host(EngineOptions::default(), host);
    assert!(registry.is_active(&ScopeKind::Application));
    assert_eq!(registry.factory().loader().host().name(), "native");
}

#[test]
fn test_dependent_scope_has_no_store() {
    let registry = ScopeRegistry::default();
    assert!(registry.register_scope(ScopeKind::Dependent).is_none());
    assert!(registry.store(&ScopeKind::Dependent).is_none());
}

// ===== Routing Tests =====

#[test]
fn test_cached_scope_routes_to_its_store() {
    let registry = ScopeRegistry::new(EngineOptions {
        active_scopes: vec![ScopeKind::Application, ScopeKind::Request],
        ..EngineOptions::default()
    });
    let app = Arc::new(TestBean::new("Config", ScopeKind::Application));
    let req = Arc::new(TestBean::new("Greeting", ScopeKind::Request));
    let ctx = CreationalContext::shared();

    registry.instance(&definition(&app), Some(&ctx)).unwrap();
    registry.instance(&definition(&req), Some(&ctx)).unwrap();

    assert!(registry
        .store(&ScopeKind::Application)
        .unwrap()
        .contains(&definition(&app)));
    assert!(!registry
        .store(&ScopeKind::Application)
        .unwrap()
        .contains(&definition(&req)));
    assert_eq!(registry.store(&ScopeKind::Request).unwrap().len(), 1);
}

#[test]
fn test_inactive_scope_is_reported() {
    let registry = ScopeRegistry::default();
    let bean = Arc::new(TestBean::new("Greeting", ScopeKind::Request));

    let err = registry
        .instance(&definition(&bean), Some(&CreationalContext::shared()))
        .unwrap_err();

    assert!(matches!(
        err,
        ContextError::NotActive {
            scope: ScopeKind::Request
        }
    ));
    assert_eq!(bean.produced(), 0);
}

#[test]
fn test_activation_round_trip() {
    let registry = ScopeRegistry::default();
    let bean = Arc::new(TestBean::new("Greeting", ScopeKind::Request));
    let def = definition(&bean);
    let ctx = CreationalContext::shared();

    registry.activate(&ScopeKind::Request);
    let created = registry.instance(&def, Some(&ctx)).unwrap().unwrap();

    registry.deactivate(&ScopeKind::Request);
    assert!(registry.get(&def).is_err());

    registry.activate(&ScopeKind::Request);
    assert!(Arc::ptr_eq(&registry.get(&def).unwrap().unwrap(), &created));
}

#[test]
fn test_decorated_dependent_through_registry_is_wrapped() {
    let registry = ScopeRegistry::default();
    let bean = Arc::new(
        TestBean::new("Audited", ScopeKind::Dependent)
            .with_stack(InterceptionStack::new().decorator(DecoratorDescriptor::new("Audit", true))),
    );

    let instance = registry
        .instance(&definition(&bean), Some(&CreationalContext::shared()))
        .unwrap()
        .unwrap();
    assert!(is_proxy(&instance));
}

// ===== Teardown Tests =====

#[test]
fn test_destroy_all_clears_every_scope() {
    let registry = ScopeRegistry::new(EngineOptions {
        active_scopes: vec![ScopeKind::Application, ScopeKind::Session],
        passivating_scopes_require_validation: false,
        ..EngineOptions::default()
    });
    let app = Arc::new(TestBean::new("Config", ScopeKind::Application));
    let session = Arc::new(TestBean::new("Cart", ScopeKind::Session));
    let ctx = CreationalContext::shared();
    registry.instance(&definition(&app), Some(&ctx)).unwrap();
    registry.instance(&definition(&session), Some(&ctx)).unwrap();

    registry.destroy_all().unwrap();

    assert!(registry.get(&definition(&app)).unwrap().is_none());
    assert!(registry.get(&definition(&session)).unwrap().is_none());
    assert!(app.calls().contains(&"destroy".to_string()));
    assert!(session.calls().contains(&"destroy".to_string()));
}

#[test]
fn test_destroy_scope_leaves_other_scopes() {
    let registry = ScopeRegistry::new(EngineOptions {
        active_scopes: vec![ScopeKind::Application, ScopeKind::Request],
        ..EngineOptions::default()
    });
    let app = Arc::new(TestBean::new("Config", ScopeKind::Application));
    let req = Arc::new(TestBean::new("Greeting", ScopeKind::Request));
    let ctx = CreationalContext::shared();
    registry.instance(&definition(&app), Some(&ctx)).unwrap();
    registry.instance(&definition(&req), Some(&ctx)).unwrap();

    registry.destroy_scope(&ScopeKind::Request).unwrap();

    assert!(registry.get(&definition(&req)).unwrap().is_none());
    assert!(registry.get(&definition(&app)).unwrap().is_some());
}
