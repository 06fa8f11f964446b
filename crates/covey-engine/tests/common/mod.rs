//! Shared test doubles for engine integration tests

#![allow(dead_code)]

use covey_engine::proxy::{NativeHost, ProxyClassLoader};
use covey_engine::{ContextualInstanceFactory, HostCapabilities};
use covey_sdk::{
    BeanKind, ClassLayout, Contextual, CreationalContext, HookResult, Instance,
    InterceptionStack, RealizedProxyClass, ScopeKind,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Bean instance with observable injection state
#[derive(Debug, Default)]
pub struct Widget {
    pub serial: usize,
    pub injected: Mutex<Option<String>>,
    pub initialized: Mutex<bool>,
}

impl Widget {
    pub fn injected(&self) -> Option<String> {
        self.injected.lock().clone()
    }

    pub fn initialized(&self) -> bool {
        *self.initialized.lock()
    }
}

/// Configurable bean definition that records its lifecycle calls
pub struct TestBean {
    pub name: String,
    pub scope: ScopeKind,
    pub kind: BeanKind,
    pub stack: InterceptionStack,
    pub proxy: Option<RealizedProxyClass>,
    pub produces: bool,
    pub fail_inject: bool,
    pub fail_pre_destroy: bool,
    pub fail_destroy: bool,
    pub produced: AtomicUsize,
    pub calls: Mutex<Vec<String>>,
}

impl TestBean {
    pub fn new(name: &str, scope: ScopeKind) -> Self {
        Self {
            name: name.to_string(),
            scope,
            kind: BeanKind::Managed,
            stack: InterceptionStack::default(),
            proxy: None,
            produces: true,
            fail_inject: false,
            fail_pre_destroy: false,
            fail_destroy: false,
            produced: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_stack(mut self, stack: InterceptionStack) -> Self {
        self.proxy = Some(RealizedProxyClass::new(
            format!("{}$$Proxy", self.name),
            ClassLayout::new(16, 8),
            vec![0xAB; 16],
            "app",
        ));
        self.stack = stack;
        self
    }

    pub fn kind(mut self, kind: BeanKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn produced(&self) -> usize {
        self.produced.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }
}

impl Contextual for TestBean {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> &ScopeKind {
        &self.scope
    }

    fn kind(&self) -> BeanKind {
        self.kind
    }

    fn stack(&self) -> &InterceptionStack {
        &self.stack
    }

    fn proxy_class(&self) -> Option<RealizedProxyClass> {
        self.proxy.clone()
    }

    fn produce(&self, _ctx: &CreationalContext) -> HookResult<Option<Instance>> {
        self.record("produce");
        if !self.produces {
            return Ok(None);
        }
        let serial = self.produced.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Arc::new(Widget {
            serial,
            ..Widget::default()
        })))
    }

    fn inject(&self, instance: &Instance, _ctx: &CreationalContext) -> HookResult<()> {
        self.record("inject");
        if self.fail_inject {
            return Err(format!("cannot inject {}", self.name).into());
        }
        let widget = instance
            .downcast_ref::<Widget>()
            .ok_or("inject target is not a raw widget")?;
        *widget.injected.lock() = Some(format!("{}-dependency", self.name));
        Ok(())
    }

    fn post_construct(&self, instance: &Instance) -> HookResult<()> {
        self.record("post_construct");
        let widget = instance
            .downcast_ref::<Widget>()
            .ok_or("post-construct target is not a raw widget")?;
        *widget.initialized.lock() = true;
        Ok(())
    }

    fn pre_destroy(&self, instance: &Instance) -> HookResult<()> {
        self.record("pre_destroy");
        instance
            .downcast_ref::<Widget>()
            .ok_or("pre-destroy target is not a raw widget")?;
        if self.fail_pre_destroy {
            return Err(format!("pre-destroy failed for {}", self.name).into());
        }
        Ok(())
    }

    fn destroy(&self, _instance: &Instance, _ctx: &CreationalContext) -> HookResult<()> {
        self.record("destroy");
        if self.fail_destroy {
            return Err(format!("destroy failed for {}", self.name).into());
        }
        Ok(())
    }
}

pub fn definition(bean: &Arc<TestBean>) -> Arc<dyn Contextual> {
    Arc::clone(bean) as Arc<dyn Contextual>
}

pub fn loader() -> Arc<ProxyClassLoader> {
    loader_with(HostCapabilities::default())
}

pub fn loader_with(capabilities: HostCapabilities) -> Arc<ProxyClassLoader> {
    Arc::new(ProxyClassLoader::new(Arc::new(NativeHost::new(capabilities))))
}

pub fn factory() -> Arc<ContextualInstanceFactory> {
    Arc::new(ContextualInstanceFactory::new(loader()))
}
