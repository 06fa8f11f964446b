//! Contextual instance creation and teardown
//!
//! Creation produces a raw instance, decides whether a dependent bean must be
//! handed out behind a proxy, injects the raw instance and runs its
//! post-construct callbacks. Lifecycle callbacks always see the raw instance,
//! never the proxy wrapping it.

use crate::proxy::{unwrap_delegate, DependentWrapper, ProxyClassLoader};
use crate::{ContextError, ContextResult};
use covey_sdk::{BeanKind, Contextual, CreationalContext, Instance};
use std::sync::Arc;
use tracing::{debug, warn};

/// Creates and destroys contextual instances
#[derive(Debug, Clone)]
pub struct ContextualInstanceFactory {
    loader: Arc<ProxyClassLoader>,
}

impl ContextualInstanceFactory {
    /// Create a factory using the given proxy loader
    pub fn new(loader: Arc<ProxyClassLoader>) -> Self {
        Self { loader }
    }

    /// The proxy loader used for dependent wrappers
    pub fn loader(&self) -> &Arc<ProxyClassLoader> {
        &self.loader
    }

    /// Create a new instance of `definition`
    ///
    /// Returns `Ok(None)` if the definition produced nothing; in that case no
    /// injection or post-construct takes place. A dependent bean with
    /// decorators or interceptors is returned as its proxy wrapper, while the
    /// raw instance underneath receives injection and post-construct.
    #[tracing::instrument(level = "debug", skip_all, fields(bean = definition.name()))]
    pub fn create(
        &self,
        definition: &Arc<dyn Contextual>,
        ctx: &Arc<CreationalContext>,
    ) -> ContextResult<Option<Instance>> {
        let raw = match definition.produce(ctx)? {
            Some(raw) => raw,
            None => {
                debug!("definition produced no instance");
                return Ok(None);
            }
        };

        let kind = definition.kind();
        let wrapper = if definition.scope().is_dependent() && kind != BeanKind::Internal {
            self.loader.create_dependent_wrapper(definition, &raw, ctx)?
        } else {
            DependentWrapper::Unproxied
        };

        definition.inject(&raw, ctx)?;
        if kind == BeanKind::Managed {
            definition.post_construct(&raw)?;
        }

        match wrapper {
            DependentWrapper::Proxied(proxy) => Ok(Some(proxy)),
            DependentWrapper::Unproxied => Ok(Some(raw)),
        }
    }

    /// Tear down an instance created by [`create`](Self::create)
    ///
    /// Runs pre-destroy, then destroy even if pre-destroy failed, then tears
    /// down every dependent recorded on `ctx`. The first failure is returned
    /// after all steps have run.
    #[tracing::instrument(level = "debug", skip_all, fields(bean = definition.name()))]
    pub fn destroy(
        &self,
        definition: &Arc<dyn Contextual>,
        instance: &Instance,
        ctx: &CreationalContext,
    ) -> ContextResult<()> {
        let raw = unwrap_delegate(instance);
        let mut first_error: Option<ContextError> = None;

        if let Err(err) = definition.pre_destroy(&raw) {
            warn!(bean = definition.name(), error = %err, "pre-destroy callback failed");
            first_error.get_or_insert(ContextError::Hook(err));
        }

        if let Err(err) = definition.destroy(&raw, ctx) {
            warn!(bean = definition.name(), error = %err, "destroy callback failed");
            first_error.get_or_insert(ContextError::Hook(err));
        }

        for dependent in ctx.take_dependents() {
            debug!(dependent = dependent.definition.name(), "destroying dependent instance");
            if let Err(err) =
                self.destroy(&dependent.definition, &dependent.instance, &dependent.context)
            {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
