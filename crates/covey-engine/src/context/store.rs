//! Per-scope instance store

use crate::factory::ContextualInstanceFactory;
use crate::passivation::PassivationValidator;
use crate::{ContextError, ContextResult};
use covey_sdk::{Contextual, CreationalContext, DefinitionKey, Instance, ScopeKind};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A cached instance together with what is needed to destroy it
#[derive(Clone)]
pub struct InstanceRecord {
    /// Definition the instance was created from
    pub definition: Arc<dyn Contextual>,
    /// The instance as handed out
    pub instance: Instance,
    /// Creational context the instance was created under
    pub context: Arc<CreationalContext>,
}

impl fmt::Debug for InstanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRecord")
            .field("definition", &self.definition.name())
            .field("context", &self.context.id())
            .finish()
    }
}

/// Instance cache of one scope
///
/// Lookups and creation run concurrently; [`destroy_all`](Self::destroy_all)
/// waits for them and excludes new ones while it drains the store. Shared
/// acquisitions are recursive because creating a bean may look up other beans
/// of the same scope, so a waiting `destroy_all` does not hold back new
/// readers: under steady lookup traffic teardown waits until the store goes
/// quiet. When two callers race to create the same bean, the first stored
/// instance wins and both callers receive it.
///
/// Once marked passivation-capable, the store validates every definition it
/// creates on a miss with the validator it was marked with.
pub struct ScopeStore {
    scope: ScopeKind,
    factory: Arc<ContextualInstanceFactory>,
    active: AtomicBool,
    passivation: OnceCell<PassivationValidator>,
    gate: RwLock<()>,
    entries: DashMap<DefinitionKey, InstanceRecord>,
}

impl ScopeStore {
    /// Create an inactive, empty store for `scope`
    pub fn new(scope: ScopeKind, factory: Arc<ContextualInstanceFactory>) -> Self {
        Self {
            scope,
            factory,
            active: AtomicBool::new(false),
            passivation: OnceCell::new(),
            gate: RwLock::new(()),
            entries: DashMap::new(),
        }
    }

    /// Scope this store caches
    pub fn scope(&self) -> &ScopeKind {
        &self.scope
    }

    /// Check if the store is active
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Activate or deactivate the store
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
        debug!(scope = %self.scope, active, "scope store activation changed");
    }

    fn check_active(&self) -> ContextResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(ContextError::NotActive {
                scope: self.scope.clone(),
            })
        }
    }

    /// Get the cached instance of `definition` without creating one
    pub fn get(&self, definition: &Arc<dyn Contextual>) -> ContextResult<Option<Instance>> {
        self.check_active()?;
        let _gate = self.gate.read_recursive();
        Ok(self
            .entries
            .get(&DefinitionKey::of(definition))
            .map(|record| Arc::clone(&record.instance)))
    }

    /// Get the cached instance of `definition`, creating it on a miss
    ///
    /// Without a creational context a miss returns `Ok(None)` and nothing is
    /// created. Dependent definitions are created on every call and never
    /// stored.
    #[tracing::instrument(level = "debug", skip_all, fields(scope = %self.scope, bean = definition.name()))]
    pub fn get_or_create(
        &self,
        definition: &Arc<dyn Contextual>,
        ctx: Option<&Arc<CreationalContext>>,
    ) -> ContextResult<Option<Instance>> {
        self.check_active()?;
        let _gate = self.gate.read_recursive();

        let key = DefinitionKey::of(definition);
        let dependent = definition.scope().is_dependent();

        if !dependent {
            if let Some(record) = self.entries.get(&key) {
                trace!("cache hit");
                return Ok(Some(Arc::clone(&record.instance)));
            }
        }

        let ctx = match ctx {
            Some(ctx) => ctx,
            None => return Ok(None),
        };

        if !dependent {
            if let Some(validator) = self.passivation.get() {
                validator.validate(definition.as_ref())?;
            }
        }

        let instance = match self.factory.create(definition, ctx)? {
            Some(instance) => instance,
            None => return Ok(None),
        };

        if dependent {
            return Ok(Some(instance));
        }

        match self.entries.entry(key) {
            Entry::Occupied(existing) => {
                debug!("instance created concurrently, discarding duplicate");
                Ok(Some(Arc::clone(&existing.get().instance)))
            }
            Entry::Vacant(slot) => {
                slot.insert(InstanceRecord {
                    definition: Arc::clone(definition),
                    instance: Arc::clone(&instance),
                    context: Arc::clone(ctx),
                });
                debug!("instance cached");
                Ok(Some(instance))
            }
        }
    }

    /// Drop the cached instance of `definition` without destroying it
    pub fn remove(&self, definition: &Arc<dyn Contextual>) -> Option<Instance> {
        let _gate = self.gate.read_recursive();
        self.entries
            .remove(&DefinitionKey::of(definition))
            .map(|(_, record)| record.instance)
    }

    /// Destroy every cached instance and empty the store
    ///
    /// The store is drained under the exclusive gate; teardown runs after the
    /// gate is released. Each record is torn down even if an earlier one
    /// failed, and the first failure is returned.
    #[tracing::instrument(level = "debug", skip_all, fields(scope = %self.scope))]
    pub fn destroy_all(&self) -> ContextResult<()> {
        let records: Vec<InstanceRecord> = {
            let _gate = self.gate.write();
            let keys: Vec<DefinitionKey> = self.entries.iter().map(|entry| *entry.key()).collect();
            keys.into_iter()
                .filter_map(|key| self.entries.remove(&key).map(|(_, record)| record))
                .collect()
        };

        if records.is_empty() {
            return Ok(());
        }
        debug!(count = records.len(), "destroying scope instances");

        let mut first_error = None;
        for record in records {
            if let Err(err) =
                self.factory
                    .destroy(&record.definition, &record.instance, &record.context)
            {
                warn!(bean = record.definition.name(), error = %err, "instance teardown failed");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Number of cached instances
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store holds no instances
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if an instance of `definition` is cached
    pub fn contains(&self, definition: &Arc<dyn Contextual>) -> bool {
        self.entries.contains_key(&DefinitionKey::of(definition))
    }

    /// Copy of every record currently held
    pub fn snapshot(&self) -> Vec<InstanceRecord> {
        let _gate = self.gate.read_recursive();
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Validate every cached definition and mark the store passivation-capable
    ///
    /// Fails with [`ContextError::Configuration`] on the first definition that
    /// breaks the passivation rules; the store is left unmarked. The check and
    /// the mark happen under the exclusive gate, so no creation can slip in
    /// between them. Later misses are validated with the first validator the
    /// store was marked with.
    ///
    /// Must not be called while creating a bean of this store.
    pub fn mark_passivation_capable(&self, validator: &PassivationValidator) -> ContextResult<()> {
        let _gate = self.gate.write();
        for entry in self.entries.iter() {
            validator.validate(entry.value().definition.as_ref())?;
        }
        if self.passivation.set(validator.clone()).is_ok() {
            debug!(scope = %self.scope, "scope store marked passivation capable");
        }
        Ok(())
    }

    /// Check if the store was marked passivation-capable
    pub fn is_passivation_capable(&self) -> bool {
        self.passivation.get().is_some()
    }
}

impl fmt::Debug for ScopeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeStore")
            .field("scope", &self.scope)
            .field("active", &self.is_active())
            .field("entries", &self.entries.len())
            .finish()
    }
}
