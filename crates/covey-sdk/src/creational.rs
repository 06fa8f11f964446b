//! Creational contexts (disposal tokens)
//!
//! A creational context travels with an instance from creation to teardown.
//! Dependent objects created while building an instance are recorded on it so
//! they can be destroyed together with their owner.

use crate::contextual::{Contextual, Instance};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a CreationalContext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CreationalContextId(u64);

impl CreationalContextId {
    /// Create a new unique context ID
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        CreationalContextId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for CreationalContextId {
    fn default() -> Self {
        Self::new()
    }
}

/// A dependent object owned by some creational context
#[derive(Clone)]
pub struct DependentInstance {
    /// Definition that produced the dependent
    pub definition: Arc<dyn Contextual>,
    /// The dependent instance as handed out
    pub instance: Instance,
    /// The dependent's own creational context
    pub context: Arc<CreationalContext>,
}

impl fmt::Debug for DependentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependentInstance")
            .field("definition", &self.definition.name())
            .field("context", &self.context.id())
            .finish()
    }
}

/// Disposal token threaded through creation and destruction
pub struct CreationalContext {
    id: CreationalContextId,
    dependents: Mutex<Vec<DependentInstance>>,
}

impl CreationalContext {
    /// Create a new, empty creational context
    pub fn new() -> Self {
        Self {
            id: CreationalContextId::new(),
            dependents: Mutex::new(Vec::new()),
        }
    }

    /// Create a new context already wrapped in an `Arc`
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Get the context ID
    pub fn id(&self) -> CreationalContextId {
        self.id
    }

    /// Record a dependent object that must be destroyed with this context's owner
    pub fn add_dependent(
        &self,
        definition: Arc<dyn Contextual>,
        instance: Instance,
        context: Arc<CreationalContext>,
    ) {
        self.dependents.lock().push(DependentInstance {
            definition,
            instance,
            context,
        });
    }

    /// Remove and return all recorded dependents, most recent first
    pub fn take_dependents(&self) -> Vec<DependentInstance> {
        let mut dependents = std::mem::take(&mut *self.dependents.lock());
        dependents.reverse();
        dependents
    }

    /// Number of recorded dependents
    pub fn dependent_count(&self) -> usize {
        self.dependents.lock().len()
    }
}

impl Default for CreationalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CreationalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreationalContext")
            .field("id", &self.id)
            .field("dependents", &self.dependent_count())
            .finish()
    }
}
