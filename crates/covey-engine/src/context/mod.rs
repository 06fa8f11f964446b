//! Scope stores and the scope registry
//!
//! A [`ScopeStore`] caches the instances of one scope. The [`ScopeRegistry`]
//! owns one store per cached scope and routes instance lookups by the
//! definition's declared scope; dependent definitions bypass every store.

mod registry;
mod store;

pub use registry::ScopeRegistry;
pub use store::{InstanceRecord, ScopeStore};
