//! Device and subscription registry.
//!
//! The registry is the single owner of persistent device, subscription,
//! and membership state. Everything else goes through the `Registry`
//! trait: the backend for CRUD, the dispatcher for fan-out lookups, and
//! the MPNS connection for pruning devices whose channel URI is gone.

pub mod error;
pub mod memory;
pub mod registry;

pub use error::RegistryError;
pub use memory::InMemoryRegistry;
pub use registry::{RegisterOutcome, Registry, SharedRegistry};

use std::sync::Arc;

/// Creates the default registry backend.
///
/// Only the in-memory backend exists today; a database-backed
/// implementation slots in here without touching callers.
pub fn create_registry() -> SharedRegistry {
    Arc::new(InMemoryRegistry::new())
}
