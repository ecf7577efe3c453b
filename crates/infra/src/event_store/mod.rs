//! Append-only event store boundary.
//!
//! Defines how tenant-scoped event streams are stored and loaded without
//! making any storage assumptions.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
