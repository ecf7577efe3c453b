//! Infrastructure layer: event store, command dispatch, config and the
//! purchase workflow that wires the domain crates together.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod workflow;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use config::{Config, ConfigError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use workflow::{NewAccount, NewLine, NewLocation, PurchaseWorkflow};
