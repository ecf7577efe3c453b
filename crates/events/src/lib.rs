//! Domain events shared by every aggregate in the workspace.

pub mod event;

pub use event::Event;
