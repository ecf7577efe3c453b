//! `stockerp-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::{Entity, find_by_id};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, CompanyId, TenantId};
pub use value_object::ValueObject;
