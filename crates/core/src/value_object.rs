//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity: two analytic entries with the same root and
/// account are the same entry. They are compared by value and replaced, never
/// patched in place, when an aggregate event carries a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
