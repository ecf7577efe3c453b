//! Records with their own identity inside an aggregate.

/// Implemented by records that live inside an aggregate but keep their own
/// identity (analytic accounts inside a chart, lines inside a purchase).
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}

/// First entity in `items` with the given id.
pub fn find_by_id<'a, E: Entity>(items: &'a [E], id: &E::Id) -> Option<&'a E> {
    items.iter().find(|item| item.id() == id)
}
