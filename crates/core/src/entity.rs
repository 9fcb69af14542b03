//! Entity trait: identity that survives state changes.

/// An object whose equality is its identifier, not its attributes.
///
/// Repositories key their storage by [`Entity::id`].
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> Self::Id;
}
