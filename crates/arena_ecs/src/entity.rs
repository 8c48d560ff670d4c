//! Entity handles and allocation.
//!
//! An [`Entity`] is an opaque (index, generation) pair. Indices are recycled
//! after destruction; the generation distinguishes a stale handle from the
//! live entity currently occupying the same index. Every store operation
//! validates the generation so that a handle held across a destruction fails
//! with [`StoreError::StaleEntity`](crate::StoreError::StaleEntity) instead of
//! silently touching the wrong entity.

use serde::{Deserialize, Serialize};

/// An opaque entity handle.
///
/// Entities carry no data of their own — components attached through the
/// [`ComponentStore`](crate::ComponentStore) give them meaning. The handle is
/// only valid while the generation matches the allocator's current generation
/// for its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// Reconstruct a handle from its raw parts.
    ///
    /// Intended for deserialisation and tests; handles obtained this way are
    /// subject to the same generation validation as any other.
    #[must_use]
    pub const fn from_raw(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// The slot index this handle refers to.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// The generation the slot had when this handle was issued.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

/// Allocates entity handles, recycling indices through a free list.
///
/// Freeing a slot bumps its generation, invalidating every handle issued for
/// the previous occupant.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    /// Current generation per slot index.
    generations: Vec<u32>,
    /// Indices available for reuse.
    free: Vec<u32>,
}

impl EntityAllocator {
    /// Creates an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a handle, reusing a freed index when one is available.
    pub fn allocate(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            Entity {
                index,
                generation: self.generations[index as usize],
            }
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            Entity {
                index,
                generation: 0,
            }
        }
    }

    /// Frees a handle, invalidating it and all copies of it.
    ///
    /// Returns `false` if the handle was already stale.
    pub fn free(&mut self, entity: Entity) -> bool {
        if !self.is_live(entity) {
            return false;
        }
        let slot = &mut self.generations[entity.index as usize];
        *slot = slot.wrapping_add(1);
        self.free.push(entity.index);
        true
    }

    /// Returns `true` if the handle refers to the slot's current occupant.
    #[must_use]
    pub fn is_live(&self, entity: Entity) -> bool {
        self.generations
            .get(entity.index as usize)
            .is_some_and(|&generation| generation == entity.generation)
    }

    /// Number of live entities.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.generations.len() - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_unique_indices() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert_ne!(a, b);
        assert_eq!(alloc.live_count(), 2);
    }

    #[test]
    fn test_free_invalidates_handle() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        assert!(alloc.is_live(e));
        assert!(alloc.free(e));
        assert!(!alloc.is_live(e));
    }

    #[test]
    fn test_double_free_rejected() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        assert!(alloc.free(e));
        assert!(!alloc.free(e));
    }

    #[test]
    fn test_index_reuse_bumps_generation() {
        let mut alloc = EntityAllocator::new();
        let old = alloc.allocate();
        alloc.free(old);
        let new = alloc.allocate();
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        assert!(alloc.is_live(new));
        assert!(!alloc.is_live(old));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let entity = Entity::from_raw(7, 3);
        let bytes = rmp_serde::to_vec(&entity).unwrap();
        let restored: Entity = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(entity, restored);
    }
}
