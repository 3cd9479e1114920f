//! Sparse-set component storage
//!
//! A dense array plus a two-way indirection table giving O(1) insert,
//! removal, and lookup while keeping live elements contiguous. The
//! hole-free dense region is what makes the per-frame component scans
//! feeding the render pipeline cheap, so the container fails fast on any
//! access that would break that invariant rather than papering over it.

use super::entity::Entity;
use super::{EcsError, EcsResult};

/// Sentinel marking an unmapped slot in either indirection table.
const TOMBSTONE: usize = usize::MAX;

/// Dense, cache-friendly storage for per-entity component data
///
/// Invariant: for every occupied dense slot `d < count`,
/// `entity_to_dense[dense_to_entity[d]] == d`, and every mapped entity
/// points at a dense slot below `count`. No holes exist below `count`.
#[derive(Debug)]
pub struct SparseSet<T> {
    dense: Vec<T>,
    dense_to_entity: Vec<usize>,
    entity_to_dense: Vec<usize>,
    count: usize,
}

impl<T> SparseSet<T> {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            dense_to_entity: Vec::new(),
            entity_to_dense: Vec::new(),
            count: 0,
        }
    }

    /// Create an empty set with room for `capacity` components
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            dense: Vec::with_capacity(capacity),
            dense_to_entity: Vec::with_capacity(capacity),
            entity_to_dense: Vec::with_capacity(capacity),
            count: 0,
        }
    }

    /// Number of live components
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the set holds no components
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether `entity` currently maps to a component
    pub fn contains(&self, entity: Entity) -> bool {
        self.entity_to_dense
            .get(entity.id() as usize)
            .is_some_and(|&d| d != TOMBSTONE)
    }

    /// Insert a component for an entity
    ///
    /// The entity must be unmapped; inserting over a live mapping is a
    /// programmer error and is reported rather than silently merged.
    /// The new component lands at dense slot `count`, overwriting a
    /// wasted slot left behind by an earlier removal when one exists.
    pub fn add(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        let index = entity.id() as usize;
        if index >= self.entity_to_dense.len() {
            self.entity_to_dense.resize(index + 1, TOMBSTONE);
        }
        if self.entity_to_dense[index] != TOMBSTONE {
            return Err(EcsError::AlreadyPresent(entity.id()));
        }

        let slot = self.count;
        if slot < self.dense.len() {
            self.dense[slot] = value;
            self.dense_to_entity[slot] = index;
        } else {
            self.dense.push(value);
            self.dense_to_entity.push(index);
        }
        self.entity_to_dense[index] = slot;
        self.count += 1;
        Ok(())
    }

    /// Overwrite the component of a mapped entity in place
    pub fn set(&mut self, entity: Entity, value: T) -> EcsResult<()> {
        let slot = self.dense_index(entity)?;
        self.dense[slot] = value;
        Ok(())
    }

    /// Remove the component of an entity by swapping with the last slot
    ///
    /// O(1): if the removed slot is not the last occupied one, the
    /// component in the last slot is relocated into it and its entity's
    /// indirection updated, so the dense region stays hole-free.
    pub fn remove(&mut self, entity: Entity) -> EcsResult<()> {
        let index = entity.id() as usize;
        let slot = match self.entity_to_dense.get(index) {
            Some(&d) if d != TOMBSTONE => d,
            _ => return Err(EcsError::NotFound(entity.id())),
        };

        let last = self.count - 1;
        if slot != last {
            self.dense.swap(slot, last);
            let moved_entity = self.dense_to_entity[last];
            self.dense_to_entity[slot] = moved_entity;
            self.entity_to_dense[moved_entity] = slot;
        }
        self.entity_to_dense[index] = TOMBSTONE;
        self.dense_to_entity[last] = TOMBSTONE;
        self.count -= 1;
        Ok(())
    }

    /// Look up the component of an entity
    pub fn get(&self, entity: Entity) -> EcsResult<&T> {
        let slot = self.dense_index(entity)?;
        Ok(&self.dense[slot])
    }

    /// Look up the component of an entity mutably
    pub fn get_mut(&mut self, entity: Entity) -> EcsResult<&mut T> {
        let slot = self.dense_index(entity)?;
        Ok(&mut self.dense[slot])
    }

    /// Iterate the dense region only: hole-free, cache-friendly
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.dense[..self.count].iter()
    }

    /// Iterate the dense region mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.dense[..self.count].iter_mut()
    }

    /// The live components as a contiguous slice
    pub fn as_slice(&self) -> &[T] {
        &self.dense[..self.count]
    }

    /// Entity ids owning each dense slot, parallel to [`SparseSet::as_slice`]
    pub fn entities(&self) -> impl Iterator<Item = u32> + '_ {
        self.dense_to_entity[..self.count].iter().map(|&e| e as u32)
    }

    fn dense_index(&self, entity: Entity) -> EcsResult<usize> {
        let index = entity.id() as usize;
        let slot = *self
            .entity_to_dense
            .get(index)
            .ok_or(EcsError::OutOfRange(entity.id()))?;
        if slot == TOMBSTONE {
            return Err(EcsError::NotFound(entity.id()));
        }
        if slot >= self.count {
            return Err(EcsError::OutOfRange(entity.id()));
        }
        Ok(slot)
    }
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: u32) -> Entity {
        Entity::new(id)
    }

    #[test]
    fn test_add_and_round_trip() {
        let mut set = SparseSet::new();
        set.add(entity(3), 30).unwrap();
        set.add(entity(1), 10).unwrap();
        assert_eq!(*set.get(entity(3)).unwrap(), 30);
        assert_eq!(*set.get(entity(1)).unwrap(), 10);
        assert_eq!(set.len(), 2);
        assert!(set.contains(entity(3)));
        assert!(!set.contains(entity(0)));
    }

    #[test]
    fn test_add_over_live_mapping_fails() {
        let mut set = SparseSet::new();
        set.add(entity(0), 1).unwrap();
        assert!(matches!(
            set.add(entity(0), 2),
            Err(EcsError::AlreadyPresent(0))
        ));
    }

    #[test]
    fn test_remove_then_access_is_not_found() {
        let mut set = SparseSet::new();
        set.add(entity(5), 50).unwrap();
        set.remove(entity(5)).unwrap();
        assert!(matches!(set.get(entity(5)), Err(EcsError::NotFound(5))));
        assert!(matches!(set.remove(entity(5)), Err(EcsError::NotFound(5))));
    }

    #[test]
    fn test_access_past_table_is_out_of_range() {
        let set: SparseSet<i32> = SparseSet::new();
        assert!(matches!(set.get(entity(99)), Err(EcsError::OutOfRange(99))));
    }

    #[test]
    fn test_swap_remove_relocates_exactly_one_entity() {
        let mut set = SparseSet::new();
        set.add(entity(0), 100).unwrap();
        set.add(entity(1), 200).unwrap();
        set.add(entity(2), 300).unwrap();

        // Removing a non-last entity moves the last occupant into its slot.
        set.remove(entity(0)).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(*set.get(entity(1)).unwrap(), 200);
        assert_eq!(*set.get(entity(2)).unwrap(), 300);

        // The dense region is still hole-free and exactly `len` long.
        let values: Vec<i32> = set.iter().copied().collect();
        assert_eq!(values.len(), 2);
        assert!(values.contains(&200));
        assert!(values.contains(&300));
    }

    #[test]
    fn test_remove_last_slot_invalidates_only() {
        let mut set = SparseSet::new();
        set.add(entity(0), 1).unwrap();
        set.add(entity(1), 2).unwrap();
        set.remove(entity(1)).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(*set.get(entity(0)).unwrap(), 1);
    }

    #[test]
    fn test_density_invariant_over_mixed_operations() {
        let mut set = SparseSet::new();
        let mut live = 0usize;
        for id in 0..16u32 {
            set.add(entity(id), id as i32 * 10).unwrap();
            live += 1;
        }
        for id in [2u32, 7, 0, 15, 9] {
            set.remove(entity(id)).unwrap();
            live -= 1;
            assert_eq!(set.len(), live);
            // Every mapped entity still resolves below `len`; every dense
            // slot's owner maps back to it.
            let entities: Vec<u32> = set.entities().collect();
            assert_eq!(entities.len(), live);
            for owner in entities {
                assert!(set.contains(entity(owner)));
            }
        }
        // Reuse of wasted slots: re-adding stays dense.
        set.add(entity(2), -1).unwrap();
        live += 1;
        assert_eq!(set.len(), live);
        assert_eq!(*set.get(entity(2)).unwrap(), -1);
    }

    #[test]
    fn test_set_overwrites_in_place() {
        let mut set = SparseSet::new();
        set.add(entity(4), 1).unwrap();
        set.set(entity(4), 2).unwrap();
        assert_eq!(*set.get(entity(4)).unwrap(), 2);
        // Past the indirection table entirely.
        assert!(matches!(set.set(entity(5), 9), Err(EcsError::OutOfRange(5))));
    }

    #[test]
    fn test_iteration_exposes_dense_region_only() {
        let mut set = SparseSet::new();
        set.add(entity(0), 1).unwrap();
        set.add(entity(1), 2).unwrap();
        set.add(entity(2), 3).unwrap();
        set.remove(entity(1)).unwrap();
        // The wasted slot past `len` is never yielded.
        assert_eq!(set.iter().count(), 2);
        assert_eq!(set.as_slice().len(), 2);
    }
}
