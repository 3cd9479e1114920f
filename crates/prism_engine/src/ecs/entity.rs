//! Entity identifiers and lifetime management

/// Entity identifier
///
/// An opaque index with no payload. Components are associated with an
/// entity purely through its id; nothing ever stores a pointer back to
/// an owning manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    id: u32,
}

impl Entity {
    pub(crate) fn new(id: u32) -> Self {
        Self { id }
    }

    /// Get the entity ID
    pub fn id(&self) -> u32 {
        self.id
    }
}

/// Allocates and recycles entity ids
///
/// Destroyed ids go onto a free-list and are handed out again by
/// [`EntityManager::create`] before any new id is minted. Ids stay small
/// and dense, which keeps the sparse-set indirection tables compact.
#[derive(Debug, Default)]
pub struct EntityManager {
    next_id: u32,
    alive: Vec<bool>,
    free: Vec<u32>,
}

impl EntityManager {
    /// Create a new entity manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new entity, reusing a recycled id when one is available
    pub fn create(&mut self) -> Entity {
        if let Some(id) = self.free.pop() {
            self.alive[id as usize] = true;
            return Entity::new(id);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.alive.push(true);
        Entity::new(id)
    }

    /// Destroy an entity, returning its id to the free-list
    ///
    /// Destroying an entity does not touch any component storage; the
    /// caller is responsible for removing its components first.
    pub fn destroy(&mut self, entity: Entity) {
        let index = entity.id() as usize;
        if index < self.alive.len() && self.alive[index] {
            self.alive[index] = false;
            self.free.push(entity.id());
        }
    }

    /// Check whether an entity id is currently live
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.alive.get(entity.id() as usize).copied().unwrap_or(false)
    }

    /// Number of currently live entities
    pub fn live_count(&self) -> usize {
        self.alive.len() - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_assigns_sequential_ids() {
        let mut manager = EntityManager::new();
        let a = manager.create();
        let b = manager.create();
        assert_eq!(a.id(), 0);
        assert_eq!(b.id(), 1);
        assert_eq!(manager.live_count(), 2);
    }

    #[test]
    fn test_destroy_recycles_id() {
        let mut manager = EntityManager::new();
        let a = manager.create();
        let _b = manager.create();
        manager.destroy(a);
        assert!(!manager.is_alive(a));
        assert_eq!(manager.live_count(), 1);

        let c = manager.create();
        assert_eq!(c.id(), a.id());
        assert!(manager.is_alive(c));
        assert_eq!(manager.live_count(), 2);
    }

    #[test]
    fn test_double_destroy_is_ignored() {
        let mut manager = EntityManager::new();
        let a = manager.create();
        manager.destroy(a);
        manager.destroy(a);
        assert_eq!(manager.live_count(), 0);
        // The id must only be recycled once.
        let b = manager.create();
        let c = manager.create();
        assert_eq!(b.id(), 0);
        assert_eq!(c.id(), 1);
    }
}
