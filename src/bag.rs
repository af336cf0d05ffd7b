//! Dense resizable sequence of entities, used for family membership and
//! anywhere else a cache-friendly, order-stable list of entities is
//! needed.

use crate::entity::Entity;

/// A dense `Vec<Entity>` with amortized-O(1) append and swap-remove.
#[derive(Clone, Debug, Default)]
pub struct EntityBag {
    entities: Vec<Entity>,
}

impl EntityBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        EntityBag {
            entities: Vec::new(),
        }
    }

    /// Appends `e` to the end of the bag.
    pub fn push(&mut self, e: Entity) {
        self.entities.push(e);
    }

    /// Removes the first occurrence of `e` via scan + swap-remove.
    /// Returns `true` if `e` was present.
    pub fn remove(&mut self, e: Entity) -> bool {
        if let Some(pos) = self.entities.iter().position(|&x| x == e) {
            self.entities.swap_remove(pos);
            true
        } else {
            false
        }
    }

    /// Removes every entity.
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Number of entities in the bag.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// `true` iff the bag holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// `true` iff `e` is present in the bag.
    pub fn contains(&self, e: Entity) -> bool {
        self.entities.contains(&e)
    }

    /// Indexed access.
    pub fn get(&self, index: usize) -> Option<Entity> {
        self.entities.get(index).copied()
    }

    /// The first entity, if any.
    pub fn first(&self) -> Option<Entity> {
        self.entities.first().copied()
    }

    /// Stably reorders the bag in place using `cmp`.
    pub fn sort_by(&mut self, mut cmp: impl FnMut(&Entity, &Entity) -> std::cmp::Ordering) {
        self.entities.sort_by(|a, b| cmp(a, b));
    }

    /// Iterates a snapshot of the current contents. The caller (typically
    /// [`crate::family::Family::for_each`]) is responsible for snapshotting
    /// *before* iterating if structural changes to this bag might happen
    /// during the callback; this method itself just borrows the slice.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().copied()
    }

    /// Copies the current contents into a new, independent `Vec` — the
    /// snapshot step family iteration relies on.
    pub fn snapshot(&self) -> Vec<Entity> {
        self.entities.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityAllocator;

    #[test]
    fn push_remove_swap() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        let e1 = alloc.allocate();
        let e2 = alloc.allocate();

        let mut bag = EntityBag::new();
        bag.push(e0);
        bag.push(e1);
        bag.push(e2);
        assert_eq!(bag.len(), 3);

        assert!(bag.remove(e1));
        assert_eq!(bag.len(), 2);
        assert!(!bag.contains(e1));
        assert!(bag.contains(e0));
        assert!(bag.contains(e2));

        assert!(!bag.remove(e1));
    }

    #[test]
    fn sort_by_is_stable_over_entity_id() {
        let mut alloc = EntityAllocator::new();
        let entities: Vec<_> = (0..5).map(|_| alloc.allocate()).collect();
        let mut bag = EntityBag::new();
        for &e in entities.iter().rev() {
            bag.push(e);
        }
        bag.sort_by(|a, b| a.id().cmp(&b.id()));
        let sorted: Vec<_> = bag.iter().collect();
        assert_eq!(sorted, entities);
    }
}
