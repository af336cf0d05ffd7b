//! Entity identity and the recycling allocator.

use std::fmt;

/// The id half of an [`Entity`] handle. Indexes internal per-entity arrays.
pub type Index = u32;

/// An immutable handle `(id, generation)` identifying a logical object.
///
/// `generation` is bumped every time `id` is recycled, so a stale handle
/// compares unequal to the entity currently living at that slot.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Entity {
    id: Index,
    generation: u32,
}

impl Entity {
    /// The reserved sentinel entity. Never returned by the allocator.
    pub const NONE: Entity = Entity {
        id: u32::MAX,
        generation: 0,
    };

    pub(crate) fn new(id: Index, generation: u32) -> Self {
        Entity { id, generation }
    }

    /// The index half of this handle.
    #[inline]
    pub fn id(&self) -> Index {
        self.id
    }

    /// The generation half of this handle.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.generation)
    }
}

/// Issues entity handles and recycles freed ids.
///
/// Generations start at `0` for a never-before-issued id and increase by
/// one every time that id is freed and reissued, so a stale `Entity`
/// handle can never alias the entity that replaces it at the same id.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    // generation currently live at each id; `None` means the id has never
    // been issued. Kept even after the id is freed, so a later reissue can
    // derive the next generation — liveness itself is tracked separately
    // in `live`.
    generations: Vec<Option<u32>>,
    // `true` iff the id is currently allocated. Indexed in lockstep with
    // `generations`; a freed id keeps its `generations` entry but flips
    // this to `false`.
    live: Vec<bool>,
    recycled: Vec<Index>,
}

impl EntityAllocator {
    /// Creates an empty allocator.
    pub fn new() -> Self {
        EntityAllocator {
            generations: Vec::new(),
            live: Vec::new(),
            recycled: Vec::new(),
        }
    }

    /// Allocates a fresh entity: a recycled id with a bumped generation,
    /// or a brand-new id at generation `0`.
    pub fn allocate(&mut self) -> Entity {
        if let Some(id) = self.recycled.pop() {
            let generation = self.generations[id as usize].map_or(0, |g| g + 1);
            self.generations[id as usize] = Some(generation);
            self.live[id as usize] = true;
            Entity::new(id, generation)
        } else {
            let id = self.generations.len() as Index;
            self.generations.push(Some(0));
            self.live.push(true);
            Entity::new(id, 0)
        }
    }

    /// Allocates (or reissues) a specific id, for snapshot restore.
    ///
    /// If `id` has never been issued, every intermediate id up to it is
    /// marked recycled (so ordinary `allocate()` calls can still claim
    /// them later) before `id` itself is issued. If `id` is currently on
    /// the recycle list, it is removed from it and reissued directly.
    pub fn allocate_with_id(&mut self, id: Index) -> Entity {
        while (self.generations.len() as Index) <= id {
            let new_id = self.generations.len() as Index;
            self.generations.push(None);
            self.live.push(false);
            self.recycled.push(new_id);
        }

        self.recycled.retain(|&r| r != id);

        let generation = self.generations[id as usize].map_or(0, |g| g + 1);
        self.generations[id as usize] = Some(generation);
        self.live[id as usize] = true;
        Entity::new(id, generation)
    }

    /// Frees `e`. Subsequent `contains(e)` calls return `false`; the id may
    /// be reissued (at a higher generation) by a later `allocate()`.
    pub fn free(&mut self, e: Entity) {
        if self.contains(e) {
            self.recycled.push(e.id());
            self.live[e.id() as usize] = false;
        }
    }

    /// `true` iff `e`'s id is currently live at exactly `e`'s generation.
    ///
    /// Liveness is tracked in `live`, separately from the stored
    /// generation: `generations[id]` is kept around after a `free` so the
    /// next `allocate` of that id can derive `generation + 1`, so it alone
    /// cannot tell a freed id from a still-live one.
    pub fn contains(&self, e: Entity) -> bool {
        let id = e.id() as usize;
        self.live.get(id).copied().unwrap_or(false)
            && self.generations[id] == Some(e.generation())
    }

    /// Visits every live entity in allocation order.
    pub fn for_each(&self, mut f: impl FnMut(Entity)) {
        for (id, generation) in self.generations.iter().enumerate() {
            if let Some(generation) = generation {
                let e = Entity::new(id as Index, *generation);
                if self.contains(e) {
                    f(e);
                }
            }
        }
    }

    /// Number of currently live entities.
    pub fn len(&self) -> usize {
        self.generations.len() - self.recycled.len()
    }

    /// `true` iff there are no live entities.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One past the highest id ever issued; an upper bound for sizing
    /// dense per-entity arrays.
    pub fn capacity(&self) -> usize {
        self.generations.len()
    }

    /// Resets the allocator entirely; the next `allocate()` starts back at
    /// id `0`, generation `0`. Used by `remove_all(clear_recycled = true)`.
    pub fn reset(&mut self) {
        self.generations.clear();
        self.live.clear();
        self.recycled.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_is_sequential_and_recycles() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        let e1 = alloc.allocate();
        assert_eq!(e0.id(), 0);
        assert_eq!(e1.id(), 1);

        alloc.free(e0);
        assert!(!alloc.contains(e0));

        let e2 = alloc.allocate();
        assert_eq!(e2.id(), e0.id());
        assert!(e2.generation() > e0.generation());
        assert_ne!(e2, e0);
        assert!(alloc.contains(e2));
    }

    #[test]
    fn free_invalidates_contains_without_reallocation() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        alloc.free(e);
        assert!(!alloc.contains(e));
        assert_eq!(alloc.len(), 0);
    }

    #[test]
    fn double_free_is_idempotent_for_contains() {
        let mut alloc = EntityAllocator::new();
        let e = alloc.allocate();
        alloc.free(e);
        alloc.free(e);
        assert!(!alloc.contains(e));
    }

    #[test]
    fn for_each_visits_only_live_entities() {
        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        let e1 = alloc.allocate();
        alloc.free(e0);

        let mut seen = Vec::new();
        alloc.for_each(|e| seen.push(e));
        assert_eq!(seen, vec![e1]);
    }
}
