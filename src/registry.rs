//! Per-entity bitmasks, the recycling allocator, and the deferred-removal
//! queue. The cross-cutting orchestration (notifying families, removing
//! components, firing world-level hooks) lives on
//! [`crate::world::World`], since it needs simultaneous access to the
//! component stores and family list that this type does not own; see the
//! module docs on [`crate::family::Family`] for why that split matters.

use crate::bitset::Bitset;
use crate::component::ComponentTypeId;
use crate::entity::{Entity, EntityAllocator, Index};

/// Tracks which entity, if any, is the target of an enclosing
/// `create`/`configure` call currently in progress. A single slot, not a
/// stack — see §9 of the design spec for why one level of same-entity
/// reentrancy is the documented limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ConfigureScope {
    /// This call is the outermost one for its entity; on completion it
    /// must restore the sentinel to whatever it held before (`None`, or
    /// another entity's in-progress configuration).
    Outer(Option<Entity>),
    /// This call is nested inside an enclosing call for the *same*
    /// entity; its own family notification must be suppressed.
    Reentrant,
}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    allocator: EntityAllocator,
    masks: Vec<Bitset>,
    delayed_removal: bool,
    pending_removals: Vec<Entity>,
    configuring: Option<Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        EntityRegistry::default()
    }

    pub(crate) fn allocate(&mut self) -> Entity {
        let e = self.allocator.allocate();
        self.ensure_mask_slot(e);
        e
    }

    /// Allocates (or reissues) a specific id. Surfaced only for the
    /// snapshot collaborator's restore path (§4.8); ordinary entity
    /// creation goes through `allocate`.
    pub(crate) fn allocate_with_id(&mut self, id: Index) -> Entity {
        let e = self.allocator.allocate_with_id(id);
        self.ensure_mask_slot(e);
        e
    }

    fn ensure_mask_slot(&mut self, e: Entity) {
        let id = e.id() as usize;
        if id >= self.masks.len() {
            self.masks.resize_with(id + 1, Bitset::new);
        } else {
            self.masks[id] = Bitset::new();
        }
    }

    pub fn mask(&self, e: Entity) -> Bitset {
        self.masks.get(e.id() as usize).cloned().unwrap_or_default()
    }

    pub(crate) fn mask_mut(&mut self, e: Entity) -> &mut Bitset {
        let id = e.id() as usize;
        if id >= self.masks.len() {
            self.masks.resize_with(id + 1, Bitset::new);
        }
        &mut self.masks[id]
    }

    pub(crate) fn clear_mask(&mut self, e: Entity) {
        if let Some(mask) = self.masks.get_mut(e.id() as usize) {
            *mask = Bitset::new();
        }
    }

    pub fn contains(&self, e: Entity) -> bool {
        self.allocator.contains(e)
    }

    pub fn has(&self, e: Entity, type_id: ComponentTypeId) -> bool {
        self.allocator.contains(e)
            && self
                .masks
                .get(e.id() as usize)
                .map_or(false, |m| m.test(type_id))
    }

    pub fn has_no(&self, e: Entity, type_id: ComponentTypeId) -> bool {
        !self.has(e, type_id)
    }

    pub fn is_marked_for_removal(&self, e: Entity) -> bool {
        self.pending_removals.contains(&e)
    }

    pub(crate) fn is_delayed(&self) -> bool {
        self.delayed_removal
    }

    pub(crate) fn set_delayed(&mut self, v: bool) {
        self.delayed_removal = v;
    }

    pub(crate) fn enqueue_removal(&mut self, e: Entity) {
        if !self.pending_removals.contains(&e) {
            self.pending_removals.push(e);
        }
    }

    pub(crate) fn take_pending_removals(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.pending_removals)
    }

    pub(crate) fn free(&mut self, e: Entity) {
        self.allocator.free(e);
    }

    pub fn for_each_entity(&self, f: impl FnMut(Entity)) {
        self.allocator.for_each(f)
    }

    pub fn num_entities(&self) -> usize {
        self.allocator.len()
    }

    pub fn capacity(&self) -> usize {
        self.allocator.capacity()
    }

    pub(crate) fn reset_allocator(&mut self) {
        self.allocator.reset();
        self.masks.clear();
    }

    /// Enters a `create`/`configure` scope for `e`, returning whether this
    /// call is the outer one (and must notify families when it completes)
    /// or a reentrant nested one (whose notification must be suppressed).
    pub(crate) fn begin_configuring(&mut self, e: Entity) -> ConfigureScope {
        if self.configuring == Some(e) {
            ConfigureScope::Reentrant
        } else {
            ConfigureScope::Outer(self.configuring.replace(e))
        }
    }

    pub(crate) fn end_configuring(&mut self, scope: ConfigureScope) {
        if let ConfigureScope::Outer(previous) = scope {
            self.configuring = previous;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_round_trips_through_allocate() {
        let mut registry = EntityRegistry::new();
        let e = registry.allocate();
        assert!(registry.mask(e).is_empty());
        registry.mask_mut(e).set(3);
        assert!(registry.has(e, 3));
        assert!(registry.has_no(e, 4));
    }

    #[test]
    fn configure_scope_suppresses_same_entity_reentrancy() {
        let mut registry = EntityRegistry::new();
        let e = registry.allocate();

        let outer = registry.begin_configuring(e);
        assert_eq!(outer, ConfigureScope::Outer(None));

        let inner = registry.begin_configuring(e);
        assert_eq!(inner, ConfigureScope::Reentrant);
        registry.end_configuring(inner);

        registry.end_configuring(outer);
        assert_eq!(registry.configuring, None);
    }

    #[test]
    fn configure_scope_notifies_normally_for_a_different_entity() {
        let mut registry = EntityRegistry::new();
        let e1 = registry.allocate();
        let e2 = registry.allocate();

        let outer = registry.begin_configuring(e1);
        let inner = registry.begin_configuring(e2);
        assert_eq!(inner, ConfigureScope::Outer(Some(e1)));
        registry.end_configuring(inner);
        assert_eq!(registry.configuring, Some(e1));
        registry.end_configuring(outer);
    }
}
