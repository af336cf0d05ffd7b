//! A family is a cached, incrementally maintained set of entities matching
//! an `(all, none, any)` predicate over component masks.
//!
//! The iteration protocol itself (snapshotting, the deferred-removal
//! flag, flushing) lives on [`crate::world::World`] rather than here,
//! because running a family's per-entity action may itself create,
//! configure, or remove entities — which needs to notify *every* family,
//! including this one — and that notification must not happen while this
//! family is still mutably borrowed for its own iteration. `Family` itself
//! only owns predicate matching and membership bookkeeping.

use std::cmp::Ordering;

use crate::bag::EntityBag;
use crate::bitset::Bitset;
use crate::component::Component;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::world::World;

/// The `(all, none, any)` predicate a [`Family`] is built from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FamilyDefinition {
    /// Every bit here must be set in a matching entity's mask.
    pub all: Option<Bitset>,
    /// No bit here may be set in a matching entity's mask.
    pub none: Option<Bitset>,
    /// If non-empty, at least one bit here must be set.
    pub any: Option<Bitset>,
}

impl FamilyDefinition {
    /// An empty definition; add requirements with `all`/`none`/`any`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires component/tag `T`.
    pub fn all<T: Component>(mut self) -> Self {
        self.all.get_or_insert_with(Bitset::new).set(T::type_id());
        self
    }

    /// Excludes component/tag `T`.
    pub fn none<T: Component>(mut self) -> Self {
        self.none.get_or_insert_with(Bitset::new).set(T::type_id());
        self
    }

    /// Requires at least one of the `any`-tagged types set so far (call
    /// repeatedly to add more candidates to the same `any` set).
    pub fn any<T: Component>(mut self) -> Self {
        self.any.get_or_insert_with(Bitset::new).set(T::type_id());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.all.is_none() && self.none.is_none() && self.any.is_none() {
            Err(Error::InvalidFamily)
        } else {
            Ok(())
        }
    }
}

enum Sorting {
    None,
    Automatic,
    Manual { dirty: bool },
}

/// A predicate over entity masks plus the dense membership set it
/// maintains incrementally as entities are created, configured, and
/// removed.
pub struct Family {
    all: Bitset,
    none: Bitset,
    any: Bitset,
    pub(crate) members: EntityBag,
    member_mask: Bitset,
    add_hook: Option<Box<dyn FnMut(&World, Entity)>>,
    remove_hook: Option<Box<dyn FnMut(&World, Entity)>>,
    sorting: Sorting,
    sort_cmp: Option<Box<dyn FnMut(Entity, Entity) -> Ordering>>,
}

impl Family {
    pub(crate) fn new(def: &FamilyDefinition) -> Result<Self> {
        def.validate()?;
        Ok(Family {
            all: def.all.clone().unwrap_or_default(),
            none: def.none.clone().unwrap_or_default(),
            any: def.any.clone().unwrap_or_default(),
            members: EntityBag::new(),
            member_mask: Bitset::new(),
            add_hook: None,
            remove_hook: None,
            sorting: Sorting::None,
            sort_cmp: None,
        })
    }

    pub(crate) fn definition_matches(&self, def: &FamilyDefinition) -> bool {
        self.all == def.all.clone().unwrap_or_default()
            && self.none == def.none.clone().unwrap_or_default()
            && self.any == def.any.clone().unwrap_or_default()
    }

    /// `(all⊆mask) ∧ (none∩mask=∅) ∧ (any=∅ ∨ any∩mask≠∅)`.
    pub(crate) fn matches(&self, mask: &Bitset) -> bool {
        mask.contains(&self.all)
            && !mask.intersects(&self.none)
            && (self.any.is_empty() || self.any.intersects(mask))
    }

    /// Populates membership from every live entity. Called once, right
    /// after a fresh family is created; fires no hooks (there is no prior
    /// state to transition from).
    pub(crate) fn backfill(&mut self, live: impl Iterator<Item = (Entity, Bitset)>) {
        for (e, mask) in live {
            if self.matches(&mask) {
                self.members.push(e);
                self.member_mask.set(e.id());
            }
        }
    }

    pub(crate) fn on_entity_added(&mut self, world: &World, e: Entity, mask: &Bitset) {
        if self.matches(mask) {
            self.members.push(e);
            self.member_mask.set(e.id());
            if let Some(hook) = self.add_hook.as_mut() {
                hook(world, e);
            }
        }
    }

    pub(crate) fn on_entity_config_changed(&mut self, world: &World, e: Entity, mask: &Bitset) {
        let now = self.matches(mask);
        let was = self.member_mask.test(e.id());
        if now && !was {
            self.members.push(e);
            self.member_mask.set(e.id());
            if let Some(hook) = self.add_hook.as_mut() {
                hook(world, e);
            }
        } else if was && !now {
            self.members.remove(e);
            self.member_mask.clear(e.id());
            if let Some(hook) = self.remove_hook.as_mut() {
                hook(world, e);
            }
        }
    }

    pub(crate) fn on_entity_removed(&mut self, world: &World, e: Entity) {
        if self.member_mask.test(e.id()) {
            self.members.remove(e);
            self.member_mask.clear(e.id());
            if let Some(hook) = self.remove_hook.as_mut() {
                hook(world, e);
            }
        }
    }

    pub(crate) fn on_add(&mut self, hook: impl FnMut(&World, Entity) + 'static) -> Result<()> {
        if self.add_hook.is_some() {
            return Err(Error::HookAlreadyRegistered {
                target: "family",
                kind: crate::error::HookKind::Add,
            });
        }
        self.add_hook = Some(Box::new(hook));
        Ok(())
    }

    pub(crate) fn on_remove(&mut self, hook: impl FnMut(&World, Entity) + 'static) -> Result<()> {
        if self.remove_hook.is_some() {
            return Err(Error::HookAlreadyRegistered {
                target: "family",
                kind: crate::error::HookKind::Remove,
            });
        }
        self.remove_hook = Some(Box::new(hook));
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn contains(&self, e: Entity) -> bool {
        self.member_mask.test(e.id())
    }

    pub(crate) fn first(&self) -> Option<Entity> {
        self.members.first()
    }

    /// Sets a comparator. `automatic = true` re-sorts on every iteration;
    /// `automatic = false` sorts only once a [`Self::mark_dirty`] call has
    /// flagged it, clearing the flag afterward.
    pub(crate) fn set_sort(
        &mut self,
        cmp: impl FnMut(Entity, Entity) -> Ordering + 'static,
        automatic: bool,
    ) {
        self.sort_cmp = Some(Box::new(cmp));
        self.sorting = if automatic {
            Sorting::Automatic
        } else {
            Sorting::Manual { dirty: true }
        };
    }

    pub(crate) fn mark_dirty(&mut self) {
        if let Sorting::Manual { dirty } = &mut self.sorting {
            *dirty = true;
        }
    }

    pub(crate) fn apply_pending_sort(&mut self) {
        let should_sort = match &mut self.sorting {
            Sorting::None => false,
            Sorting::Automatic => true,
            Sorting::Manual { dirty } => {
                let was_dirty = *dirty;
                *dirty = false;
                was_dirty
            }
        };
        if should_sort {
            if let Some(cmp) = self.sort_cmp.as_mut() {
                self.members.sort_by(|a, b| cmp(*a, *b));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityAllocator;

    struct Position;
    struct Dead;

    #[test]
    fn matches_all_none_any() {
        let def = FamilyDefinition::new().all::<Position>().none::<Dead>();
        let family = Family::new(&def).unwrap();

        let mut mask = Bitset::new();
        mask.set(Position::type_id());
        assert!(family.matches(&mask));

        mask.set(Dead::type_id());
        assert!(!family.matches(&mask));
    }

    #[test]
    fn invalid_family_rejects_empty_definition() {
        let def = FamilyDefinition::new();
        assert!(matches!(Family::new(&def), Err(Error::InvalidFamily)));
    }

    #[test]
    fn backfill_populates_from_live_snapshot() {
        let def = FamilyDefinition::new().all::<Position>();
        let mut family = Family::new(&def).unwrap();

        let mut alloc = EntityAllocator::new();
        let e0 = alloc.allocate();
        let e1 = alloc.allocate();
        let mut m0 = Bitset::new();
        m0.set(Position::type_id());

        family.backfill(vec![(e0, m0), (e1, Bitset::new())].into_iter());
        assert_eq!(family.len(), 1);
        assert!(family.contains(e0));
        assert!(!family.contains(e1));
    }
}
