//! The aggregate façade: owns the entity registry, component stores,
//! families, and system scheduler, and drives them all from `tick`.
//!
//! Every public mutator takes `&self`, not `&mut self`. Internally,
//! `World`'s state is behind `RefCell`s (mirroring the interior-mutability
//! storage style the pack's `embla-ecs` crate uses for its component
//! maps) so that component hooks, family hooks, and systems — all of
//! which receive a plain `&World` — can create, configure, and remove
//! entities, and reach other component stores, without needing a `&mut
//! World` threaded through every callback. As with `embla-ecs`, this
//! means overlapping access to the *same* `RefCell` panics rather than
//! deadlocking or silently corrupting state; see the caveats on
//! [`World::insert_component`] and [`World::remove_entity`].

use std::any;
use std::cell::{Cell, Ref, RefCell};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::component::{Component, ComponentStore, ComponentTypeId};
use crate::entity::Entity;
use crate::error::{Error, HookKind, Result};
use crate::family::{Family, FamilyDefinition};
use crate::registry::EntityRegistry;
use crate::system::{IteratingSystem, Interval, System, SystemScheduler};

type EntityHook = Box<dyn FnMut(&World, Entity)>;

thread_local! {
    static CURRENT_WORLD: Cell<Option<*const World>> = Cell::new(None);
}

struct CurrentWorldGuard;

impl Drop for CurrentWorldGuard {
    fn drop(&mut self) {
        CURRENT_WORLD.with(|cell| cell.set(None));
    }
}

/// The ECS container: entities, component stores, families, and systems.
pub struct World {
    registry: RefCell<EntityRegistry>,
    stores: RefCell<HashMap<ComponentTypeId, RefCell<Box<dyn crate::component::AnyStore>>>>,
    families: RefCell<Vec<Family>>,
    scheduler: RefCell<SystemScheduler>,
    system_types: RefCell<HashSet<any::TypeId>>,
    entity_add_hook: RefCell<Option<EntityHook>>,
    entity_remove_hook: RefCell<Option<EntityHook>>,
    systems_phase_started: Cell<bool>,
    current_delta: Cell<f32>,
}

impl World {
    fn empty() -> Self {
        World {
            registry: RefCell::new(EntityRegistry::new()),
            stores: RefCell::new(HashMap::new()),
            families: RefCell::new(Vec::new()),
            scheduler: RefCell::new(SystemScheduler::new()),
            system_types: RefCell::new(HashSet::new()),
            entity_add_hook: RefCell::new(None),
            entity_remove_hook: RefCell::new(None),
            systems_phase_started: Cell::new(false),
            current_delta: Cell::new(0.0),
        }
    }

    /// Builds a world by running `cfg_fn` through the three ordered
    /// configuration phases: injectables (out of scope here — this crate
    /// carries no dependency-injection layer, so the phase is a no-op
    /// pass-through), family/entity/component hooks, then systems. Once a
    /// system has been added, further hook registration fails with
    /// [`Error::ConfigurationOrder`], since hooks must be in place before
    /// any system's `on_init` can emit entities for them to observe.
    ///
    /// An error returned from `cfg_fn` aborts construction: no `World` is
    /// returned.
    pub fn new(cfg_fn: impl FnOnce(&World) -> Result<()>) -> Result<World> {
        let world = World::empty();
        CURRENT_WORLD.with(|cell| cell.set(Some(&world as *const World)));
        let _guard = CurrentWorldGuard;

        cfg_fn(&world)?;

        log::debug!(
            "world configured: {} entities, {} families, {} systems",
            world.num_entities(),
            world.families.borrow().len(),
            world.scheduler.borrow().len(),
        );
        Ok(world)
    }

    /// The world currently being configured by an enclosing `World::new`
    /// call on this thread, if any. Lets a system constructed inside the
    /// configuration closure bind to its world without being passed a
    /// reference explicitly. Only valid for the duration of that closure.
    pub fn current() -> Option<&'static World> {
        CURRENT_WORLD.with(|cell| cell.get().map(|ptr| unsafe { &*ptr }))
    }

    fn check_hook_phase(&self) -> Result<()> {
        if self.systems_phase_started.get() {
            Err(Error::ConfigurationOrder {
                reason: "hooks must be registered before any system is added",
            })
        } else {
            Ok(())
        }
    }

    // ---- entities -------------------------------------------------

    /// Allocates a new entity, runs `configure` against it, then notifies
    /// every family and fires the world-level entity-add hook.
    pub fn create_entity(&self, configure: impl FnOnce(&World, Entity)) -> Entity {
        let e = self.registry.borrow_mut().allocate();
        self.finish_create(e, configure)
    }

    /// Allocates (or reissues) entity id `id` specifically, runs
    /// `configure` against it, then notifies as `create_entity` does.
    /// Surfaced only for the snapshot collaborator's restore path (§4.8);
    /// ordinary entity creation should use `create_entity`.
    pub fn create_entity_with_id(
        &self,
        id: crate::entity::Index,
        configure: impl FnOnce(&World, Entity),
    ) -> Entity {
        let e = self.registry.borrow_mut().allocate_with_id(id);
        self.finish_create(e, configure)
    }

    fn finish_create(&self, e: Entity, configure: impl FnOnce(&World, Entity)) -> Entity {
        let scope = self.registry.borrow_mut().begin_configuring(e);
        configure(self, e);
        self.registry.borrow_mut().end_configuring(scope);

        let mask = self.registry.borrow().mask(e);
        {
            let mut families = self.families.borrow_mut();
            for family in families.iter_mut() {
                family.on_entity_added(self, e, &mask);
            }
        }
        if let Some(hook) = self.entity_add_hook.borrow_mut().as_mut() {
            hook(self, e);
        }
        log::trace!("created entity {}", e);
        e
    }

    /// Runs `configure` against `e`, then notifies every family unless
    /// this call is nested inside an enclosing `create`/`configure` for
    /// the same entity (in which case the outer call's own notification
    /// covers it — see §5 of the design spec on reentrant configure).
    pub fn configure_entity(&self, e: Entity, configure: impl FnOnce(&World, Entity)) {
        let scope = self.registry.borrow_mut().begin_configuring(e);
        configure(self, e);
        if let crate::registry::ConfigureScope::Reentrant = scope {
            return;
        }
        self.registry.borrow_mut().end_configuring(scope);
        let mask = self.registry.borrow().mask(e);
        let mut families = self.families.borrow_mut();
        for family in families.iter_mut() {
            family.on_entity_config_changed(self, e, &mask);
        }
    }

    /// Removes `e`. If a family iteration is currently in progress
    /// anywhere in the world, the removal is queued and runs once that
    /// iteration ends. Removing an already-dead entity is a no-op.
    pub fn remove_entity(&self, e: Entity) {
        if !self.registry.borrow().contains(e) {
            return;
        }
        if self.registry.borrow().is_delayed() {
            self.registry.borrow_mut().enqueue_removal(e);
            return;
        }
        self.remove_entity_now(e);
    }

    fn remove_entity_now(&self, e: Entity) {
        if !self.registry.borrow().contains(e) {
            return;
        }
        if let Some(hook) = self.entity_remove_hook.borrow_mut().as_mut() {
            hook(self, e);
        }
        {
            let mut families = self.families.borrow_mut();
            for family in families.iter_mut() {
                family.on_entity_removed(self, e);
            }
        }
        let mask = self.registry.borrow().mask(e);
        {
            // Held for the whole walk: a component hook that registers a
            // brand-new component type for the first time while another
            // type's removal hook is running will panic here, the same
            // way `embla-ecs` panics on overlapping storage locks.
            let stores = self.stores.borrow();
            mask.for_each_set_bit_rev(|type_id| {
                if let Some(cell) = stores.get(&type_id) {
                    cell.borrow_mut().remove_erased(self, e);
                }
            });
        }
        let mut registry = self.registry.borrow_mut();
        registry.clear_mask(e);
        registry.free(e);
        log::trace!("removed entity {}", e);
    }

    pub(crate) fn flush_deferred(&self) {
        loop {
            let pending = self.registry.borrow_mut().take_pending_removals();
            if pending.is_empty() {
                break;
            }
            for e in pending {
                self.remove_entity_now(e);
            }
        }
    }

    /// Removes every live entity. If `clear_recycled`, also resets the
    /// allocator so the next entity created starts back at id 0.
    pub fn remove_all(&self, clear_recycled: bool) {
        let all: Vec<Entity> = {
            let mut v = Vec::new();
            self.registry.borrow().for_each_entity(|e| v.push(e));
            v
        };
        for e in all {
            self.remove_entity(e);
        }
        self.flush_deferred();
        if clear_recycled {
            self.registry.borrow_mut().reset_allocator();
        }
    }

    /// Visits every live entity.
    pub fn for_each_entity(&self, f: impl FnMut(Entity)) {
        self.registry.borrow().for_each_entity(f);
    }

    /// Number of currently live entities.
    pub fn num_entities(&self) -> usize {
        self.registry.borrow().num_entities()
    }

    /// One past the highest entity id ever issued.
    pub fn capacity(&self) -> usize {
        self.registry.borrow().capacity()
    }

    /// `true` iff `e` is currently live (has not been removed, and is not
    /// a stale handle to a recycled id).
    pub fn contains(&self, e: Entity) -> bool {
        self.registry.borrow().contains(e)
    }

    /// `true` iff `e` holds component/tag `T`.
    pub fn has<T: Component>(&self, e: Entity) -> bool {
        self.registry.borrow().has(e, T::type_id())
    }

    /// `true` iff `e` does not hold component/tag `T`.
    pub fn has_no<T: Component>(&self, e: Entity) -> bool {
        self.registry.borrow().has_no(e, T::type_id())
    }

    /// `true` iff `e` is queued for removal by `flush_deferred`.
    pub fn is_marked_for_removal(&self, e: Entity) -> bool {
        self.registry.borrow().is_marked_for_removal(e)
    }

    pub(crate) fn is_delayed_removal(&self) -> bool {
        self.registry.borrow().is_delayed()
    }

    pub(crate) fn set_delayed_removal(&self, v: bool) {
        self.registry.borrow_mut().set_delayed(v);
    }

    /// The `dt` passed to the most recent `tick` call.
    pub fn current_delta(&self) -> f32 {
        self.current_delta.get()
    }

    // ---- components -------------------------------------------------

    fn get_or_create_store<T: Component>(&self) {
        let type_id = T::type_id();
        if !self.stores.borrow().contains_key(&type_id) {
            self.stores
                .borrow_mut()
                .entry(type_id)
                .or_insert_with(|| RefCell::new(Box::new(ComponentStore::<T>::new())));
        }
    }

    /// Inserts `v` at `e`, auto-registering a store for `T` on first use.
    /// Replacing an existing value fires that value's remove hook before
    /// the new value's add hook (§4.4).
    ///
    /// # Panics
    /// Panics if the add/remove hook for `T` reentrantly inserts or
    /// removes another `T` component (the store's own `RefCell` is
    /// already borrowed), matching `embla-ecs`'s documented locking
    /// behavior.
    pub fn insert_component<T: Component>(&self, e: Entity, v: T) {
        self.get_or_create_store::<T>();
        {
            let stores = self.stores.borrow();
            let cell = &stores[&T::type_id()];
            let mut store_any = cell.borrow_mut();
            let store = store_any
                .as_any_mut()
                .downcast_mut::<ComponentStore<T>>()
                .expect("type-id <-> store mapping invariant");
            store.insert(self, e, v);
        }
        self.registry.borrow_mut().mask_mut(e).set(T::type_id());
    }

    /// Removes the `T` component at `e`, if any, firing its remove hook.
    pub fn remove_component<T: Component>(&self, e: Entity) -> Option<T> {
        let type_id = T::type_id();
        let removed = {
            let stores = self.stores.borrow();
            stores.get(&type_id).and_then(|cell| {
                let mut store_any = cell.borrow_mut();
                let store = store_any
                    .as_any_mut()
                    .downcast_mut::<ComponentStore<T>>()
                    .expect("type-id <-> store mapping invariant");
                store.remove(self, e)
            })
        };
        if removed.is_some() {
            self.registry.borrow_mut().mask_mut(e).clear(type_id);
        }
        removed
    }

    /// Runs `f` with read access to the `T` component at `e`, if any.
    /// A callback-scoped accessor (rather than returning a borrowed
    /// reference) sidesteps tying a return value's lifetime to the
    /// store's internal `RefCell` guard.
    pub fn read_component<T: Component, R>(&self, e: Entity, f: impl FnOnce(Option<&T>) -> R) -> R {
        let stores = self.stores.borrow();
        match stores.get(&T::type_id()) {
            Some(cell) => {
                let store_any = cell.borrow();
                let store = store_any
                    .as_any()
                    .downcast_ref::<ComponentStore<T>>()
                    .expect("type-id <-> store mapping invariant");
                f(store.get_or_null(e))
            }
            None => f(None),
        }
    }

    /// The `type_id`s of every component/tag currently set on `e`'s mask.
    /// Together with `read_component_erased`, this is the snapshot
    /// collaborator's "enumerate components per entity by `type_id`"
    /// primitive (§4.8).
    pub fn component_type_ids(&self, e: Entity) -> Vec<ComponentTypeId> {
        let mut ids = Vec::new();
        self.registry.borrow().mask(e).for_each_set_bit(|id| ids.push(id));
        ids
    }

    /// Type-erased counterpart to `read_component`, for callers (the
    /// snapshot collaborator) that only know a `type_id`, not a concrete
    /// `T`, at the call site.
    pub fn read_component_erased<R>(
        &self,
        e: Entity,
        type_id: ComponentTypeId,
        f: impl FnOnce(Option<&dyn std::any::Any>) -> R,
    ) -> R {
        let stores = self.stores.borrow();
        match stores.get(&type_id) {
            Some(cell) => f(cell.borrow().get_erased(e)),
            None => f(None),
        }
    }

    /// Type-erased counterpart to `insert_component`: the snapshot
    /// collaborator's "set `(entity, type_id, value)` via a wildcard
    /// insertion path" primitive (§4.8). `type_id` must already have a
    /// store registered (via some earlier typed `insert_component::<T>`
    /// call in this process); there is no way to construct a store for an
    /// unknown concrete type from a `type_id` alone.
    pub fn insert_component_erased(
        &self,
        e: Entity,
        type_id: ComponentTypeId,
        value: Box<dyn std::any::Any>,
    ) -> Result<()> {
        {
            let stores = self.stores.borrow();
            let cell = stores
                .get(&type_id)
                .ok_or(Error::UnknownComponentType { type_id })?;
            cell.borrow_mut().insert_erased(self, e, value);
        }
        self.registry.borrow_mut().mask_mut(e).set(type_id);
        Ok(())
    }

    /// Registers the add hook for component type `T`. Must be called
    /// before any system is added.
    pub fn on_component_add<T: Component>(
        &self,
        hook: impl FnMut(&World, Entity, &T) + 'static,
    ) -> Result<()> {
        self.check_hook_phase()?;
        self.get_or_create_store::<T>();
        let stores = self.stores.borrow();
        let cell = &stores[&T::type_id()];
        let mut store_any = cell.borrow_mut();
        let store = store_any
            .as_any_mut()
            .downcast_mut::<ComponentStore<T>>()
            .expect("type-id <-> store mapping invariant");
        store.on_add(hook)
    }

    /// Registers the remove hook for component type `T`. Must be called
    /// before any system is added.
    pub fn on_component_remove<T: Component>(
        &self,
        hook: impl FnMut(&World, Entity, &T) + 'static,
    ) -> Result<()> {
        self.check_hook_phase()?;
        self.get_or_create_store::<T>();
        let stores = self.stores.borrow();
        let cell = &stores[&T::type_id()];
        let mut store_any = cell.borrow_mut();
        let store = store_any
            .as_any_mut()
            .downcast_mut::<ComponentStore<T>>()
            .expect("type-id <-> store mapping invariant");
        store.on_remove(hook)
    }

    /// Registers the world-level entity-add hook. Must be called before
    /// any system is added.
    pub fn on_entity_added(&self, hook: impl FnMut(&World, Entity) + 'static) -> Result<()> {
        self.check_hook_phase()?;
        let mut slot = self.entity_add_hook.borrow_mut();
        if slot.is_some() {
            return Err(Error::HookAlreadyRegistered {
                target: "world",
                kind: HookKind::Add,
            });
        }
        *slot = Some(Box::new(hook));
        Ok(())
    }

    /// Registers the world-level entity-remove hook. Must be called
    /// before any system is added.
    pub fn on_entity_removed(&self, hook: impl FnMut(&World, Entity) + 'static) -> Result<()> {
        self.check_hook_phase()?;
        let mut slot = self.entity_remove_hook.borrow_mut();
        if slot.is_some() {
            return Err(Error::HookAlreadyRegistered {
                target: "world",
                kind: HookKind::Remove,
            });
        }
        *slot = Some(Box::new(hook));
        Ok(())
    }

    // ---- families -----------------------------------------------------

    fn resolve_family_index(&self, def: &FamilyDefinition) -> Result<usize> {
        if let Some(idx) = self
            .families
            .borrow()
            .iter()
            .position(|f| f.definition_matches(def))
        {
            return Ok(idx);
        }

        let mut family = Family::new(def)?;
        {
            let registry = self.registry.borrow();
            let mut live = Vec::new();
            registry.for_each_entity(|e| live.push((e, registry.mask(e))));
            family.backfill(live.into_iter());
        }
        let mut families = self.families.borrow_mut();
        families.push(family);
        log::debug!("created family #{}", families.len() - 1);
        Ok(families.len() - 1)
    }

    /// Returns the (deduplicated, backfilled) family for `def`.
    pub fn family(&self, def: FamilyDefinition) -> Result<FamilyHandle<'_>> {
        let index = self.resolve_family_index(&def)?;
        Ok(FamilyHandle { world: self, index })
    }

    pub(crate) fn for_each_in_family(
        &self,
        def: &FamilyDefinition,
        action: impl FnMut(&World, Entity),
    ) -> Result<()> {
        let index = self.resolve_family_index(def)?;
        self.for_each_in_family_by_index(index, action);
        Ok(())
    }

    fn for_each_in_family_by_index(&self, index: usize, mut action: impl FnMut(&World, Entity)) {
        let snapshot = {
            let mut families = self.families.borrow_mut();
            families[index].apply_pending_sort();
            families[index].members.snapshot()
        };

        let is_outer = !self.is_delayed_removal();
        if is_outer {
            self.set_delayed_removal(true);
        }
        for e in snapshot {
            action(self, e);
        }
        if is_outer {
            self.set_delayed_removal(false);
            self.flush_deferred();
        }
    }

    pub(crate) fn set_family_sort(
        &self,
        def: &FamilyDefinition,
        cmp: impl FnMut(Entity, Entity) -> Ordering + 'static,
        automatic: bool,
    ) -> Result<()> {
        let index = self.resolve_family_index(def)?;
        self.families.borrow_mut()[index].set_sort(cmp, automatic);
        Ok(())
    }

    // ---- systems --------------------------------------------------

    /// Adds `system`, calling its `on_init` immediately. Once any system
    /// has been added, hook registration (`on_entity_added`,
    /// `on_component_add`, `FamilyHandle::on_add`, ...) fails with
    /// [`Error::ConfigurationOrder`].
    pub fn add_system<T: System>(&self, system: T) -> Result<()> {
        let type_id = any::TypeId::of::<T>();
        if self.system_types.borrow().contains(&type_id) {
            return Err(Error::SystemAlreadyAdded {
                type_name: any::type_name::<T>(),
            });
        }
        self.system_types.borrow_mut().insert(type_id);
        self.systems_phase_started.set(true);

        let mut boxed: Box<dyn System> = Box::new(system);
        boxed.on_init(self);
        self.scheduler.borrow_mut().push(boxed);
        Ok(())
    }

    /// Convenience for adding an [`IteratingSystem`] built from a family
    /// definition and a per-entity closure.
    pub fn add_iterating_system(
        &self,
        definition: FamilyDefinition,
        interval: Interval,
        on_tick_entity: impl FnMut(&World, Entity) + 'static,
    ) -> Result<()> {
        self.add_system(IteratingSystem::new(definition, on_tick_entity).with_interval(interval))
    }

    /// Returns the registered system of concrete type `T`.
    pub fn get_system<T: System>(&self) -> Result<Ref<'_, T>> {
        let scheduler = self.scheduler.borrow();
        match scheduler.find_index::<T>() {
            Some(idx) => Ok(Ref::map(scheduler, |s| s.get::<T>(idx))),
            None => Err(Error::NoSuchSystem {
                type_name: any::type_name::<T>(),
            }),
        }
    }

    /// Sets `T`'s `enabled` flag, firing `on_enable`/`on_disable` on the
    /// corresponding transition.
    pub fn set_system_enabled<T: System>(&self, enabled: bool) -> Result<()> {
        let idx = self
            .scheduler
            .borrow()
            .find_index::<T>()
            .ok_or(Error::NoSuchSystem {
                type_name: any::type_name::<T>(),
            })?;
        self.scheduler.borrow_mut().set_enabled(self, idx, enabled);
        Ok(())
    }

    /// `true` iff `T` is currently enabled.
    pub fn is_system_enabled<T: System>(&self) -> Result<bool> {
        let idx = self
            .scheduler
            .borrow()
            .find_index::<T>()
            .ok_or(Error::NoSuchSystem {
                type_name: any::type_name::<T>(),
            })?;
        Ok(self.scheduler.borrow().is_enabled(idx))
    }

    // ---- lifecycle --------------------------------------------------

    /// Runs one tick: stores `dt`, drives every enabled system in
    /// registration order (respecting each system's `Interval`), then
    /// flushes any deferred removals left over outside family iteration.
    pub fn tick(&self, dt: f32) {
        self.current_delta.set(dt);
        self.scheduler.borrow_mut().tick(self, dt);
        self.flush_deferred();
    }

    /// Removes every entity, then calls `on_dispose` on every system in
    /// reverse registration order.
    pub fn dispose(&self) {
        self.remove_all(false);
        self.scheduler.borrow_mut().dispose(self);
    }
}

/// A handle to a deduplicated, backfilled [`Family`], bound to the
/// `World` it was resolved from.
pub struct FamilyHandle<'w> {
    world: &'w World,
    index: usize,
}

impl<'w> FamilyHandle<'w> {
    /// Number of entities currently in the family.
    pub fn len(&self) -> usize {
        self.world.families.borrow()[self.index].len()
    }

    /// `true` iff the family currently has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` iff `e` is currently a member.
    pub fn contains(&self, e: Entity) -> bool {
        self.world.families.borrow()[self.index].contains(e)
    }

    /// The first member. Panics if the family is empty.
    pub fn first(&self) -> Entity {
        self.world.families.borrow()[self.index]
            .first()
            .expect("family is empty")
    }

    /// The first member, or `None` if the family is empty.
    pub fn first_or_null(&self) -> Option<Entity> {
        self.world.families.borrow()[self.index].first()
    }

    /// Iterates a snapshot of the current membership, deferring any
    /// entity removal requested from within `action` until the
    /// outermost family iteration in progress (possibly this one)
    /// completes.
    pub fn for_each(&self, mut action: impl FnMut(Entity)) {
        self.world
            .for_each_in_family_by_index(self.index, |_world, e| action(e));
    }

    /// Attaches a sort comparator. `automatic = true` re-sorts before
    /// every `for_each`; `automatic = false` sorts only once
    /// [`Self::mark_sort_dirty`] has been called, then clears the flag.
    pub fn sort(&self, cmp: impl FnMut(Entity, Entity) -> Ordering + 'static, automatic: bool) {
        self.world.families.borrow_mut()[self.index].set_sort(cmp, automatic);
    }

    /// Flags a manual sort to run on the next `for_each`.
    pub fn mark_sort_dirty(&self) {
        self.world.families.borrow_mut()[self.index].mark_dirty();
    }

    /// Registers this family's add hook. Must be called before any
    /// system is added.
    pub fn on_add(&self, hook: impl FnMut(&World, Entity) + 'static) -> Result<()> {
        self.world.check_hook_phase()?;
        self.world.families.borrow_mut()[self.index].on_add(hook)
    }

    /// Registers this family's remove hook. Must be called before any
    /// system is added.
    pub fn on_remove(&self, hook: impl FnMut(&World, Entity) + 'static) -> Result<()> {
        self.world.check_hook_phase()?;
        self.world.families.borrow_mut()[self.index].on_remove(hook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy)]
    struct Position {
        #[allow(dead_code)]
        x: i32,
        #[allow(dead_code)]
        y: i32,
    }
    struct Dead;

    #[test]
    fn create_insert_and_family_membership() {
        let world = World::new(|_w| Ok(())).unwrap();
        let e1 = world.create_entity(|w, e| {
            w.insert_component(e, Position { x: 5, y: 0 });
        });

        let family = world
            .family(FamilyDefinition::new().all::<Position>().none::<Dead>())
            .unwrap();
        assert_eq!(family.len(), 1);
        assert_eq!(family.first(), e1);

        world.configure_entity(e1, |w, e| {
            w.insert_component(e, Dead);
        });
        assert_eq!(family.len(), 0);

        world.remove_component::<Dead>(e1);
        assert_eq!(family.len(), 1);
        assert_eq!(family.first(), e1);
    }

    #[test]
    fn deferred_removal_during_iteration() {
        struct Marker;
        let world = World::new(|_w| Ok(())).unwrap();
        let e1 = world.create_entity(|w, e| w.insert_component(e, Marker));
        let e2 = world.create_entity(|w, e| w.insert_component(e, Marker));
        let e3 = world.create_entity(|w, e| w.insert_component(e, Marker));

        let family = world.family(FamilyDefinition::new().all::<Marker>()).unwrap();

        let mut seen = Vec::new();
        family.for_each(|e| {
            seen.push(e);
            if e == e2 {
                world.remove_entity(e2);
            }
        });

        assert_eq!(seen, vec![e1, e2, e3]);
        assert_eq!(family.len(), 2);
        assert!(!world.has::<Marker>(e2));
    }

    #[test]
    fn generation_invalidates_stale_handle() {
        let world = World::new(|_w| Ok(())).unwrap();
        let e = world.create_entity(|_, _| {});
        world.remove_entity(e);
        let e2 = world.create_entity(|_, _| {});
        assert_eq!(e.id(), e2.id());
        assert!(e2.generation() > e.generation());
        assert_ne!(e, e2);
    }

    #[test]
    fn family_backfill_counts_preexisting_entities() {
        let world = World::new(|_w| Ok(())).unwrap();
        for _ in 0..100 {
            world.create_entity(|w, e| w.insert_component(e, Position { x: 0, y: 0 }));
        }
        let family = world.family(FamilyDefinition::new().all::<Position>()).unwrap();
        assert_eq!(family.len(), 100);
    }

    #[test]
    fn hooks_after_first_system_are_rejected() {
        struct NoopSystem;
        impl System for NoopSystem {
            fn on_tick(&mut self, _world: &World) {}
        }

        let world = World::new(|w| {
            w.add_system(NoopSystem)?;
            Ok(())
        })
        .unwrap();

        assert!(matches!(
            world.on_entity_added(|_, _| {}),
            Err(Error::ConfigurationOrder { .. })
        ));
    }

    #[test]
    fn wildcard_primitives_round_trip_a_component() {
        let world = World::new(|_w| Ok(())).unwrap();
        let e = world.create_entity(|w, e| w.insert_component(e, Position { x: 1, y: 2 }));

        let type_id = Position::type_id();
        assert_eq!(world.component_type_ids(e), vec![type_id]);

        world
            .read_component_erased(e, type_id, |v| {
                let p = v.unwrap().downcast_ref::<Position>().unwrap();
                assert_eq!((p.x, p.y), (1, 2));
            });

        world
            .insert_component_erased(e, type_id, Box::new(Position { x: 9, y: 9 }))
            .unwrap();
        world.read_component::<Position, _>(e, |p| assert_eq!((p.unwrap().x, p.unwrap().y), (9, 9)));
    }

    #[test]
    fn wildcard_insert_rejects_unknown_type_id() {
        let world = World::new(|_w| Ok(())).unwrap();
        let e = world.create_entity(|_, _| {});
        assert!(matches!(
            world.insert_component_erased(e, 12345, Box::new(Position { x: 0, y: 0 })),
            Err(Error::UnknownComponentType { type_id: 12345 })
        ));
    }

    #[test]
    fn create_entity_with_id_reissues_a_specific_id() {
        let world = World::new(|_w| Ok(())).unwrap();
        let e = world.create_entity_with_id(7, |_, _| {});
        assert_eq!(e.id(), 7);
        assert!(world.contains(e));
    }
}
