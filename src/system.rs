//! Ordered systems and the fixed/variable-interval scheduler that drives
//! them.

use std::cmp::Ordering;

use crate::entity::Entity;
use crate::family::FamilyDefinition;
use crate::world::World;

/// How often a system's `on_tick` runs relative to `world.tick(dt)` calls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Interval {
    /// Runs once per `world.tick` call, regardless of `dt`.
    EachFrame,
    /// Accumulates `dt` and runs `on_tick` once per full `step`, with the
    /// residual passed to `on_alpha` as a ratio in `[0, 1)`.
    Fixed(f32),
}

/// A unit of periodic work, optionally bound to a [`crate::family::Family`]
/// via [`IteratingSystem`].
///
/// Downcasting through `dyn System` (for [`crate::world::World::get_system`])
/// is provided by `mopa`, the same trait-object-downcast mechanism the
/// teacher crate this was built from uses for its own heterogeneous
/// storage/system handling.
pub trait System: mopa::Any {
    /// Called once, immediately after this system is added to the world.
    fn on_init(&mut self, _world: &World) {}

    /// Called when `enabled` transitions from `false` to `true`.
    fn on_enable(&mut self, _world: &World) {}

    /// Called when `enabled` transitions from `true` to `false`.
    fn on_disable(&mut self, _world: &World) {}

    /// The system's unit of work for one `interval` step.
    fn on_tick(&mut self, world: &World);

    /// Called with the residual fraction of a `Fixed` interval's
    /// accumulator after all whole steps have been consumed this tick.
    /// Never called for `EachFrame` systems.
    fn on_alpha(&mut self, _world: &World, _alpha: f32) {}

    /// Called once, in reverse registration order, from `World::dispose`.
    fn on_dispose(&mut self, _world: &World) {}

    /// This system's tick cadence. Defaults to `EachFrame`.
    fn interval(&self) -> Interval {
        Interval::EachFrame
    }
}

mopa::mopafy!(System);

struct ScheduledSystem {
    system: Box<dyn System>,
    interval: Interval,
    enabled: bool,
    accumulator: f32,
}

/// Ordered list of systems with fixed/variable interval ticking, dispose
/// order, and enable/disable transition hooks.
#[derive(Default)]
pub struct SystemScheduler {
    systems: Vec<ScheduledSystem>,
}

impl SystemScheduler {
    pub fn new() -> Self {
        SystemScheduler::default()
    }

    pub(crate) fn push(&mut self, system: Box<dyn System>) {
        let interval = system.interval();
        self.systems.push(ScheduledSystem {
            system,
            interval,
            enabled: true,
            accumulator: 0.0,
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.systems.len()
    }

    pub(crate) fn find_index<T: System>(&self) -> Option<usize> {
        self.systems
            .iter()
            .position(|s| s.system.downcast_ref::<T>().is_some())
    }

    pub(crate) fn get<T: System>(&self, index: usize) -> &T {
        self.systems[index]
            .system
            .downcast_ref::<T>()
            .expect("index resolved by find_index")
    }

    pub(crate) fn get_mut<T: System>(&mut self, index: usize) -> &mut T {
        self.systems[index]
            .system
            .downcast_mut::<T>()
            .expect("index resolved by find_index")
    }

    pub(crate) fn is_enabled(&self, index: usize) -> bool {
        self.systems[index].enabled
    }

    /// Sets `enabled`, firing `on_enable`/`on_disable` exactly on the
    /// corresponding transition.
    pub(crate) fn set_enabled(&mut self, world: &World, index: usize, enabled: bool) {
        let was = self.systems[index].enabled;
        if was == enabled {
            return;
        }
        self.systems[index].enabled = enabled;
        if enabled {
            self.systems[index].system.on_enable(world);
        } else {
            self.systems[index].system.on_disable(world);
        }
    }

    /// Runs every enabled system in registration order for one
    /// `world.tick(dt)` call.
    pub(crate) fn tick(&mut self, world: &World, dt: f32) {
        for scheduled in self.systems.iter_mut() {
            if !scheduled.enabled {
                continue;
            }
            match scheduled.interval {
                Interval::EachFrame => {
                    log::trace!("ticking system (each-frame)");
                    scheduled.system.on_tick(world);
                }
                Interval::Fixed(step) => {
                    scheduled.accumulator += dt;
                    let mut steps = 0;
                    while scheduled.accumulator >= step {
                        log::trace!("ticking system (fixed step={})", step);
                        scheduled.system.on_tick(world);
                        scheduled.accumulator -= step;
                        steps += 1;
                    }
                    if steps > 0 {
                        log::trace!("fixed-interval system ran {} step(s)", steps);
                    }
                    let alpha = scheduled.accumulator / step;
                    scheduled.system.on_alpha(world, alpha);
                }
            }
        }
    }

    /// Calls `on_dispose` on every system, in reverse registration order.
    pub(crate) fn dispose(&mut self, world: &World) {
        for scheduled in self.systems.iter_mut().rev() {
            scheduled.system.on_dispose(world);
        }
    }
}

/// A [`System`] bound to a single family: `on_tick` is defined as
/// `family.for_each(on_tick_entity)`.
pub struct IteratingSystem {
    definition: FamilyDefinition,
    interval: Interval,
    on_tick_entity: Box<dyn FnMut(&World, Entity)>,
    on_alpha_entity: Option<Box<dyn FnMut(&World, Entity, f32)>>,
    sort: Option<(Box<dyn FnMut(Entity, Entity) -> Ordering>, bool)>,
}

impl IteratingSystem {
    /// Creates a system that calls `on_tick_entity` for every member of
    /// the family matching `definition`, once per `interval` step.
    pub fn new(
        definition: FamilyDefinition,
        on_tick_entity: impl FnMut(&World, Entity) + 'static,
    ) -> Self {
        IteratingSystem {
            definition,
            interval: Interval::EachFrame,
            on_tick_entity: Box::new(on_tick_entity),
            on_alpha_entity: None,
            sort: None,
        }
    }

    /// Sets the tick cadence (default `EachFrame`).
    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    /// Attaches a per-entity callback for the residual `Fixed`-interval
    /// alpha, called once per family member after `on_tick_entity`'s steps
    /// for this tick.
    pub fn with_alpha(mut self, on_alpha_entity: impl FnMut(&World, Entity, f32) + 'static) -> Self {
        self.on_alpha_entity = Some(Box::new(on_alpha_entity));
        self
    }

    /// Attaches a sort comparator. `automatic = true` re-sorts before
    /// every iteration; `automatic = false` sorts only when
    /// `World::mark_family_sort_dirty` has flagged this family.
    pub fn with_sort(
        mut self,
        cmp: impl FnMut(Entity, Entity) -> Ordering + 'static,
        automatic: bool,
    ) -> Self {
        self.sort = Some((Box::new(cmp), automatic));
        self
    }
}

impl System for IteratingSystem {
    fn on_init(&mut self, world: &World) {
        if let Some((cmp, automatic)) = self.sort.take() {
            world
                .set_family_sort(&self.definition, cmp, automatic)
                .expect("family definition was validated at construction");
        }
    }

    fn on_tick(&mut self, world: &World) {
        let on_tick_entity = &mut self.on_tick_entity;
        world
            .for_each_in_family(&self.definition, |w, e| on_tick_entity(w, e))
            .expect("family definition was validated at construction");
    }

    fn on_alpha(&mut self, world: &World, alpha: f32) {
        if let Some(on_alpha_entity) = self.on_alpha_entity.as_mut() {
            world
                .for_each_in_family(&self.definition, |w, e| on_alpha_entity(w, e, alpha))
                .expect("family definition was validated at construction");
        }
    }

    fn interval(&self) -> Interval {
        self.interval
    }
}
