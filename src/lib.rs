//! A lightweight, single-threaded Entity-Component-System runtime.
//!
//! Entities are `(id, generation)` handles managed by a recycling
//! allocator ([`entity`]). Components live in per-type sparse storage
//! ([`component`]). Groups of entities matching an `(all, none, any)`
//! predicate over component masks are maintained incrementally as
//! [`family::Family`] indices, and [`system::System`]s are driven from a
//! fixed/variable-interval [`system::SystemScheduler`]. The [`world::World`]
//! façade ties all of this together and is the only type most callers
//! need to hold onto.
//!
//! ```
//! use ecs_core::prelude::*;
//!
//! struct Position { x: f32, y: f32 }
//! struct Velocity { dx: f32, dy: f32 }
//!
//! let world = World::new(|_w| Ok(())).unwrap();
//! let e = world.create_entity(|w, e| {
//!     w.insert_component(e, Position { x: 0.0, y: 0.0 });
//!     w.insert_component(e, Velocity { dx: 1.0, dy: 0.0 });
//! });
//!
//! world
//!     .add_iterating_system(
//!         FamilyDefinition::new().all::<Position>().all::<Velocity>(),
//!         Interval::EachFrame,
//!         |w, e| {
//!             w.read_component::<Velocity, _>(e, |v| {
//!                 if let Some(v) = v {
//!                     let (dx, dy) = (v.dx, v.dy);
//!                     w.remove_component::<Position>(e);
//!                     w.insert_component(e, Position { x: dx, y: dy });
//!                 }
//!             });
//!         },
//!     )
//!     .unwrap();
//!
//! world.tick(1.0 / 60.0);
//! # let _ = e;
//! ```

pub mod bag;
pub mod bitset;
pub mod component;
pub mod entity;
pub mod error;
pub mod family;
pub mod registry;
pub mod system;
pub mod world;

/// The common imports most callers of this crate need.
pub mod prelude {
    pub use crate::component::{Component, ComponentStore};
    pub use crate::entity::Entity;
    pub use crate::error::{Error, Result};
    pub use crate::family::FamilyDefinition;
    pub use crate::system::{Interval, IteratingSystem, System};
    pub use crate::world::{FamilyHandle, World};
}
