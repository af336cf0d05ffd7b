//! Crate-wide error type.
//!
//! Recoverable conditions (a missing component, a missing system, a
//! misconfigured world) surface as [`Error`] variants. Programmer errors —
//! an out-of-range index reaching internal storage — are panics and never
//! appear here; see the module docs on [`crate::bitset::Bitset`].

use std::fmt;

use crate::entity::Entity;

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Every recoverable failure mode this crate can produce.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// `ComponentStore::get` was called for an entity that does not carry
    /// that component.
    #[error("entity {entity} has no component of type {type_name}")]
    NoSuchComponent {
        /// The entity that was queried.
        entity: Entity,
        /// Diagnostic name of the missing component type.
        type_name: &'static str,
    },

    /// `World::get_system` found no system of the requested type.
    #[error("no system of type {type_name} is registered")]
    NoSuchSystem {
        /// Diagnostic name of the system type.
        type_name: &'static str,
    },

    /// `World::add_system` was called twice with the same concrete type.
    #[error("a system of type {type_name} has already been added")]
    SystemAlreadyAdded {
        /// Diagnostic name of the system type.
        type_name: &'static str,
    },

    /// A hook slot (world entity hook, family hook, component-store hook)
    /// was assigned a second time.
    #[error("a {kind} hook is already registered for {target}")]
    HookAlreadyRegistered {
        /// What the hook is attached to (e.g. a component type name, or
        /// "world").
        target: &'static str,
        /// Which hook slot ("add" or "remove").
        kind: HookKind,
    },

    /// A `FamilyDefinition` with `all`, `none`, and `any` all empty was
    /// passed to `World::family`.
    #[error("a family definition must set at least one of all/none/any")]
    InvalidFamily,

    /// `World::insert_component_erased`/`read_component_erased` was given
    /// a `type_id` with no store registered for it yet — the wildcard
    /// insertion path (§4.8) can only target component types this process
    /// has already seen through a typed `insert_component::<T>` call.
    #[error("no component store is registered for type_id {type_id}")]
    UnknownComponentType {
        /// The unrecognized type-id.
        type_id: crate::component::ComponentTypeId,
    },

    /// The world was mutated outside of the three-phase configuration
    /// order described in `World::new`, or a system was registered before
    /// hook registration completed.
    #[error("world configuration order violated: {reason}")]
    ConfigurationOrder {
        /// Human-readable explanation of what was attempted out of order.
        reason: &'static str,
    },

    /// Reserved for the external snapshot collaborator (see §4.8/§6 of the
    /// design spec); this crate never constructs this variant itself, but
    /// keeps it so a snapshot crate built on these primitives has a stable
    /// error type to wrap its own malformed-input errors in.
    #[error("invalid snapshot: {reason}")]
    InvalidSnapshot {
        /// Why the snapshot collaborator rejected the input.
        reason: String,
    },
}

/// Which hook slot a [`Error::HookAlreadyRegistered`] refers to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HookKind {
    /// The "on add" slot.
    Add,
    /// The "on remove" slot.
    Remove,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::Add => write!(f, "add"),
            HookKind::Remove => write!(f, "remove"),
        }
    }
}
