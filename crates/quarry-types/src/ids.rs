//! Type-safe identifier wrappers.
//!
//! Workers and sources are owned by systems outside the allocator, so they
//! are referenced by UUID newtypes. All IDs use UUID v7 (time-ordered) when
//! generated app-side; tests and replays build them from fixed values with
//! [`Uuid::from_u128`] so identity ordering is reproducible.
//!
//! Tickets are owned by the allocator and live in a generational arena, so
//! a [`TicketId`] is an `(index, generation)` pair rather than a UUID.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Create an identifier from a fixed integer (replays, tests).
            pub const fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a mobile worker.
    WorkerId
}

define_id! {
    /// Unique identifier for a harvestable source (resource node or pile).
    SourceId
}

/// Generational handle into the ticket arena.
///
/// A slot index is reused after its ticket is retired, but the generation
/// is bumped, so a stale handle held by movement code never aliases the
/// slot's new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TicketId {
    index: u32,
    generation: u32,
}

impl TicketId {
    /// Build a handle from its raw parts.
    pub const fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the arena.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl core::fmt::Display for TicketId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "T{}v{}", self.index, self.generation)
    }
}
