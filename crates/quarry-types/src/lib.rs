//! Shared type definitions for the Quarry work-allocation core.
//!
//! This crate is the single source of truth for the data model shared by
//! the allocation passes, the simulation harness, and the engine binary.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for workers and sources, plus the
//!   generational [`TicketId`] arena handle
//! - [`enums`] -- Enumeration types (resources, ticket states, roles, phases)
//! - [`structs`] -- Tickets, assignments, group memberships, and the per-tick
//!   world snapshot consumed by the allocator

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{GroupStatus, JobPhase, ResourceType, SourceKind, TicketState, WorkerRole};
pub use ids::{SourceId, TicketId, WorkerId};
pub use structs::{
    GroupMembership, HeavyLoad, Position, SourceSnapshot, Ticket, TicketKey, TicketKind,
    WorkerAssignment, WorkerSnapshot, WorldSnapshot,
};
