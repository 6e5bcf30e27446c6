//! Work-ticket allocation for the Quarry simulation.
//!
//! Harvestable sources publish work as tickets; workers compete for them
//! under distance, role, capacity, and timing constraints. Each simulation
//! tick runs five passes in a fixed order over one [`WorldSnapshot`]:
//!
//! 1. **Cleanup** -- cancel tickets whose source vanished, finish tickets
//!    whose source is exhausted, revert expired claims to `Open`.
//! 2. **Spawner** -- publish one `Open` ticket per live (source, resource).
//! 3. **Claim** -- bind each `Open` ticket to the nearest idle, eligible,
//!    role-compatible worker under a time-boxed claim.
//! 4. **Group assembly** -- recruit extra workers for heavy or multi-worker
//!    tickets and gate `Claimed -> InProgress` on quorum and capacity.
//! 5. **Batch attach** -- hand nearby same-resource tickets to workers that
//!    already hold a primary ticket.
//!
//! # Modules
//!
//! - [`allocator`] -- [`Allocator`]: the pipeline entry point plus the
//!   operations the movement layer calls (`renew_claim`, `release_worker`).
//! - [`arena`] -- Generational ticket arena.
//! - [`capacity`] -- Per-worker carry capacity and the group cohesion factor.
//! - [`config`] -- [`AllocationConfig`] tuning knobs and validation.
//! - [`context`] -- [`TickContext`] supplied by the world clock.
//! - [`error`] -- [`AllocError`].
//! - [`report`] -- [`TickReport`] counters for one tick.
//! - [`state`] -- [`AllocationState`]: tickets, assignments, and groups.
//!
//! The pass modules are private; they are only reachable through
//! [`Allocator::run_tick`].
//!
//! [`WorldSnapshot`]: quarry_types::WorldSnapshot

pub mod allocator;
pub mod arena;
pub mod capacity;
pub mod config;
pub mod context;
pub mod error;
pub mod report;
pub mod state;

mod batch;
mod claim;
mod cleanup;
mod group;
mod select;
mod spawner;

pub use allocator::Allocator;
pub use config::AllocationConfig;
pub use context::TickContext;
pub use error::AllocError;
pub use report::{TickReport, TicketCounts};
pub use state::AllocationState;
