//! Carry capacity, group cohesion, and quorum sizing.
//!
//! All arithmetic is [`Decimal`] with saturating operations, so a group's
//! capacity compares exactly against an item's mass.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use quarry_types::{Ticket, WorkerSnapshot};

use crate::config::AllocationConfig;

/// Discipline of a worker with no lean either way.
const NEUTRAL_DISCIPLINE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Carry capacity of a single worker.
///
/// `max(0, (carry stat or base capacity) * scale + offset)`.
pub fn worker_capacity(worker: &WorkerSnapshot, config: &AllocationConfig) -> Decimal {
    worker
        .carry_capacity
        .unwrap_or(config.base_carry_capacity)
        .saturating_mul(worker.capacity_scale)
        .saturating_add(worker.capacity_offset)
        .max(Decimal::ZERO)
}

/// Cohesion factor of a group.
///
/// Average discipline above 0.5 raises the factor, below lowers it. Each
/// member past the first adds `cohesion_size_bonus`. The result is clamped
/// to `[cohesion_min, cohesion_max]`.
pub fn cohesion_factor(members: &[&WorkerSnapshot], config: &AllocationConfig) -> Decimal {
    let count = Decimal::from(members.len());
    let total = members
        .iter()
        .fold(Decimal::ZERO, |acc, w| acc.saturating_add(w.discipline));
    let average = total.checked_div(count).unwrap_or(NEUTRAL_DISCIPLINE);

    let discipline_term = config
        .cohesion_discipline_sensitivity
        .saturating_mul(average.saturating_sub(NEUTRAL_DISCIPLINE));
    let extra_members = Decimal::from(members.len().saturating_sub(1));
    let size_term = config.cohesion_size_bonus.saturating_mul(extra_members);

    config
        .cohesion_base
        .saturating_add(discipline_term)
        .saturating_add(size_term)
        .max(config.cohesion_min)
        .min(config.cohesion_max)
}

/// Summed member capacity scaled by the group's cohesion factor.
pub fn aggregate_capacity(members: &[&WorkerSnapshot], config: &AllocationConfig) -> Decimal {
    if members.is_empty() {
        return Decimal::ZERO;
    }
    let raw = members
        .iter()
        .fold(Decimal::ZERO, |acc, w| acc.saturating_add(worker_capacity(w, config)));
    raw.saturating_mul(cohesion_factor(members, config))
}

/// Workers needed to lift `item_mass` in the least cohesive case.
///
/// `ceil(item_mass / (base_carry_capacity * cohesion_min))`. Returns
/// `u32::MAX` when the divisor is zero or the result does not fit.
pub fn estimated_workers(item_mass: Decimal, config: &AllocationConfig) -> u32 {
    config
        .base_carry_capacity
        .checked_mul(config.cohesion_min)
        .and_then(|per_worker| item_mass.checked_div(per_worker))
        .and_then(|n| n.ceil().to_u32())
        .unwrap_or(u32::MAX)
}

/// Number of members a quorum-gated ticket needs before it can start.
///
/// The mass estimate is capped at `group_max_workers`; the ticket's own
/// `max(min_workers, required_workers)` is not. A ticket asking for more
/// workers than a group may hold never fills.
pub fn quorum(ticket: &Ticket, config: &AllocationConfig) -> u32 {
    let explicit = ticket.min_workers.max(ticket.required_workers);
    let by_mass = ticket.heavy.map_or(0, |heavy| {
        estimated_workers(heavy.item_mass, config).min(config.group_max_workers)
    });
    explicit.max(by_mass).max(1)
}
