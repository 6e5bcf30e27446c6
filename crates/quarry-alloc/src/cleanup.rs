//! Ticket cleanup: the first pass of every tick.
//!
//! Cleanup is the only place a claim is forced back to `Open`. It also
//! finishes tickets whose source ran dry and cancels tickets whose source
//! vanished, so that the spawner's dedup set never sees a stale key.

use quarry_types::{TicketId, TicketState, WorldSnapshot};
use tracing::debug;

use crate::config::AllocationConfig;
use crate::context::PassContext;
use crate::report::{TickReport, bump};
use crate::state::AllocationState;

/// Run the cleanup pass.
pub(crate) fn run(
    state: &mut AllocationState,
    world: &WorldSnapshot,
    config: &AllocationConfig,
    pass: &PassContext,
    report: &mut TickReport,
) {
    drop_stale_workers(state, world, report);
    settle_tickets(state, world, pass, report);
    dissolve_idle_groups(state);
    retire_terminal(state, config, pass, report);
    state.scrub_assignments(pass.now);
}

/// Forget assignment records of workers that left the world.
///
/// Their tickets keep the claim until it lapses.
fn drop_stale_workers(state: &mut AllocationState, world: &WorldSnapshot, report: &mut TickReport) {
    state.assignments.retain(|worker, _| {
        let alive = world.workers.contains_key(worker);
        if !alive {
            debug!(worker = %worker, "Dropping assignment of vanished worker");
            bump(&mut report.stale_workers);
        }
        alive
    });
}

fn settle_tickets(
    state: &mut AllocationState,
    world: &WorldSnapshot,
    pass: &PassContext,
    report: &mut TickReport,
) {
    for ticket in state.tickets.iter_mut() {
        if ticket.state.is_terminal() {
            continue;
        }

        let Some(source) = world.source(ticket.source()) else {
            debug!(ticket = %ticket.id, source = %ticket.source(), "Source vanished, cancelling");
            ticket.transition(TicketState::Cancelled, pass.now);
            bump(&mut report.cancelled);
            continue;
        };

        if source.kind != ticket.origin() || source.resource != ticket.resource() {
            debug!(ticket = %ticket.id, source = %source.id, "Source no longer matches, cancelling");
            ticket.transition(TicketState::Cancelled, pass.now);
            bump(&mut report.cancelled);
            continue;
        }

        if source.is_exhausted() {
            debug!(ticket = %ticket.id, source = %source.id, "Source exhausted");
            ticket.transition(TicketState::Done, pass.now);
            bump(&mut report.done);
            continue;
        }

        // Movement reports progress through the source amount.
        ticket.work_amount = source.remaining;

        let lapsed = ticket.state == TicketState::Claimed
            && ticket.claim_expiry.is_some_and(|expiry| pass.now >= expiry);
        if lapsed {
            debug!(
                ticket = %ticket.id,
                assignee = ?ticket.assignee,
                expiry = ?ticket.claim_expiry,
                "Claim expired, reopening"
            );
            ticket.transition(TicketState::Open, pass.now);
            bump(&mut report.expired);
        }
    }
}

/// Groups only exist while their ticket is held.
fn dissolve_idle_groups(state: &mut AllocationState) {
    let tickets = &state.tickets;
    state
        .groups
        .retain(|id, _| tickets.get(*id).is_some_and(|t| t.state.is_held()));
}

fn retire_terminal(
    state: &mut AllocationState,
    config: &AllocationConfig,
    pass: &PassContext,
    report: &mut TickReport,
) {
    let retired: Vec<TicketId> = state
        .tickets
        .iter()
        .filter(|t| {
            t.state.is_terminal()
                && pass.now.saturating_sub(t.last_state_change_tick)
                    >= config.terminal_retention_ticks
        })
        .map(|t| t.id)
        .collect();
    for id in retired {
        if state.tickets.remove(id).is_some() {
            bump(&mut report.retired);
        }
    }
}
