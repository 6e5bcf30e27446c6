//! Ticket claim: binds each `Open` ticket to the nearest free worker.

use std::collections::BTreeSet;

use quarry_types::{TicketId, TicketKey, TicketState, WorkerId, WorldSnapshot};
use tracing::debug;

use crate::context::PassContext;
use crate::report::{TickReport, bump};
use crate::select::nearest;
use crate::state::AllocationState;

/// Run the claim pass.
pub(crate) fn run(
    state: &mut AllocationState,
    world: &WorldSnapshot,
    pass: &PassContext,
    report: &mut TickReport,
) {
    let mut open: Vec<(TicketKey, TicketId)> = state
        .tickets
        .iter()
        .filter(|t| t.state == TicketState::Open)
        .map(|t| (t.key, t.id))
        .collect();
    open.sort_unstable();

    let mut taken: BTreeSet<WorkerId> = BTreeSet::new();

    for (key, id) in open {
        let Some(source) = world.source(key.source) else {
            if let Some(ticket) = state.tickets.get_mut(id) {
                debug!(ticket = %id, source = %key.source, "Claim target unresolvable, cancelling");
                ticket.transition(TicketState::Cancelled, pass.now);
                bump(&mut report.cancelled);
            }
            continue;
        };
        if source.is_exhausted() {
            continue;
        }

        let origin = key.kind.origin();
        let candidates = world.workers.values().filter(|w| {
            w.is_available()
                && !taken.contains(&w.id)
                && state.is_unassigned(w.id)
                && w.role.can_work(origin, key.resource)
        });
        let Some(worker) = nearest(candidates, |w| {
            (w.position.distance_squared(source.position), w.id)
        }) else {
            continue;
        };

        if state.commit_claim(id, worker.id, pass) {
            debug!(ticket = %id, worker = %worker.id, expiry = pass.expiry(), "Ticket claimed");
            taken.insert(worker.id);
            bump(&mut report.claimed);
        }
    }
}

#[cfg(test)]
mod tests {
    use quarry_types::{
        JobPhase, Position, ResourceType, SourceId, SourceKind, SourceSnapshot, Ticket,
        TicketKind, WorkerRole, WorkerSnapshot,
    };

    use super::*;

    const PASS: PassContext = PassContext {
        now: 1,
        ttl_ticks: 6,
    };

    fn add_ticket(state: &mut AllocationState, source: &SourceSnapshot) -> TicketId {
        state
            .tickets
            .insert_with(|id| Ticket {
                id,
                key: TicketKey {
                    source: source.id,
                    resource: source.resource,
                    kind: TicketKind::Gather {
                        origin: source.kind,
                    },
                },
                state: TicketState::Open,
                assignee: None,
                claim_expiry: None,
                last_state_change_tick: 0,
                required_workers: 1,
                min_workers: 1,
                heavy: None,
                work_amount: source.remaining,
            })
            .unwrap_or(TicketId::from_parts(u32::MAX, 0))
    }

    fn pile(n: u128, x: f32) -> SourceSnapshot {
        SourceSnapshot::new(
            SourceId::from_u128(n),
            SourceKind::Pile,
            ResourceType::Stone,
            Position::new(x, 0.0),
            10,
        )
    }

    fn hauler(n: u128, x: f32) -> WorkerSnapshot {
        WorkerSnapshot::new(WorkerId::from_u128(n), Position::new(x, 0.0), WorkerRole::Hauler)
    }

    fn claim(state: &mut AllocationState, world: &WorldSnapshot) -> TickReport {
        let mut report = TickReport::new(PASS.now);
        run(state, world, &PASS, &mut report);
        report
    }

    #[test]
    fn nearest_worker_wins() {
        let mut world = WorldSnapshot::new();
        let source = pile(1, 0.0);
        world.insert_source(source.clone());
        world.insert_worker(hauler(10, 9.0));
        world.insert_worker(hauler(11, 2.0));
        let mut state = AllocationState::new();
        let id = add_ticket(&mut state, &source);

        assert_eq!(claim(&mut state, &world).claimed, 1);
        let ticket = state.ticket(id);
        assert_eq!(ticket.and_then(|t| t.assignee), Some(WorkerId::from_u128(11)));
        assert_eq!(ticket.and_then(|t| t.claim_expiry), Some(7));
        assert_eq!(state.primary_of(WorkerId::from_u128(11)), Some(id));
        assert!(state.is_unassigned(WorkerId::from_u128(10)));
    }

    #[test]
    fn equal_distance_goes_to_lower_id() {
        let mut world = WorldSnapshot::new();
        let source = pile(1, 0.0);
        world.insert_source(source.clone());
        world.insert_worker(hauler(20, -3.0));
        world.insert_worker(hauler(12, 3.0));
        let mut state = AllocationState::new();
        let id = add_ticket(&mut state, &source);

        let _ = claim(&mut state, &world);
        assert_eq!(
            state.ticket(id).and_then(|t| t.assignee),
            Some(WorkerId::from_u128(12))
        );
    }

    #[test]
    fn one_primary_per_worker() {
        let mut world = WorldSnapshot::new();
        let a = pile(1, 0.0);
        let b = pile(2, 1.0);
        world.insert_source(a.clone());
        world.insert_source(b.clone());
        world.insert_worker(hauler(10, 0.0));
        let mut state = AllocationState::new();
        let _ = add_ticket(&mut state, &a);
        let _ = add_ticket(&mut state, &b);

        assert_eq!(claim(&mut state, &world).claimed, 1);
        assert_eq!(state.counts().open, 1);
        assert_eq!(state.counts().claimed, 1);
    }

    #[test]
    fn roles_must_match() {
        let mut world = WorldSnapshot::new();
        let node = SourceSnapshot::new(
            SourceId::from_u128(1),
            SourceKind::Node,
            ResourceType::Ore,
            Position::default(),
            10,
        );
        world.insert_source(node.clone());
        world.insert_worker(hauler(10, 0.0));
        world.insert_worker(WorkerSnapshot::new(
            WorkerId::from_u128(11),
            Position::default(),
            WorkerRole::Gatherer(ResourceType::Wood),
        ));
        let mut state = AllocationState::new();
        let id = add_ticket(&mut state, &node);

        assert_eq!(claim(&mut state, &world).claimed, 0);

        world.insert_worker(WorkerSnapshot::new(
            WorkerId::from_u128(12),
            Position::new(50.0, 50.0),
            WorkerRole::Gatherer(ResourceType::Ore),
        ));
        assert_eq!(claim(&mut state, &world).claimed, 1);
        assert_eq!(
            state.ticket(id).and_then(|t| t.assignee),
            Some(WorkerId::from_u128(12))
        );
    }

    #[test]
    fn busy_or_ineligible_workers_are_skipped() {
        let mut world = WorldSnapshot::new();
        let source = pile(1, 0.0);
        world.insert_source(source.clone());
        let mut busy = hauler(10, 0.0);
        busy.phase = JobPhase::Delivering;
        world.insert_worker(busy);
        let mut tired = hauler(11, 0.0);
        tired.eligible = false;
        world.insert_worker(tired);
        let mut state = AllocationState::new();
        let _ = add_ticket(&mut state, &source);

        assert_eq!(claim(&mut state, &world).claimed, 0);
    }

    #[test]
    fn missing_source_cancels_immediately() {
        let mut world = WorldSnapshot::new();
        world.insert_worker(hauler(10, 0.0));
        let mut state = AllocationState::new();
        let id = add_ticket(&mut state, &pile(1, 0.0));

        let report = claim(&mut state, &world);
        assert_eq!(report.cancelled, 1);
        assert_eq!(state.ticket(id).map(|t| t.state), Some(TicketState::Cancelled));
        assert!(state.is_unassigned(WorkerId::from_u128(10)));
    }
}
