//! Batch attach: lets a worker already heading to a target pick up nearby
//! ordinary tickets of the same kind on the way.

use std::collections::BTreeSet;

use quarry_types::{Position, SourceId, TicketId, TicketState, WorkerId, WorldSnapshot};
use tracing::debug;

use crate::config::AllocationConfig;
use crate::context::PassContext;
use crate::report::{TickReport, bump};
use crate::select::nearest;
use crate::state::AllocationState;

/// An `Open` ticket that might join a batch.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: TicketId,
    source: SourceId,
    position: Position,
    work: u32,
}

/// Run the batch attach pass.
pub(crate) fn run(
    state: &mut AllocationState,
    world: &WorldSnapshot,
    config: &AllocationConfig,
    pass: &PassContext,
    report: &mut TickReport,
) {
    let holders: Vec<WorkerId> = state.assignments.keys().copied().collect();
    let mut taken: BTreeSet<TicketId> = BTreeSet::new();
    let max_extra = config.max_batch_tickets.saturating_sub(1);

    for worker_id in holders {
        let Some(worker) = world.worker(worker_id) else {
            continue;
        };
        if !worker.phase.accepts_batch() {
            continue;
        }
        let Some(primary) = state
            .primary_of(worker_id)
            .and_then(|id| state.ticket(id))
            .filter(|t| {
                t.state == TicketState::Claimed
                    && t.assignee == Some(worker_id)
                    && !t.is_quorum_gated()
            })
        else {
            continue;
        };
        let Some(target) = world.source(primary.source()) else {
            continue;
        };
        let (resource, origin, anchor) = (primary.resource(), primary.origin(), target.position);

        let (len, mut work) = state.refresh_batch(worker_id);
        let len = u32::try_from(len).unwrap_or(u32::MAX);
        let slots = max_extra
            .saturating_sub(len)
            .min(config.max_attach_per_tick);
        if slots == 0 {
            continue;
        }

        let mut pool: Vec<Candidate> = state
            .tickets
            .iter()
            .filter(|t| {
                t.state == TicketState::Open
                    && !t.is_quorum_gated()
                    && t.resource() == resource
                    && t.origin() == origin
                    && !taken.contains(&t.id)
            })
            .filter_map(|t| {
                let source = world.source(t.source())?;
                if source.is_exhausted() || !source.position.within(anchor, config.attach_radius) {
                    return None;
                }
                Some(Candidate {
                    id: t.id,
                    source: source.id,
                    position: source.position,
                    work: t.work_amount,
                })
            })
            .collect();

        for _ in 0..slots {
            let fits = pool.iter().filter(|c| {
                work.checked_add(c.work)
                    .is_some_and(|total| total <= config.max_batch_work_units)
            });
            let Some(pick) = nearest(fits, |c| (c.position.distance_squared(anchor), c.source))
                .copied()
            else {
                break;
            };
            pool.retain(|c| c.id != pick.id);

            if state.attach_batch(worker_id, pick.id, pass) {
                taken.insert(pick.id);
                work = work.saturating_add(pick.work);
                bump(&mut report.attached);
                debug!(worker = %worker_id, ticket = %pick.id, batch_work = work, "Attached batch ticket");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use quarry_types::{
        JobPhase, ResourceType, SourceKind, SourceSnapshot, Ticket, TicketKey, TicketKind,
        WorkerRole, WorkerSnapshot,
    };

    use super::*;

    const WORKER: WorkerId = WorkerId::from_u128(100);
    const PASS: PassContext = PassContext {
        now: 2,
        ttl_ticks: 6,
    };

    fn pile(n: u128, x: f32, remaining: u32) -> SourceSnapshot {
        SourceSnapshot::new(
            SourceId::from_u128(n),
            SourceKind::Pile,
            ResourceType::Stone,
            Position::new(x, 0.0),
            remaining,
        )
    }

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

    /// A worker holding a claim on a pile at the origin, plus `others`.
    fn setup(others: &[SourceSnapshot]) -> (AllocationState, WorldSnapshot, Vec<TicketId>) {
        let mut world = WorldSnapshot::new();
        let mut state = AllocationState::new();
        let primary_source = pile(1, 0.0, 10);
        world.insert_source(primary_source.clone());
        let primary = add_ticket(&mut state, &primary_source);
        let mut worker = WorkerSnapshot::new(WORKER, Position::new(-5.0, 0.0), WorkerRole::Hauler);
        worker.phase = JobPhase::Navigating;
        world.insert_worker(worker);
        let _ = state.commit_claim(primary, WORKER, &PASS);

        let ids = others
            .iter()
            .map(|s| {
                world.insert_source(s.clone());
                add_ticket(&mut state, s)
            })
            .collect();
        (state, world, ids)
    }

    fn attach(state: &mut AllocationState, world: &WorldSnapshot, config: &AllocationConfig) -> u32 {
        let mut report = TickReport::new(PASS.now);
        run(state, world, config, &PASS, &mut report);
        report.attached
    }

    fn batch(state: &AllocationState) -> Vec<TicketId> {
        state
            .assignment(WORKER)
            .map(|a| a.batch_tickets.clone())
            .unwrap_or_default()
    }

    #[test]
    fn nearest_two_are_attached() {
        let (mut state, world, ids) =
            setup(&[pile(2, 6.0, 10), pile(3, 2.0, 10), pile(4, 4.0, 10)]);
        let config = AllocationConfig::default();

        assert_eq!(attach(&mut state, &world, &config), 2);
        let (far, near, mid) = (ids.first(), ids.get(1), ids.get(2));
        assert_eq!(batch(&state), [near, mid].into_iter().flatten().copied().collect::<Vec<_>>());
        assert_eq!(
            far.and_then(|id| state.ticket(*id)).map(|t| t.state),
            Some(TicketState::Open)
        );
        assert_eq!(
            near.and_then(|id| state.ticket(*id)).and_then(|t| t.claim_expiry),
            Some(8)
        );

        // The batch is full; nothing more attaches.
        assert_eq!(attach(&mut state, &world, &config), 0);
    }

    #[test]
    fn work_budget_is_respected() {
        let (mut state, world, ids) = setup(&[pile(2, 1.0, 50), pile(3, 2.0, 30)]);
        let config = AllocationConfig::default();

        // 50 fits alone; 50 + 30 would exceed 60.
        assert_eq!(attach(&mut state, &world, &config), 1);
        assert_eq!(batch(&state), ids.first().copied().into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn radius_and_kind_filter_candidates() {
        let mut other_kind = pile(3, 1.0, 5);
        other_kind.resource = ResourceType::Wood;
        let (mut state, world, _) = setup(&[pile(2, 30.0, 5), other_kind]);

        assert_eq!(attach(&mut state, &world, &AllocationConfig::default()), 0);
        assert!(batch(&state).is_empty());
    }

    #[test]
    fn per_tick_attach_limit() {
        let (mut state, world, _) = setup(&[pile(2, 1.0, 5), pile(3, 2.0, 5), pile(4, 3.0, 5)]);
        let config = AllocationConfig {
            max_batch_tickets: 4,
            max_attach_per_tick: 1,
            ..AllocationConfig::default()
        };

        assert_eq!(attach(&mut state, &world, &config), 1);
        assert_eq!(attach(&mut state, &world, &config), 1);
        assert_eq!(attach(&mut state, &world, &config), 1);
        assert_eq!(attach(&mut state, &world, &config), 0);
        assert_eq!(batch(&state).len(), 3);
    }

    #[test]
    fn busy_worker_gets_no_batch() {
        let (mut state, mut world, _) = setup(&[pile(2, 1.0, 5)]);
        if let Some(w) = world.workers.get_mut(&WORKER) {
            w.phase = JobPhase::Gathering;
        }
        assert_eq!(attach(&mut state, &world, &AllocationConfig::default()), 0);
    }
}
