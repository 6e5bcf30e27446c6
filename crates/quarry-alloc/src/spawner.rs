//! Ticket spawner: publishes one `Open` ticket per live source.

use std::collections::BTreeSet;

use quarry_types::{
    HeavyLoad, SourceSnapshot, Ticket, TicketId, TicketKey, TicketKind, TicketState,
    WorldSnapshot,
};
use tracing::{debug, warn};

use crate::config::AllocationConfig;
use crate::context::PassContext;
use crate::report::{TickReport, bump};
use crate::state::AllocationState;

/// Run the spawner pass.
///
/// Sources are visited in identity order. A source gets a ticket only when
/// no non-terminal ticket already carries its key.
pub(crate) fn run(
    state: &mut AllocationState,
    world: &WorldSnapshot,
    config: &AllocationConfig,
    pass: &PassContext,
    report: &mut TickReport,
) {
    let mut live: BTreeSet<TicketKey> = state
        .tickets
        .iter()
        .filter(|t| !t.state.is_terminal())
        .map(|t| t.key)
        .collect();

    for source in world.sources.values() {
        if source.is_exhausted() {
            continue;
        }
        let key = key_for(source);
        if live.contains(&key) {
            continue;
        }

        match state.tickets.insert_with(|id| shape(id, key, source, config, pass.now)) {
            Ok(id) => {
                debug!(ticket = %id, source = %source.id, resource = ?source.resource, "Spawned ticket");
                live.insert(key);
                bump(&mut report.spawned);
            }
            Err(e) => {
                warn!(error = %e, "Ticket arena full, skipping remaining sources");
                break;
            }
        }
    }
}

const fn key_for(source: &SourceSnapshot) -> TicketKey {
    TicketKey {
        source: source.id,
        resource: source.resource,
        kind: TicketKind::Gather {
            origin: source.kind,
        },
    }
}

/// Build a fresh ticket, sizing its crew from the source.
fn shape(
    id: TicketId,
    key: TicketKey,
    source: &SourceSnapshot,
    config: &AllocationConfig,
    now: u64,
) -> Ticket {
    let heavy = source
        .item_mass
        .filter(|mass| *mass >= config.heavy_mass_threshold)
        .map(|item_mass| HeavyLoad { item_mass });

    let (min_workers, required_workers) = if heavy.is_some() {
        (config.heavy_min_workers, config.heavy_required_workers)
    } else {
        match source.required_workers {
            Some(n) if n > 1 => (n, n),
            _ => (1, 1),
        }
    };

    Ticket {
        id,
        key,
        state: TicketState::Open,
        assignee: None,
        claim_expiry: None,
        last_state_change_tick: now,
        required_workers,
        min_workers,
        heavy,
        work_amount: source.remaining,
    }
}
