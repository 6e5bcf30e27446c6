//! Synthetic world generation.
//!
//! Scatters resource nodes, ordinary piles, heavy single-item piles, and a
//! mixed crew of haulers and gatherers over the map. Generation is seeded
//! from `world.seed`, and identities are sequential, so the same config
//! always yields the same world.

use quarry_core::config::{HarnessConfig, WorldConfig};
use quarry_types::{
    Position, ResourceType, SourceId, SourceKind, SourceSnapshot, WorkerId, WorkerRole,
    WorkerSnapshot, WorldSnapshot,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::info;

/// Resources the synthetic world produces.
const HARVESTED: [ResourceType; 3] = [ResourceType::Wood, ResourceType::Stone, ResourceType::Ore];

/// First identity handed to a worker; sources count up from 1.
const FIRST_WORKER_ID: u128 = 1_000;

/// Build a seeded world from the `world` and `harness` config sections.
pub fn build_world(world: &WorldConfig, harness: &HarnessConfig) -> WorldSnapshot {
    let mut rng = StdRng::seed_from_u64(world.seed);
    let mut snapshot = WorldSnapshot::new();
    let mut next_source: u128 = 1;

    let mut add_source = |rng: &mut StdRng,
                          snapshot: &mut WorldSnapshot,
                          kind: SourceKind,
                          remaining: u32,
                          item_mass: Option<Decimal>| {
        let mut source = SourceSnapshot::new(
            SourceId::from_u128(next_source),
            kind,
            pick_resource(rng),
            random_position(rng, world),
            remaining,
        );
        source.item_mass = item_mass;
        snapshot.insert_source(source);
        next_source = next_source.saturating_add(1);
    };

    for _ in 0..harness.node_count {
        add_source(&mut rng, &mut snapshot, SourceKind::Node, harness.node_amount, None);
    }
    for _ in 0..harness.pile_count {
        let amount = rng.random_range(1..=harness.pile_amount.max(1));
        add_source(&mut rng, &mut snapshot, SourceKind::Pile, amount, None);
    }
    for _ in 0..harness.heavy_pile_count {
        add_source(
            &mut rng,
            &mut snapshot,
            SourceKind::Pile,
            1,
            Some(harness.heavy_item_mass),
        );
    }

    for n in 0..harness.worker_count {
        let role = if rng.random_bool(harness.hauler_share.clamp(0.0, 1.0)) {
            WorkerRole::Hauler
        } else {
            WorkerRole::Gatherer(pick_resource(&mut rng))
        };
        let mut worker = WorkerSnapshot::new(
            WorkerId::from_u128(FIRST_WORKER_ID.saturating_add(u128::from(n))),
            random_position(&mut rng, world),
            role,
        );
        worker.carry_capacity = Some(Decimal::from(
            rng.random_range(harness.carry_min..=harness.carry_max),
        ));
        worker.discipline = Decimal::new(rng.random_range(0..=10), 1);
        snapshot.insert_worker(worker);
    }

    info!(
        seed = world.seed,
        sources = snapshot.sources.len(),
        workers = snapshot.workers.len(),
        "Synthetic world generated"
    );
    snapshot
}

fn pick_resource(rng: &mut StdRng) -> ResourceType {
    let index = rng.random_range(0..HARVESTED.len());
    HARVESTED.get(index).copied().unwrap_or(ResourceType::Stone)
}

fn random_position(rng: &mut StdRng, world: &WorldConfig) -> Position {
    Position::new(
        rng.random_range(0.0..world.width),
        rng.random_range(0.0..world.height),
    )
}
