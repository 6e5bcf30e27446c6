//! Simulation loop runner with operator controls.
//!
//! This module provides [`run_simulation`], the top-level async function
//! that drives the tick loop with support for:
//!
//! - **Bounded simulation**: stop after `max_ticks` recorded ticks or
//!   `max_real_time_seconds` of wall-clock time
//! - **Pause/resume**: the operator can halt and continue the tick loop
//! - **Playback**: ticks keep running but allocation and movement are
//!   suspended and the clock holds still
//! - **Variable tick speed**: tick interval adjustable at runtime
//! - **Work exhaustion**: optional stop once nothing is left to do
//!
//! The runner wraps the single-tick [`run_tick`] function and adds the
//! control plane around it. The allocator itself never awaits.
//!
//! [`run_tick`]: crate::tick::run_tick

use std::sync::Arc;

use tracing::{info, warn};

use crate::movement::WorkExecutor;
use crate::operator::{OperatorState, SimulationEndReason};
use crate::tick::{self, SimulationState, TickControl, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of loop iterations, suspended ones included.
    pub total_ticks: u64,
    /// Number of iterations in which the allocator was suspended.
    pub suspended_ticks: u64,
}

/// Callback invoked after each tick completes.
///
/// Implementations can use this to log progress, collect metrics in a
/// test, or drive the operator. The callback receives the tick summary and
/// the current simulation state.
pub trait TickCallback: Send {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState);
}

/// A no-op tick callback for testing.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {}
}

/// Run the simulation loop until a termination condition is met.
///
/// # Arguments
///
/// * `state` - Mutable simulation state (clock, world, allocator)
/// * `executor` - Movement layer that acts on assignments
/// * `operator` - Shared operator control state
/// * `callback` - Called after each tick
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick execution fails unrecoverably.
pub async fn run_simulation(
    state: &mut SimulationState,
    executor: &mut dyn WorkExecutor,
    operator: &Arc<OperatorState>,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;
    let mut suspended_ticks: u64 = 0;

    info!(
        max_ticks = operator.max_ticks(),
        max_real_time_seconds = operator.max_real_time_seconds(),
        tick_interval_ms = operator.tick_interval_ms(),
        start_tick = state.clock.tick(),
        "Simulation starting"
    );

    loop {
        // --- Check pause ---
        if operator.is_paused() {
            info!(tick = state.clock.tick(), "Simulation paused, waiting for resume...");
            operator.wait_if_paused().await;
            info!(tick = state.clock.tick(), "Simulation resumed");
        }

        // --- Check stop request (before tick) ---
        if operator.is_stop_requested() {
            info!("Operator stop requested");
            return finish(
                operator,
                SimulationEndReason::OperatorStop,
                last_summary,
                total_ticks,
                suspended_ticks,
            )
            .await;
        }

        // --- Check time limit (before tick) ---
        if operator.time_limit_reached() {
            info!(
                max_seconds = operator.max_real_time_seconds(),
                elapsed = operator.elapsed_seconds(),
                "Real-time limit reached"
            );
            return finish(
                operator,
                SimulationEndReason::MaxRealTimeReached,
                last_summary,
                total_ticks,
                suspended_ticks,
            )
            .await;
        }

        // --- Execute tick ---
        let control = TickControl {
            paused: operator.is_paused(),
            record_mode: operator.is_recording(),
        };
        let summary = tick::run_tick(state, executor, control)?;

        total_ticks = total_ticks.saturating_add(1);
        if summary.suspended() {
            suspended_ticks = suspended_ticks.saturating_add(1);
        }

        // --- Notify callback ---
        callback.on_tick(&summary, state);

        // --- Check exhaustion ---
        if operator.stop_when_exhausted() && summary.work_exhausted() {
            info!(tick = summary.tick, "All work exhausted");
            return finish(
                operator,
                SimulationEndReason::WorkExhausted,
                Some(summary),
                total_ticks,
                suspended_ticks,
            )
            .await;
        }

        // --- Check tick limit (after tick) ---
        // The clock only advances on recorded ticks, so it counts them.
        if operator.tick_limit_reached(state.clock.tick()) {
            info!(
                tick = summary.tick,
                max_ticks = operator.max_ticks(),
                "Tick limit reached"
            );
            return finish(
                operator,
                SimulationEndReason::MaxTicksReached,
                Some(summary),
                total_ticks,
                suspended_ticks,
            )
            .await;
        }

        last_summary = Some(summary);

        // --- Sleep for tick interval ---
        let interval_ms = operator.tick_interval_ms();
        if interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(interval_ms)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}

async fn finish(
    operator: &OperatorState,
    end_reason: SimulationEndReason,
    final_summary: Option<TickSummary>,
    total_ticks: u64,
    suspended_ticks: u64,
) -> Result<SimulationResult, RunnerError> {
    operator.set_end_reason(end_reason).await;
    Ok(SimulationResult {
        end_reason,
        final_summary,
        total_ticks,
        suspended_ticks,
    })
}

/// Log the simulation end sequence.
///
/// Call after [`run_simulation`] returns.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        suspended_ticks = result.suspended_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        let counts = summary.allocation.counts;
        info!(
            tick = summary.tick,
            open = counts.open,
            claimed = counts.claimed,
            in_progress = counts.in_progress,
            done = counts.done,
            cancelled = counts.cancelled,
            remaining_work = summary.remaining_work,
            "Final tick summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use quarry_alloc::{AllocationConfig, Allocator};
    use quarry_types::{
        Position, ResourceType, SourceId, SourceKind, SourceSnapshot, WorkerId, WorkerRole,
        WorkerSnapshot, WorldSnapshot,
    };

    use super::*;
    use crate::clock::TickClock;
    use crate::config::SimulationBoundsConfig;
    use crate::movement::StubExecutor;

    fn make_state(remaining: u32) -> SimulationState {
        let mut world = WorldSnapshot::new();
        world.insert_source(SourceSnapshot::new(
            SourceId::from_u128(1),
            SourceKind::Pile,
            ResourceType::Stone,
            Position::new(3.0, 0.0),
            remaining,
        ));
        world.insert_worker(WorkerSnapshot::new(
            WorkerId::from_u128(10),
            Position::new(0.0, 0.0),
            WorkerRole::Hauler,
        ));
        SimulationState::new(
            TickClock::new(Duration::from_millis(500)).unwrap(),
            world,
            Allocator::new(AllocationConfig::default()).unwrap(),
        )
    }

    fn bounds(max_ticks: u64, stop_when_exhausted: bool) -> SimulationBoundsConfig {
        SimulationBoundsConfig {
            max_ticks,
            max_real_time_seconds: 0,
            stop_when_exhausted,
        }
    }

    #[tokio::test]
    async fn bounded_by_max_ticks() {
        let mut state = make_state(1000);
        let mut exec = StubExecutor::new(1.0, 1);
        let operator = Arc::new(OperatorState::new(0, &bounds(5, true)));

        let result = run_simulation(&mut state, &mut exec, &operator, &mut NoOpCallback)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 5);
        assert_eq!(state.clock.tick(), 5);
        assert_eq!(
            operator.end_reason().await,
            Some(SimulationEndReason::MaxTicksReached)
        );
    }

    #[tokio::test]
    async fn operator_stop() {
        let mut state = make_state(10);
        let mut exec = StubExecutor::new(1.0, 1);
        let operator = Arc::new(OperatorState::new(0, &bounds(0, false)));
        operator.request_stop();

        let result = run_simulation(&mut state, &mut exec, &operator, &mut NoOpCallback)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::OperatorStop);
        assert_eq!(result.total_ticks, 0);
        assert!(result.final_summary.is_none());
    }

    #[tokio::test]
    async fn exhausted_world_ends_the_run() {
        let mut state = make_state(4);
        let mut exec = StubExecutor::new(3.0, 2);
        let operator = Arc::new(OperatorState::new(0, &bounds(100, true)));

        let result = run_simulation(&mut state, &mut exec, &operator, &mut NoOpCallback)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::WorkExhausted);
        let last = result.final_summary.unwrap();
        assert_eq!(last.remaining_work, 0);
        assert_eq!(last.allocation.counts.done, 1);
    }

    #[tokio::test]
    async fn playback_ticks_do_not_count_toward_the_limit() {
        struct Playback {
            operator: Arc<OperatorState>,
            seen: u64,
        }
        impl TickCallback for Playback {
            fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {
                self.seen = self.seen.saturating_add(1);
                // Replay ticks 2 and 3, then record again.
                self.operator.set_record_mode(!(2..4).contains(&self.seen));
            }
        }

        let mut state = make_state(1000);
        let mut exec = StubExecutor::new(1.0, 1);
        let operator = Arc::new(OperatorState::new(0, &bounds(4, true)));
        let mut cb = Playback {
            operator: Arc::clone(&operator),
            seen: 0,
        };

        let result = run_simulation(&mut state, &mut exec, &operator, &mut cb)
            .await
            .unwrap();

        assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 6);
        assert_eq!(result.suspended_ticks, 2);
        assert_eq!(state.clock.tick(), 4);
    }

    #[tokio::test]
    async fn stop_wakes_a_paused_run() {
        let mut state = make_state(10);
        let mut exec = StubExecutor::new(1.0, 1);
        let operator = Arc::new(OperatorState::new(0, &bounds(0, false)));
        operator.pause();

        let stopper = {
            let operator = Arc::clone(&operator);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                operator.request_stop();
            })
        };

        let result = run_simulation(&mut state, &mut exec, &operator, &mut NoOpCallback)
            .await
            .unwrap();
        let _ = stopper.await;

        assert_eq!(result.end_reason, SimulationEndReason::OperatorStop);
        assert_eq!(result.total_ticks, 0);
        assert_eq!(state.clock.tick(), 0);
    }

    #[tokio::test]
    async fn tick_callback_is_called() {
        struct CountCallback {
            count: u64,
        }
        impl TickCallback for CountCallback {
            fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {
                self.count = self.count.saturating_add(1);
            }
        }

        let mut state = make_state(1000);
        let mut exec = StubExecutor::new(1.0, 1);
        let operator = Arc::new(OperatorState::new(0, &bounds(3, true)));
        let mut cb = CountCallback { count: 0 };

        let _ = run_simulation(&mut state, &mut exec, &operator, &mut cb)
            .await
            .unwrap();

        assert_eq!(cb.count, 3);
    }
}
