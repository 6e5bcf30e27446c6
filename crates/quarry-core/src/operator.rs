//! Operator control state for runtime simulation management.
//!
//! Shared state read by the tick loop and written by whoever drives the
//! run (the engine binary, a test, a signal handler). The operator can
//! pause and resume, switch between recording and playback, change tick
//! speed, and request a clean stop without tearing down the process.
//!
//! # Architecture
//!
//! All mutable control fields use [`std::sync::atomic`] types so they can
//! be shared behind an [`Arc`](std::sync::Arc) between tasks without locks
//! on the hot path. Only the end reason sits behind a mutex.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use crate::config::SimulationBoundsConfig;

/// Shortest tick interval the operator may set, in milliseconds.
pub const MIN_TICK_INTERVAL_MS: u64 = 10;

/// Reason why the simulation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEndReason {
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
    /// Reached the configured `max_real_time_seconds` limit.
    MaxRealTimeReached,
    /// An operator issued a stop command.
    OperatorStop,
    /// Every source is exhausted and no ticket is live.
    WorkExhausted,
}

/// Shared operator control state.
#[derive(Debug)]
pub struct OperatorState {
    /// Whether the simulation is currently paused.
    paused: AtomicBool,

    /// Notification used to wake the tick loop when resumed.
    resume_notify: Notify,

    /// Whether ticks are recorded (`true`) or replayed (`false`).
    record_mode: AtomicBool,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Current tick interval in milliseconds (runtime-adjustable).
    tick_interval_ms: AtomicU64,

    /// Wall-clock time when the simulation started.
    started_at: DateTime<Utc>,

    /// Maximum number of recorded ticks (0 = unlimited).
    max_ticks: u64,

    /// Maximum wall-clock seconds (0 = unlimited).
    max_real_time_seconds: u64,

    /// Whether an exhausted world ends the run.
    stop_when_exhausted: bool,

    /// Reason the simulation ended, if it has.
    end_reason: Mutex<Option<SimulationEndReason>>,
}

impl OperatorState {
    /// Create a new operator state from configuration.
    pub fn new(tick_interval_ms: u64, bounds: &SimulationBoundsConfig) -> Self {
        Self {
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            record_mode: AtomicBool::new(true),
            stop_requested: AtomicBool::new(false),
            tick_interval_ms: AtomicU64::new(tick_interval_ms),
            started_at: Utc::now(),
            max_ticks: bounds.max_ticks,
            max_real_time_seconds: bounds.max_real_time_seconds,
            stop_when_exhausted: bounds.stop_when_exhausted,
            end_reason: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / Resume
    // -----------------------------------------------------------------------

    /// Check whether the simulation is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause the simulation. The tick loop will sleep until resumed.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume the simulation and wake the tick loop.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Wait until the simulation is no longer paused.
    ///
    /// Returns immediately if not paused. A stop request also wakes the
    /// waiter so that a paused run can still shut down.
    pub async fn wait_if_paused(&self) {
        while self.is_paused() && !self.is_stop_requested() {
            self.resume_notify.notified().await;
        }
    }

    // -----------------------------------------------------------------------
    // Record / Playback
    // -----------------------------------------------------------------------

    /// Whether ticks are being recorded live.
    pub fn is_recording(&self) -> bool {
        self.record_mode.load(Ordering::Acquire)
    }

    /// Switch between recording (`true`) and playback (`false`).
    ///
    /// Returns the previous mode. While in playback the allocator and the
    /// movement layer are suspended and the clock does not advance.
    pub fn set_record_mode(&self, recording: bool) -> bool {
        self.record_mode.swap(recording, Ordering::AcqRel)
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean simulation stop.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Check whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Record the reason the simulation ended.
    pub async fn set_end_reason(&self, reason: SimulationEndReason) {
        let mut guard = self.end_reason.lock().await;
        *guard = Some(reason);
    }

    /// Get the reason the simulation ended, if it has.
    pub async fn end_reason(&self) -> Option<SimulationEndReason> {
        *self.end_reason.lock().await
    }

    // -----------------------------------------------------------------------
    // Tick Speed
    // -----------------------------------------------------------------------

    /// Get the current tick interval in milliseconds.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Set the tick interval in milliseconds.
    ///
    /// Returns the previous interval on success, or `None` if the value was
    /// rejected (non-zero but below [`MIN_TICK_INTERVAL_MS`]). Zero means
    /// run flat out.
    pub fn set_tick_interval_ms(&self, ms: u64) -> Option<u64> {
        if ms != 0 && ms < MIN_TICK_INTERVAL_MS {
            return None;
        }
        Some(self.tick_interval_ms.swap(ms, Ordering::AcqRel))
    }

    // -----------------------------------------------------------------------
    // Boundaries
    // -----------------------------------------------------------------------

    /// Check whether the tick limit has been reached.
    ///
    /// Returns `true` if `max_ticks > 0` and `recorded_ticks >= max_ticks`.
    pub const fn tick_limit_reached(&self, recorded_ticks: u64) -> bool {
        self.max_ticks > 0 && recorded_ticks >= self.max_ticks
    }

    /// Check whether the wall-clock time limit has been reached.
    pub fn time_limit_reached(&self) -> bool {
        self.max_real_time_seconds > 0 && self.elapsed_seconds() >= self.max_real_time_seconds
    }

    /// Whether an exhausted world ends the run.
    pub const fn stop_when_exhausted(&self) -> bool {
        self.stop_when_exhausted
    }

    /// Return the wall-clock start time.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Return elapsed seconds since simulation start.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds();
        // `num_seconds` can be negative if the wall clock steps back.
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }

    /// Get the configured max ticks.
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Get the configured max real-time seconds.
    pub const fn max_real_time_seconds(&self) -> u64 {
        self.max_real_time_seconds
    }
}
