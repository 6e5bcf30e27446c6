//! Tick clock, movement seam, and harness runner for the Quarry simulation.
//!
//! This crate stands in for the systems the allocator treats as external:
//! world time, pause and playback gating, and the worker job state machine.
//! It drives [`quarry_alloc::Allocator`] once per tick.
//!
//! # Modules
//!
//! - [`clock`] -- [`TickClock`] with the tick counter and fixed tick length.
//! - [`config`] -- Configuration loading from `quarry-config.yaml` into
//!   strongly-typed structs.
//! - [`movement`] -- [`WorkExecutor`] trait and [`StubExecutor`].
//! - [`operator`] -- Shared pause, playback, speed, and stop controls.
//! - [`runner`] -- Async loop with bounds and operator controls.
//! - [`tick`] -- One allocate/move/advance step.
//!
//! [`TickClock`]: clock::TickClock
//! [`WorkExecutor`]: movement::WorkExecutor
//! [`StubExecutor`]: movement::StubExecutor

pub mod clock;
pub mod config;
pub mod movement;
pub mod operator;
pub mod runner;
pub mod tick;
