//! Tuning knobs for the allocation passes.
//!
//! These values correspond to the `allocation` section of
//! `quarry-config.yaml`. The [`AllocationConfig`] struct bundles every
//! tunable so that callers (the harness runner, tests) can override
//! defaults. It is validated once, when an [`Allocator`] is built.
//!
//! Capacities, masses, and cohesion terms are [`Decimal`] so that the
//! quorum gate compares exact values; radii are `f32` like positions.
//!
//! [`Allocator`]: crate::Allocator

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AllocError;

/// Configuration for ticket allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationConfig {
    /// Maximum obligations per worker, primary ticket included (default: 3).
    #[serde(default = "default_max_batch_tickets")]
    pub max_batch_tickets: u32,

    /// Maximum batch attachments per worker per tick (default: 2).
    #[serde(default = "default_max_attach_per_tick")]
    pub max_attach_per_tick: u32,

    /// Maximum summed work of a worker's batch tickets (default: 60).
    #[serde(default = "default_max_batch_work_units")]
    pub max_batch_work_units: u32,

    /// Radius around the primary target searched for batch work (default: 8).
    #[serde(default = "default_attach_radius")]
    pub attach_radius: f32,

    /// Claim lifetime in seconds before an unconsumed claim lapses
    /// (default: 30).
    #[serde(default = "default_claim_ttl_secs")]
    pub claim_ttl_secs: f64,

    /// Item mass at or above which a single item needs a group
    /// (default: 150).
    #[serde(default = "default_heavy_mass_threshold")]
    pub heavy_mass_threshold: Decimal,

    /// Minimum workers for a heavy carry (default: 2).
    #[serde(default = "default_heavy_min_workers")]
    pub heavy_min_workers: u32,

    /// Requested workers for a heavy carry (default: 2).
    #[serde(default = "default_heavy_required_workers")]
    pub heavy_required_workers: u32,

    /// Hard ceiling on group size (default: 8).
    #[serde(default = "default_group_max_workers")]
    pub group_max_workers: u32,

    /// Radius around the target searched for recruits (default: 12).
    #[serde(default = "default_assembly_radius")]
    pub assembly_radius: f32,

    /// Carry capacity of a worker without a personal stat (default: 100).
    #[serde(default = "default_base_carry_capacity")]
    pub base_carry_capacity: Decimal,

    /// Cohesion factor of a neutral group (default: 1.0).
    #[serde(default = "default_cohesion_base")]
    pub cohesion_base: Decimal,

    /// Lower clamp of the cohesion factor (default: 0.8).
    #[serde(default = "default_cohesion_min")]
    pub cohesion_min: Decimal,

    /// Upper clamp of the cohesion factor (default: 1.25).
    #[serde(default = "default_cohesion_max")]
    pub cohesion_max: Decimal,

    /// Cohesion change per unit of average discipline above 0.5
    /// (default: 0.5).
    #[serde(default = "default_cohesion_discipline_sensitivity")]
    pub cohesion_discipline_sensitivity: Decimal,

    /// Cohesion bonus per member beyond the first (default: 0.02).
    #[serde(default = "default_cohesion_size_bonus")]
    pub cohesion_size_bonus: Decimal,

    /// Ticks a terminal ticket stays visible before it is retired
    /// (default: 20).
    #[serde(default = "default_terminal_retention_ticks")]
    pub terminal_retention_ticks: u64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_batch_tickets: default_max_batch_tickets(),
            max_attach_per_tick: default_max_attach_per_tick(),
            max_batch_work_units: default_max_batch_work_units(),
            attach_radius: default_attach_radius(),
            claim_ttl_secs: default_claim_ttl_secs(),
            heavy_mass_threshold: default_heavy_mass_threshold(),
            heavy_min_workers: default_heavy_min_workers(),
            heavy_required_workers: default_heavy_required_workers(),
            group_max_workers: default_group_max_workers(),
            assembly_radius: default_assembly_radius(),
            base_carry_capacity: default_base_carry_capacity(),
            cohesion_base: default_cohesion_base(),
            cohesion_min: default_cohesion_min(),
            cohesion_max: default_cohesion_max(),
            cohesion_discipline_sensitivity: default_cohesion_discipline_sensitivity(),
            cohesion_size_bonus: default_cohesion_size_bonus(),
            terminal_retention_ticks: default_terminal_retention_ticks(),
        }
    }
}

impl AllocationConfig {
    /// Check every value for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> Result<(), AllocError> {
        if self.max_batch_tickets == 0 {
            return Err(invalid("max_batch_tickets must be at least 1"));
        }
        if self.heavy_min_workers == 0 || self.heavy_required_workers == 0 {
            return Err(invalid("heavy worker counts must be at least 1"));
        }
        if self.group_max_workers < self.heavy_min_workers {
            return Err(invalid("group_max_workers must be >= heavy_min_workers"));
        }
        if self.group_max_workers < self.heavy_required_workers {
            return Err(invalid("group_max_workers must be >= heavy_required_workers"));
        }
        if !(self.attach_radius >= 0.0 && self.attach_radius.is_finite()) {
            return Err(invalid("attach_radius must be a finite, non-negative number"));
        }
        if !(self.assembly_radius >= 0.0 && self.assembly_radius.is_finite()) {
            return Err(invalid("assembly_radius must be a finite, non-negative number"));
        }
        if !(self.claim_ttl_secs > 0.0 && self.claim_ttl_secs.is_finite()) {
            return Err(invalid("claim_ttl_secs must be a finite, positive number"));
        }
        if self.base_carry_capacity <= Decimal::ZERO {
            return Err(invalid("base_carry_capacity must be positive"));
        }
        if self.cohesion_min <= Decimal::ZERO {
            return Err(invalid("cohesion_min must be positive"));
        }
        if self.cohesion_min > self.cohesion_max {
            return Err(invalid("cohesion_min must not exceed cohesion_max"));
        }
        Ok(())
    }

    /// Convert the claim TTL into whole ticks for the given tick duration.
    ///
    /// Rounds up and never returns less than one tick.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::ZeroTickDuration`] for a zero-length tick and
    /// [`AllocError::TtlOverflow`] if the TTL is not representable.
    pub fn ttl_ticks(&self, tick_duration: Duration) -> Result<u64, AllocError> {
        let tick_nanos = tick_duration.as_nanos();
        if tick_nanos == 0 {
            return Err(AllocError::ZeroTickDuration);
        }
        let ttl = Duration::try_from_secs_f64(self.claim_ttl_secs).map_err(|e| {
            AllocError::InvalidConfig {
                reason: format!("claim_ttl_secs: {e}"),
            }
        })?;
        let ticks = ttl.as_nanos().div_ceil(tick_nanos);
        let ticks = u64::try_from(ticks).ok().ok_or(AllocError::TtlOverflow {
            ttl_secs: self.claim_ttl_secs,
        })?;
        Ok(ticks.max(1))
    }
}

fn invalid(reason: &str) -> AllocError {
    AllocError::InvalidConfig {
        reason: reason.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_max_batch_tickets() -> u32 {
    3
}

const fn default_max_attach_per_tick() -> u32 {
    2
}

const fn default_max_batch_work_units() -> u32 {
    60
}

const fn default_attach_radius() -> f32 {
    8.0
}

const fn default_claim_ttl_secs() -> f64 {
    30.0
}

const fn default_heavy_mass_threshold() -> Decimal {
    Decimal::from_parts(150, 0, 0, false, 0)
}

const fn default_heavy_min_workers() -> u32 {
    2
}

const fn default_heavy_required_workers() -> u32 {
    2
}

const fn default_group_max_workers() -> u32 {
    8
}

const fn default_assembly_radius() -> f32 {
    12.0
}

const fn default_base_carry_capacity() -> Decimal {
    Decimal::ONE_HUNDRED
}

const fn default_cohesion_base() -> Decimal {
    Decimal::ONE
}

const fn default_cohesion_min() -> Decimal {
    Decimal::from_parts(8, 0, 0, false, 1)
}

const fn default_cohesion_max() -> Decimal {
    Decimal::from_parts(125, 0, 0, false, 2)
}

const fn default_cohesion_discipline_sensitivity() -> Decimal {
    Decimal::from_parts(5, 0, 0, false, 1)
}

const fn default_cohesion_size_bonus() -> Decimal {
    Decimal::from_parts(2, 0, 0, false, 2)
}

const fn default_terminal_retention_ticks() -> u64 {
    20
}
