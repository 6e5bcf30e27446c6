//! Error types for the quarry-alloc crate.
//!
//! The allocation passes themselves never fail: stale references are
//! dropped, timeouts revert to `Open`, and shortfalls wait. Errors only
//! arise from invalid configuration or a tick context that cannot be
//! turned into a claim deadline.

/// Errors that can occur when building or driving the allocator.
#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    /// A tuning value is out of range.
    #[error("invalid allocation config: {reason}")]
    InvalidConfig {
        /// Which value is wrong and why.
        reason: String,
    },

    /// The tick context reported a zero-length tick.
    #[error("tick duration must be greater than zero")]
    ZeroTickDuration,

    /// The claim TTL does not fit in a tick count.
    #[error("claim TTL of {ttl_secs}s overflows the tick counter")]
    TtlOverflow {
        /// The configured TTL in seconds.
        ttl_secs: f64,
    },

    /// Every arena slot index is in use.
    #[error("ticket arena is full ({capacity} slots)")]
    ArenaFull {
        /// Number of slots in the arena.
        capacity: usize,
    },
}
