//! Error types for the magic-state cycle engine.

use msd_env::PatchId;
use thiserror::Error;

/// Problems with a configuration, detected before any simulation work.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Post-selected growing was requested without an acceptance rate
    #[error("psucc_growing must be given when post_selected_growing is enabled")]
    MissingGrowingProbability,

    /// A probability is NaN, non-positive or above one
    #[error("{name} must be in (0, 1], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    /// A count or duration that must be at least one is zero
    #[error("{name} must be at least 1")]
    NonPositive { name: &'static str },
}

impl ConfigError {
    /// Creates an out-of-range error for the named probability.
    pub fn probability(name: &'static str, value: f64) -> Self {
        Self::ProbabilityOutOfRange { name, value }
    }
}

/// Errors that can abort a simulation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Configuration rejected before the run started
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A patch exhausted its attempt budget without an accepted state
    #[error("Patch {patch} made {attempts} attempts without an accepted state")]
    PatchStalled { patch: PatchId, attempts: u64 },

    /// The layout model went too many ticks without completing a stage
    #[error("No stage completed within {ticks} ticks")]
    LayoutStalled { ticks: u64 },

    /// Simulated time ran past the representable range
    #[error("Clock of patch {patch} overflowed")]
    ClockOverflow { patch: PatchId },
}

impl SimError {
    /// Returns true for the non-progress family of errors.
    pub fn is_stall(&self) -> bool {
        matches!(self, Self::PatchStalled { .. } | Self::LayoutStalled { .. })
    }
}
