//! Sweep runner - executes one simulation per (Nm, seed) pair.

use msd_core::{simulate_with_context, MsdConfig, SimError, Stage, TimingSummary};
use msd_env::{EntropyContext, SeededContext, StreamContext};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result of one run in a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    /// Patches per side
    pub nm: usize,

    /// Seed used
    pub seed: u64,

    /// Timing estimates
    pub summary: TimingSummary,
}

/// Runs a base configuration over several Nm values and seeds.
#[derive(Debug, Clone)]
pub struct SweepRunner {
    /// Configuration shared by every run
    base: MsdConfig,

    /// First seed; run k of a point uses `base_seed + k`
    base_seed: u64,

    /// Consecutive seeds per Nm value
    seeds: usize,
}

impl SweepRunner {
    /// Creates a runner. Without a seed in `base`, one is drawn from OS entropy.
    pub fn new(base: MsdConfig) -> Self {
        let base_seed = base.seed.unwrap_or_else(|| EntropyContext::new().seed());
        Self {
            base,
            base_seed,
            seeds: 1,
        }
    }

    /// Sets the number of consecutive seeds per Nm value.
    pub fn with_seeds(mut self, seeds: usize) -> Self {
        self.seeds = seeds.max(1);
        self
    }

    /// Returns the first seed of every point.
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Returns the shared configuration.
    pub fn base(&self) -> &MsdConfig {
        &self.base
    }

    /// Runs a single point.
    pub fn run_point(&self, nm: usize, seed: u64) -> Result<SweepPoint, SimError> {
        let config = MsdConfig {
            nm,
            seed: Some(seed),
            get_all: false,
            ..self.base.clone()
        };

        let result = simulate_with_context(&config, &SeededContext::new(seed), &mut |_: &Stage| {})?;
        let summary = result.summary();

        debug!(
            "✓ Nm={} (seed={}) T_intv={:.3} ± {:.3}  T_idle={:.3} ± {:.3}",
            nm, seed, summary.t_intv, summary.t_intv_se, summary.t_idle, summary.t_idle_se
        );

        Ok(SweepPoint { nm, seed, summary })
    }

    /// Runs every (Nm, seed) combination, Nm-major.
    ///
    /// Stops at the first failing run.
    pub fn run(&self, nm_values: &[usize]) -> Result<Vec<SweepPoint>, SimError> {
        debug!(
            "Sweep over Nm={:?} with {} seed(s) from {}",
            nm_values, self.seeds, self.base_seed
        );

        let mut points = Vec::with_capacity(nm_values.len() * self.seeds);
        for &nm in nm_values {
            for offset in 0..self.seeds {
                let seed = self.base_seed.wrapping_add(offset as u64);
                points.push(self.run_point(nm, seed)?);
            }
        }
        Ok(points)
    }
}
