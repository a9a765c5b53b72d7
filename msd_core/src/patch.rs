//! Patch Process - the retry-until-success producer behind one patch.
//!
//! A patch repeats cultivation trials forever. Every trial costs `t_cult`
//! steps; a successful trial is followed by the growing step, which costs
//! `t_grow` steps and may itself be rejected. Each rejection is a full
//! restart. The process is lazy: the next accepted state is only computed
//! when the scheduler asks for it.
//!
//! A patch holding an accepted state stops cultivating until the state is
//! consumed; [`PatchProcess::restart_at`] moves its clock to the consumption
//! time before the next attempt loop.
//!
//! ```text
//!  clock ─┬─ cult ✗ ─┬─ cult ✓ grow ✗ ─┬─ cult ✓ grow ✓ ──► ReadyEvent
//!         0        t_cult          2·t_cult+t_grow      ...
//! ```

use crate::config::MsdConfig;
use crate::error::{ConfigError, SimError};
use msd_env::PatchId;
use rand::distributions::{Bernoulli, Distribution};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// The moment a patch yields an accepted magic state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyEvent {
    /// Absolute simulated time of acceptance
    pub time: u64,

    /// Producing patch
    pub patch: PatchId,
}

/// Per-trial parameters shared by every patch of a run.
#[derive(Debug, Clone, Copy)]
pub struct TrialParams {
    /// Cultivation success distribution
    cultivation: Bernoulli,

    /// Growing acceptance distribution (None = always accepted)
    growing: Option<Bernoulli>,

    /// Steps per cultivation trial
    t_cult: u64,

    /// Steps per growing step
    t_grow: u64,

    /// Attempts allowed per accepted state
    max_attempts: u64,
}

impl TrialParams {
    /// Builds trial parameters from a configuration.
    pub fn from_config(config: &MsdConfig) -> Result<Self, ConfigError> {
        let cultivation = Bernoulli::new(config.psucc_cult)
            .map_err(|_| ConfigError::probability("psucc_cult", config.psucc_cult))?;

        let growing = if config.post_selected_growing {
            let p = config
                .psucc_growing
                .ok_or(ConfigError::MissingGrowingProbability)?;
            Some(Bernoulli::new(p).map_err(|_| ConfigError::probability("psucc_growing", p))?)
        } else {
            None
        };

        Ok(Self {
            cultivation,
            growing,
            t_cult: config.t_cult,
            t_grow: config.t_grow,
            max_attempts: config.max_attempts_per_event,
        })
    }
}

/// One cultivation patch and its private random stream.
#[derive(Debug, Clone)]
pub struct PatchProcess<R = ChaCha8Rng> {
    /// Patch identity
    id: PatchId,

    /// Time consumed by all trials so far
    clock: u64,

    /// Trial parameters
    params: TrialParams,

    /// Private stream, never shared with another patch
    rng: R,

    /// Total trials run
    attempts: u64,

    /// Accepted states emitted
    emitted: u64,
}

impl<R: Rng> PatchProcess<R> {
    /// Creates a patch at clock 0.
    pub fn new(id: PatchId, params: TrialParams, rng: R) -> Self {
        Self {
            id,
            clock: 0,
            params,
            rng,
            attempts: 0,
            emitted: 0,
        }
    }

    /// Returns the patch identity.
    pub fn id(&self) -> PatchId {
        self.id
    }

    /// Returns the current patch clock.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Returns the total number of trials run.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Returns the number of accepted states emitted.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Resumes cultivation no earlier than `time`.
    ///
    /// The clock never moves backwards.
    pub fn restart_at(&mut self, time: u64) {
        self.clock = self.clock.max(time);
    }

    fn advance(&mut self, steps: u64) -> Result<(), SimError> {
        self.clock = self
            .clock
            .checked_add(steps)
            .ok_or(SimError::ClockOverflow { patch: self.id })?;
        Ok(())
    }

    /// Runs trials until the next accepted state.
    ///
    /// # Errors
    /// - `SimError::PatchStalled` if the attempt budget runs out first
    /// - `SimError::ClockOverflow` if the patch clock leaves the `u64` range
    pub fn next_ready(&mut self) -> Result<ReadyEvent, SimError> {
        for _ in 0..self.params.max_attempts {
            self.attempts += 1;
            self.advance(self.params.t_cult)?;

            if !self.params.cultivation.sample(&mut self.rng) {
                continue;
            }

            self.advance(self.params.t_grow)?;
            let accepted = match &self.params.growing {
                Some(growing) => growing.sample(&mut self.rng),
                None => true,
            };

            if accepted {
                self.emitted += 1;
                return Ok(ReadyEvent {
                    time: self.clock,
                    patch: self.id,
                });
            }
        }

        Err(SimError::PatchStalled {
            patch: self.id,
            attempts: self.params.max_attempts,
        })
    }
}

impl<R: Rng> Iterator for PatchProcess<R> {
    type Item = Result<ReadyEvent, SimError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_ready())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msd_env::{SeededContext, Side, StreamContext};

    fn patch(config: &MsdConfig, seed: u64) -> PatchProcess {
        let id = PatchId::new(Side::Left, 0);
        let params = TrialParams::from_config(config).unwrap();
        PatchProcess::new(id, params, SeededContext::new(seed).patch_stream(id))
    }

    #[test]
    fn test_certain_success_hits_multiples_of_t_cult() {
        let config = MsdConfig::new(3, 3, 1, 1.0, 7).without_post_selection();
        let mut p = patch(&config, 42);

        let times: Vec<u64> = (0..5).map(|_| p.next_ready().unwrap().time).collect();

        assert_eq!(times, vec![7, 14, 21, 28, 35]);
        assert_eq!(p.attempts(), 5);
        assert_eq!(p.emitted(), 5);
    }

    #[test]
    fn test_grow_time_added_per_successful_trial() {
        let config = MsdConfig::new(3, 7, 1, 1.0, 10)
            .without_post_selection()
            .with_grow_time(3);
        let mut p = patch(&config, 1);

        assert_eq!(p.next_ready().unwrap().time, 13);
        assert_eq!(p.next_ready().unwrap().time, 26);
    }

    #[test]
    fn test_ready_time_is_sum_of_attempt_durations() {
        let config = MsdConfig::new(3, 7, 1, 0.4, 5).with_growing(0.5).with_grow_time(2);
        let mut p = patch(&config, 9);

        let mut previous = 0;
        for _ in 0..200 {
            let event = p.next_ready().unwrap();
            let elapsed = event.time - previous;
            // At least one successful trial plus its growing step
            assert!(elapsed >= 7);
            previous = event.time;
        }
        assert_eq!(p.clock(), previous);
        assert!(p.attempts() >= 200);
    }

    #[test]
    fn test_deterministic_per_seed() {
        let config = MsdConfig::new(3, 7, 1, 0.3, 4).with_growing(0.6);
        let a: Vec<u64> = patch(&config, 5).take(50).map(|e| e.unwrap().time).collect();
        let b: Vec<u64> = patch(&config, 5).take(50).map(|e| e.unwrap().time).collect();
        let c: Vec<u64> = patch(&config, 6).take(50).map(|e| e.unwrap().time).collect();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_stall_reported_after_budget() {
        let config = MsdConfig::new(3, 7, 1, 1e-12, 4)
            .without_post_selection()
            .with_max_attempts(100);
        let mut p = patch(&config, 3);

        let err = p.next_ready().unwrap_err();
        assert!(err.is_stall());
        assert_eq!(
            err,
            SimError::PatchStalled {
                patch: PatchId::new(Side::Left, 0),
                attempts: 100
            }
        );
        assert_eq!(p.clock(), 400);
    }

    #[test]
    fn test_restart_moves_clock_forward_only() {
        let config = MsdConfig::new(3, 3, 1, 1.0, 5).without_post_selection();
        let mut p = patch(&config, 2);

        assert_eq!(p.next_ready().unwrap().time, 5);
        p.restart_at(12);
        assert_eq!(p.clock(), 12);
        assert_eq!(p.next_ready().unwrap().time, 17);

        p.restart_at(3);
        assert_eq!(p.clock(), 17);
        assert_eq!(p.next_ready().unwrap().time, 22);
    }

    #[test]
    fn test_clock_overflow_is_an_error() {
        let config = MsdConfig::new(3, 3, 1, 1.0, u64::MAX / 2 + 1).without_post_selection();
        let mut p = patch(&config, 4);

        assert_eq!(p.next_ready().unwrap().time, u64::MAX / 2 + 1);
        let err = p.next_ready().unwrap_err();
        assert_eq!(
            err,
            SimError::ClockOverflow {
                patch: PatchId::new(Side::Left, 0)
            }
        );
        assert!(!err.is_stall());
    }

    #[test]
    fn test_grow_time_overflow_is_an_error() {
        let config = MsdConfig::new(3, 7, 1, 1.0, 1)
            .without_post_selection()
            .with_grow_time(u64::MAX);
        let mut p = patch(&config, 4);

        assert!(matches!(p.next_ready(), Err(SimError::ClockOverflow { .. })));
    }
}
