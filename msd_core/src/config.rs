//! Simulation configuration and validation.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default number of consumed pairs per run.
pub const DEFAULT_NUM_STAGES: usize = 10_000;

/// Default cultivation time steps folded into one layout tick.
pub const DEFAULT_STEPS_PER_TICK: u64 = 8;

/// Default retry budget before a patch is declared stalled.
pub const DEFAULT_MAX_ATTEMPTS: u64 = 10_000_000;

/// How ready states are picked on each side when a stage is formed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingPolicy {
    /// Oldest ready state across all patches on the side
    #[default]
    EarliestFirst,

    /// Stage k takes the next state of patch `k mod Nm`
    RoundRobin,
}

impl PairingPolicy {
    /// Returns the policy name.
    pub fn name(&self) -> &'static str {
        match self {
            PairingPolicy::EarliestFirst => "earliest_first",
            PairingPolicy::RoundRobin => "round_robin",
        }
    }
}

impl std::fmt::Display for PairingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for PairingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "earliest_first" | "earliest" | "fifo" => Ok(PairingPolicy::EarliestFirst),
            "round_robin" | "roundrobin" | "rr" => Ok(PairingPolicy::RoundRobin),
            _ => Err(format!("Unknown pairing policy: {}", s)),
        }
    }
}

/// Which cycle model produces the stage stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleModel {
    /// Independent retrying patches merged per side, times in cultivation steps
    #[default]
    EventDriven,

    /// Tick-driven layout with staggered starts, times in layout ticks
    Staggered,
}

impl CycleModel {
    /// Returns the model name.
    pub fn name(&self) -> &'static str {
        match self {
            CycleModel::EventDriven => "event_driven",
            CycleModel::Staggered => "staggered",
        }
    }
}

impl std::fmt::Display for CycleModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for CycleModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "event_driven" | "eventdriven" | "event" => Ok(CycleModel::EventDriven),
            "staggered" | "layout" | "tick" => Ok(CycleModel::Staggered),
            _ => Err(format!("Unknown cycle model: {}", s)),
        }
    }
}

/// Configuration for a simulation run.
///
/// `dcult` and `dm` are labels for the event-driven model; only the
/// staggered model reads them (growing need and distillation occupancy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsdConfig {
    /// Code distance of a cultivation patch before growing
    pub dcult: u32,

    /// Code distance after growing
    pub dm: u32,

    /// Cultivation patches per side
    pub nm: usize,

    /// Per-trial cultivation success rate
    pub psucc_cult: f64,

    /// Time steps per cultivation trial, excluding growing
    pub t_cult: u64,

    /// Post-select the growing step on the logical gap
    pub post_selected_growing: bool,

    /// Growing acceptance rate (required when post-selected)
    pub psucc_growing: Option<f64>,

    /// Time steps spent growing after a successful trial (event-driven model)
    pub t_grow: u64,

    /// Number of consumed pairs to simulate
    pub num_stages: usize,

    /// Master seed (None = fresh OS entropy)
    pub seed: Option<u64>,

    /// Log every stage
    pub verbose: bool,

    /// Return raw samples instead of means and standard errors
    pub get_all: bool,

    /// Pairing discipline for the event-driven model
    pub pairing: PairingPolicy,

    /// Cycle model
    pub model: CycleModel,

    /// Cultivation time steps per layout tick (staggered model)
    pub steps_per_tick: u64,

    /// Retry budget per accepted state
    pub max_attempts_per_event: u64,
}

impl MsdConfig {
    /// Creates a configuration with every optional setting at its default.
    ///
    /// Post-selected growing is on by default, so a growing rate must be
    /// supplied with [`MsdConfig::with_growing`] before the config validates.
    pub fn new(dcult: u32, dm: u32, nm: usize, psucc_cult: f64, t_cult: u64) -> Self {
        Self {
            dcult,
            dm,
            nm,
            psucc_cult,
            t_cult,
            post_selected_growing: true,
            psucc_growing: None,
            t_grow: 0,
            num_stages: DEFAULT_NUM_STAGES,
            seed: None,
            verbose: false,
            get_all: false,
            pairing: PairingPolicy::default(),
            model: CycleModel::default(),
            steps_per_tick: DEFAULT_STEPS_PER_TICK,
            max_attempts_per_event: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Enables post-selected growing with the given acceptance rate.
    pub fn with_growing(mut self, psucc_growing: f64) -> Self {
        self.post_selected_growing = true;
        self.psucc_growing = Some(psucc_growing);
        self
    }

    /// Disables post-selection; growing always succeeds.
    pub fn without_post_selection(mut self) -> Self {
        self.post_selected_growing = false;
        self
    }

    /// Sets the growing-step duration.
    pub fn with_grow_time(mut self, t_grow: u64) -> Self {
        self.t_grow = t_grow;
        self
    }

    /// Sets the number of stages.
    pub fn with_stages(mut self, num_stages: usize) -> Self {
        self.num_stages = num_stages;
        self
    }

    /// Sets the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Switches the result to raw samples.
    pub fn with_all_samples(mut self, get_all: bool) -> Self {
        self.get_all = get_all;
        self
    }

    /// Enables per-stage logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets the pairing policy.
    pub fn with_pairing(mut self, pairing: PairingPolicy) -> Self {
        self.pairing = pairing;
        self
    }

    /// Sets the cycle model.
    pub fn with_model(mut self, model: CycleModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the retry budget.
    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts_per_event = max_attempts;
        self
    }

    /// Returns the growing acceptance rate actually applied per trial.
    ///
    /// 1.0 when post-selection is off. Call after [`MsdConfig::validate`].
    pub fn growing_acceptance(&self) -> f64 {
        if self.post_selected_growing {
            self.psucc_growing.unwrap_or(0.0)
        } else {
            1.0
        }
    }

    /// Checks every parameter before a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nm == 0 {
            return Err(ConfigError::NonPositive { name: "nm" });
        }
        if self.t_cult == 0 {
            return Err(ConfigError::NonPositive { name: "t_cult" });
        }
        if self.num_stages == 0 {
            return Err(ConfigError::NonPositive { name: "num_stages" });
        }
        if self.steps_per_tick == 0 {
            return Err(ConfigError::NonPositive { name: "steps_per_tick" });
        }
        if self.max_attempts_per_event == 0 {
            return Err(ConfigError::NonPositive { name: "max_attempts_per_event" });
        }

        check_probability("psucc_cult", self.psucc_cult)?;

        if self.post_selected_growing {
            let p = self
                .psucc_growing
                .ok_or(ConfigError::MissingGrowingProbability)?;
            check_probability("psucc_growing", p)?;
        }

        Ok(())
    }
}

/// A probability must be finite and in (0, 1]. Zero never makes progress.
fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::probability(name, value))
    }
}
