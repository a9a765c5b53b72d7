//! Statistics Aggregator - reduces stages to timing estimates.

use crate::scheduler::Stage;
use serde::{Deserialize, Deserializer, Serialize};

/// Reads a statistic that was written as `null` back as NaN.
fn nan_from_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// Mean and standard error of one sample set.
///
/// Degenerate sets never panic: the mean of an empty set and the standard
/// error of a set with fewer than two samples are NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    /// Number of samples
    pub count: usize,

    /// Sample mean
    #[serde(deserialize_with = "nan_from_null")]
    pub mean: f64,

    /// Sample standard deviation (n - 1) over sqrt(n)
    #[serde(deserialize_with = "nan_from_null")]
    pub std_error: f64,
}

impl SampleStats {
    /// Computes the statistics of a sample set.
    pub fn from_samples(samples: &[f64]) -> Self {
        let count = samples.len();
        if count == 0 {
            return Self {
                count,
                mean: f64::NAN,
                std_error: f64::NAN,
            };
        }

        let n = count as f64;
        let mean = samples.iter().sum::<f64>() / n;
        if count < 2 {
            return Self {
                count,
                mean,
                std_error: f64::NAN,
            };
        }

        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);

        Self {
            count,
            mean,
            std_error: variance.sqrt() / n.sqrt(),
        }
    }
}

/// Summary estimates of a run.
///
/// Undefined statistics are NaN and serialize as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingSummary {
    /// Mean interval between consecutive rounds
    #[serde(deserialize_with = "nan_from_null")]
    pub t_intv: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub t_intv_se: f64,

    /// Mean idling time of a produced state
    #[serde(deserialize_with = "nan_from_null")]
    pub t_idle: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub t_idle_se: f64,

    /// Interval samples used (num_stages - 1)
    pub interval_count: usize,

    /// Idle samples used (2 * num_stages)
    pub idle_count: usize,
}

impl TimingSummary {
    /// Returns `(T_intv, T_intv_se, T_idle, T_idle_se)`.
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.t_intv, self.t_intv_se, self.t_idle, self.t_idle_se)
    }
}

/// Raw per-stage samples of a run, in stage order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingSamples {
    /// Intervals of stages 2..num_stages
    pub intervals: Vec<f64>,

    /// Idle times, LEFT then RIGHT for every stage
    pub idle_times: Vec<f64>,
}

impl TimingSamples {
    /// Reduces the samples to a summary.
    pub fn summarize(&self) -> TimingSummary {
        let intervals = SampleStats::from_samples(&self.intervals);
        let idle = SampleStats::from_samples(&self.idle_times);

        TimingSummary {
            t_intv: intervals.mean,
            t_intv_se: intervals.std_error,
            t_idle: idle.mean,
            t_idle_se: idle.std_error,
            interval_count: intervals.count,
            idle_count: idle.count,
        }
    }
}

/// Output of a simulation, shaped by `get_all`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimulationOutput {
    Summary(TimingSummary),
    Samples(TimingSamples),
}

impl SimulationOutput {
    /// Returns the summary, reducing raw samples if needed.
    pub fn summary(&self) -> TimingSummary {
        match self {
            SimulationOutput::Summary(summary) => *summary,
            SimulationOutput::Samples(samples) => samples.summarize(),
        }
    }

    /// Returns the raw samples, if this output carries them.
    pub fn samples(&self) -> Option<&TimingSamples> {
        match self {
            SimulationOutput::Samples(samples) => Some(samples),
            SimulationOutput::Summary(_) => None,
        }
    }
}

/// Output of a run together with the master seed that reproduces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Master seed of the run, drawn from OS entropy when none was given
    pub seed: u64,

    #[serde(flatten)]
    pub output: SimulationOutput,
}

impl SimulationResult {
    /// Returns the summary, reducing raw samples if needed.
    pub fn summary(&self) -> TimingSummary {
        self.output.summary()
    }

    /// Returns the raw samples, if this result carries them.
    pub fn samples(&self) -> Option<&TimingSamples> {
        self.output.samples()
    }
}

/// Collects interval and idle samples stage by stage.
#[derive(Debug, Clone, Default)]
pub struct StageAggregator {
    samples: TimingSamples,
}

impl StageAggregator {
    /// Creates an aggregator sized for `num_stages` stages.
    pub fn with_capacity(num_stages: usize) -> Self {
        Self {
            samples: TimingSamples {
                intervals: Vec::with_capacity(num_stages.saturating_sub(1)),
                idle_times: Vec::with_capacity(2 * num_stages),
            },
        }
    }

    /// Records one stage.
    pub fn push(&mut self, stage: &Stage) {
        if let Some(interval) = stage.interval {
            self.samples.intervals.push(interval as f64);
        }
        self.samples.idle_times.push(stage.idle_left as f64);
        self.samples.idle_times.push(stage.idle_right as f64);
    }

    /// Returns the samples collected so far.
    pub fn samples(&self) -> &TimingSamples {
        &self.samples
    }

    /// Reduces to means and standard errors.
    pub fn summary(&self) -> TimingSummary {
        self.samples.summarize()
    }

    /// Finishes aggregation in the requested shape.
    pub fn finish(self, get_all: bool) -> SimulationOutput {
        if get_all {
            SimulationOutput::Samples(self.samples)
        } else {
            SimulationOutput::Summary(self.samples.summarize())
        }
    }
}
