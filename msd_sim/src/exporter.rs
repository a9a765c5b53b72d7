//! JSON exporter for sweep results and stage traces.
//!
//! Non-finite statistics (e.g. the interval mean of a single-stage run) are
//! written as `null` and read back as NaN.

use crate::runner::SweepPoint;
use msd_core::{MsdConfig, Stage, TimingSamples};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors raised while writing an export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Complete export of one CLI invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Shared configuration
    pub config: MsdConfig,

    /// First seed of the sweep
    pub base_seed: u64,

    /// One entry per (Nm, seed) run
    pub points: Vec<SweepPoint>,

    /// Raw samples of a single run, if requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<TimingSamples>,

    /// Per-stage trace of a single run, if requested
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub stages: Vec<Stage>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(config: MsdConfig, base_seed: u64) -> Self {
        Self {
            config,
            base_seed,
            points: Vec::new(),
            samples: None,
            stages: Vec::new(),
        }
    }

    /// Adds sweep points.
    pub fn add_points(&mut self, points: impl IntoIterator<Item = SweepPoint>) {
        self.points.extend(points);
    }

    /// Attaches raw samples.
    pub fn set_samples(&mut self, samples: TimingSamples) {
        self.samples = Some(samples);
    }

    /// Attaches a stage trace.
    pub fn set_stages(&mut self, stages: Vec<Stage>) {
        self.stages = stages;
    }

    /// Renders the export as pretty JSON.
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SweepRunner;

    fn config() -> MsdConfig {
        MsdConfig::new(3, 9, 2, 0.5, 16)
            .with_growing(0.9)
            .with_stages(50)
            .with_seed(5)
    }

    #[test]
    fn test_export_round_trip_through_file() {
        let runner = SweepRunner::new(config());
        let mut export = SimExport::new(config(), runner.base_seed());
        export.add_points(runner.run(&[1, 2]).unwrap());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.json");
        export.write_to_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["base_seed"], 5);
        assert_eq!(value["points"].as_array().unwrap().len(), 2);
        assert_eq!(value["config"]["pairing"], "earliest_first");
        assert!(value.get("stages").is_none());
    }

    #[test]
    fn test_nan_statistics_serialize_as_null() {
        let single = MsdConfig {
            num_stages: 1,
            ..config()
        };
        let runner = SweepRunner::new(single.clone());
        let mut export = SimExport::new(single, runner.base_seed());
        export.add_points(runner.run(&[1]).unwrap());

        let value: serde_json::Value = serde_json::from_str(&export.to_json().unwrap()).unwrap();
        let summary = &value["points"][0]["summary"];

        assert!(summary["t_intv"].is_null());
        assert_eq!(summary["interval_count"], 0);
        assert_eq!(summary["idle_count"], 2);
    }

    #[test]
    fn test_export_with_null_statistics_reads_back() {
        let single = MsdConfig {
            num_stages: 1,
            ..config()
        };
        let runner = SweepRunner::new(single.clone());
        let mut export = SimExport::new(single, runner.base_seed());
        export.add_points(runner.run(&[1, 2]).unwrap());

        let back: SimExport = serde_json::from_str(&export.to_json().unwrap()).unwrap();

        assert_eq!(back.base_seed, 5);
        assert_eq!(back.points.len(), 2);
        for (read, written) in back.points.iter().zip(&export.points) {
            assert_eq!(read.nm, written.nm);
            assert!(read.summary.t_intv.is_nan());
            assert!(read.summary.t_intv_se.is_nan());
            assert_eq!(read.summary.t_idle, written.summary.t_idle);
        }
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let export = SimExport::new(config(), 5);
        let dir = tempfile::tempdir().unwrap();
        let err = export
            .write_to_file(dir.path().join("missing").join("out.json"))
            .unwrap_err();

        assert!(matches!(err, ExportError::Io(_)));
    }
}
