//! Magic-State Cycle Harness
//!
//! Thin layer around `msd_core` for running parameter sweeps and exporting
//! their results:
//!
//! ```text
//!  CLI args ──► MsdConfig ──► SweepRunner ──► Vec<SweepPoint> ──► SimExport (JSON)
//!                                 │
//!                   one run per (Nm, seed) via msd_core::simulate_with_context
//! ```
//!
//! # Usage
//!
//! ```
//! use msd_core::MsdConfig;
//! use msd_sim::SweepRunner;
//!
//! let base = MsdConfig::new(3, 15, 1, 0.3, 20)
//!     .with_growing(0.8)
//!     .with_stages(200)
//!     .with_seed(42);
//!
//! let points = SweepRunner::new(base).with_seeds(2).run(&[1, 2]).unwrap();
//! assert_eq!(points.len(), 4);
//! ```

mod exporter;
mod runner;

pub use exporter::{ExportError, SimExport};
pub use runner::{SweepPoint, SweepRunner};
