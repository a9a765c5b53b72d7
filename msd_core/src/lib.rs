//! Magic-State Cycle Core - cultivation + distillation timing engine
//!
//! This library estimates two throughput statistics of a hybrid
//! magic-state factory, where cultivation patches retry until they accept a
//! state and a distillation stage consumes one LEFT and one RIGHT state:
//! 1. **T_intv**: mean time between consecutive completed rounds
//! 2. **T_idle**: mean time a ready state waits before it is consumed
//!
//! Two cycle models share the same stage type and aggregator:
//! - [`PairingScheduler`]: `2 * Nm` independent retrying patches, merged
//!   per side by ready time (default)
//! - [`StaggeredLayout`]: tick-driven layout with staggered cultivation
//!   starts and distillation occupancy
//!
//! # Example
//!
//! ```
//! use msd_core::{simulate_msd, MsdConfig};
//!
//! let config = MsdConfig::new(3, 15, 2, 0.3, 20)
//!     .with_growing(0.8)
//!     .with_stages(500)
//!     .with_seed(42);
//!
//! let result = simulate_msd(&config).unwrap();
//! let (t_intv, _, t_idle, _) = result.summary().as_tuple();
//! assert!(t_intv > 0.0 && t_idle >= 0.0);
//! ```

pub mod config;
pub mod error;
pub mod layout;
pub mod patch;
pub mod scheduler;
pub mod simulate;
pub mod stats;

// Re-export key types for convenience
pub use config::{CycleModel, MsdConfig, PairingPolicy};
pub use error::{ConfigError, SimError};
pub use layout::{LayoutTiming, PatchStatus, StaggeredLayout};
pub use patch::{PatchProcess, ReadyEvent, TrialParams};
pub use scheduler::{PairingScheduler, Stage, StageSource};
pub use simulate::{
    build_source, run_stages, simulate_msd, simulate_msd_observed, simulate_with_context,
    StageObserver,
};
pub use stats::{
    SampleStats, SimulationOutput, SimulationResult, StageAggregator, TimingSamples,
    TimingSummary,
};
