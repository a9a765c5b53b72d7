//! Magic-State Cycle Simulator CLI
//!
//! Estimate round intervals and idling times of a cultivation + distillation
//! magic-state factory.

use clap::Parser;
use msd_core::{simulate_msd_observed, CycleModel, MsdConfig, PairingPolicy, SimulationResult, Stage};
use msd_sim::{SimExport, SweepPoint, SweepRunner};
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Magic-state cycle simulator
#[derive(Parser, Debug)]
#[command(name = "msd-sim")]
#[command(about = "Simulate the preparation cycle of a cultivation + distillation scheme", long_about = None)]
struct Args {
    /// Code distance of each cultivation patch before growing
    #[arg(long)]
    dcult: u32,

    /// Code distance after growing
    #[arg(long)]
    dm: u32,

    /// Cultivation patches per side
    #[arg(long, default_value = "1")]
    nm: usize,

    /// Cultivation success rate
    #[arg(long)]
    psucc_cult: f64,

    /// Time steps per cultivation trial, excluding growing
    #[arg(long)]
    t_cult: u64,

    /// Disable post-selection of the growing step
    #[arg(long)]
    no_post_selection: bool,

    /// Growing success rate (required unless --no-post-selection)
    #[arg(long)]
    psucc_growing: Option<f64>,

    /// Time steps spent growing (event-driven model)
    #[arg(long, default_value = "0")]
    t_grow: u64,

    /// Number of consumed pairs to simulate
    #[arg(short = 'n', long, default_value = "10000")]
    stages: usize,

    /// Master seed (omit for a fresh seed from OS entropy)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Pairing policy (earliest_first, round_robin)
    #[arg(long, default_value = "earliest_first")]
    pairing: PairingPolicy,

    /// Cycle model (event_driven, staggered)
    #[arg(long, default_value = "event_driven")]
    model: CycleModel,

    /// Cultivation time steps per layout tick (staggered model)
    #[arg(long, default_value = "8")]
    steps_per_tick: u64,

    /// Sweep over these Nm values instead of --nm (comma separated)
    #[arg(long, value_delimiter = ',')]
    sweep_nm: Vec<usize>,

    /// Number of consecutive seeds per Nm value
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Return all per-stage samples of a single run
    #[arg(long)]
    all: bool,

    /// Log every stage
    #[arg(short, long)]
    verbose: bool,

    /// JSON output
    #[arg(long)]
    json: bool,

    /// Write results to a JSON file
    #[arg(long)]
    export: Option<String>,
}

impl Args {
    fn config(&self) -> MsdConfig {
        MsdConfig {
            post_selected_growing: !self.no_post_selection,
            psucc_growing: self.psucc_growing,
            t_grow: self.t_grow,
            num_stages: self.stages,
            seed: self.seed,
            verbose: self.verbose,
            get_all: self.all,
            pairing: self.pairing,
            model: self.model,
            steps_per_tick: self.steps_per_tick,
            ..MsdConfig::new(self.dcult, self.dm, self.nm, self.psucc_cult, self.t_cult)
        }
    }
}

/// Runs one simulation and keeps its stage trace for export.
fn run_single(config: &MsdConfig, export: &mut SimExport) -> Result<SimulationResult, msd_core::SimError> {
    let mut stages: Vec<Stage> = Vec::new();
    let keep_trace = config.get_all;
    let result = simulate_msd_observed(config, &mut |stage: &Stage| {
        if keep_trace {
            stages.push(*stage);
        }
    })?;

    if let Some(samples) = result.samples() {
        export.set_samples(samples.clone());
    }
    export.set_stages(stages);
    Ok(result)
}

fn report_points(points: &[SweepPoint]) {
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("{:>4} {:>20} {:>12} {:>10} {:>12} {:>10}", "Nm", "seed", "T_intv", "±", "T_idle", "±");
    for point in points {
        let s = &point.summary;
        info!(
            "{:>4} {:>20} {:>12.4} {:>10.4} {:>12.4} {:>10.4}",
            point.nm, point.seed, s.t_intv, s.t_intv_se, s.t_idle, s.t_idle_se
        );
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for --json output
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    let config = args.config();
    if let Err(e) = config.validate() {
        error!("✗ {}", e);
        return ExitCode::FAILURE;
    }

    let runner = SweepRunner::new(config.clone()).with_seeds(args.seeds);
    let mut export = SimExport::new(config.clone(), runner.base_seed());

    if !args.json {
        info!("Magic-State Cycle Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    if args.all {
        if !args.sweep_nm.is_empty() || args.seeds > 1 {
            error!("--all only supports a single run, not a sweep");
            return ExitCode::FAILURE;
        }

        let single = MsdConfig {
            seed: Some(runner.base_seed()),
            ..config
        };
        let result = match run_single(&single, &mut export) {
            Ok(result) => result,
            Err(e) => {
                error!("✗ Simulation failed: {}", e);
                return ExitCode::FAILURE;
            }
        };

        if args.json {
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    error!("✗ Failed to render JSON: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        } else if let Some(samples) = result.samples() {
            let summary = result.summary();
            info!(
                "Collected {} intervals and {} idle times (seed={})",
                samples.intervals.len(),
                samples.idle_times.len(),
                runner.base_seed()
            );
            info!(
                "T_intv={:.4} ± {:.4}  T_idle={:.4} ± {:.4}",
                summary.t_intv, summary.t_intv_se, summary.t_idle, summary.t_idle_se
            );
        }
    } else {
        let nm_values = if args.sweep_nm.is_empty() {
            vec![config.nm]
        } else {
            args.sweep_nm.clone()
        };

        let points = match runner.run(&nm_values) {
            Ok(points) => points,
            Err(e) => {
                error!("✗ Sweep failed: {}", e);
                return ExitCode::FAILURE;
            }
        };

        if args.json {
            let summary = serde_json::json!({
                "base_seed": runner.base_seed(),
                "model": config.model.name(),
                "pairing": config.pairing.name(),
                "results": points,
            });
            match serde_json::to_string_pretty(&summary) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    error!("✗ Failed to render JSON: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        } else {
            report_points(&points);
        }
        export.add_points(points);
    }

    if let Some(path) = &args.export {
        if let Err(e) = export.write_to_file(path) {
            error!("Failed to write export: {}", e);
            return ExitCode::FAILURE;
        }
        info!("Exported results to {}", path);
    }

    ExitCode::SUCCESS
}
