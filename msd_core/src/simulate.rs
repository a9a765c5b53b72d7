//! Entry point - drives a stage source and aggregates its output.

use crate::config::{CycleModel, MsdConfig};
use crate::error::SimError;
use crate::layout::StaggeredLayout;
use crate::scheduler::{PairingScheduler, Stage, StageSource};
use crate::stats::{SimulationResult, StageAggregator};
use msd_env::{EntropyContext, SeededContext, StreamContext};
use tracing::{debug, info};

/// Receives every stage as it is produced.
///
/// Observers see stages in order and cannot influence the run.
pub trait StageObserver {
    fn on_stage(&mut self, stage: &Stage);
}

impl<F: FnMut(&Stage)> StageObserver for F {
    fn on_stage(&mut self, stage: &Stage) {
        self(stage)
    }
}

/// Simulates one magic-state preparation cycle run.
///
/// Returns `(T_intv, T_intv_se, T_idle, T_idle_se)` as a
/// [`SimulationOutput::Summary`](crate::SimulationOutput::Summary), or the raw
/// samples when `get_all` is set. The result carries the master seed, so an
/// unseeded run can be replayed with `with_seed(result.seed)`.
///
/// # Errors
/// - `SimError::Config` before any simulation work if the config is invalid
/// - `SimError::PatchStalled` / `SimError::LayoutStalled` on non-progress
pub fn simulate_msd(config: &MsdConfig) -> Result<SimulationResult, SimError> {
    simulate_msd_observed(config, &mut |_: &Stage| {})
}

/// Like [`simulate_msd`], handing every stage to `observer`.
pub fn simulate_msd_observed<O: StageObserver + ?Sized>(
    config: &MsdConfig,
    observer: &mut O,
) -> Result<SimulationResult, SimError> {
    config.validate()?;

    match config.seed {
        Some(seed) => simulate_with_context(config, &SeededContext::new(seed), observer),
        None => {
            let ctx = EntropyContext::new();
            info!("No seed given, drew master seed {} from OS entropy", ctx.seed());
            simulate_with_context(config, &ctx, observer)
        }
    }
}

/// Runs the simulation against an explicit randomness context.
///
/// `config.seed` is ignored; the context decides every draw and its seed is
/// the one reported.
pub fn simulate_with_context<C, O>(
    config: &MsdConfig,
    ctx: &C,
    observer: &mut O,
) -> Result<SimulationResult, SimError>
where
    C: StreamContext,
    O: StageObserver + ?Sized,
{
    let mut source = build_source(config, ctx)?;
    log_start(config, ctx.seed());

    let mut aggregator = StageAggregator::with_capacity(config.num_stages);
    for _ in 0..config.num_stages {
        let stage = source.next_stage()?;
        if config.verbose {
            info!(
                "stage {}: round={} L={}@{} R={}@{} interval={:?} idle=({}, {})",
                stage.index,
                stage.round_time,
                stage.left_patch,
                stage.left_ready_time,
                stage.right_patch,
                stage.right_ready_time,
                stage.interval,
                stage.idle_left,
                stage.idle_right
            );
        }
        observer.on_stage(&stage);
        aggregator.push(&stage);
    }

    let summary = aggregator.summary();
    debug!(
        "finished {} stages: T_intv={:.3} (±{:.3}) T_idle={:.3} (±{:.3})",
        config.num_stages, summary.t_intv, summary.t_intv_se, summary.t_idle, summary.t_idle_se
    );

    Ok(SimulationResult {
        seed: ctx.seed(),
        output: aggregator.finish(config.get_all),
    })
}

/// Runs the simulation and returns every stage.
pub fn run_stages<C: StreamContext>(config: &MsdConfig, ctx: &C) -> Result<Vec<Stage>, SimError> {
    let mut source = build_source(config, ctx)?;
    (0..config.num_stages).map(|_| source.next_stage()).collect()
}

/// Builds the stage source for the configured cycle model.
///
/// Validates the configuration first, so nothing is simulated on error.
pub fn build_source<C: StreamContext>(
    config: &MsdConfig,
    ctx: &C,
) -> Result<Box<dyn StageSource>, SimError> {
    config.validate()?;

    Ok(match config.model {
        CycleModel::EventDriven => Box::new(PairingScheduler::new(config, ctx)?),
        CycleModel::Staggered => Box::new(StaggeredLayout::new(config, ctx)?),
    })
}

fn log_start(config: &MsdConfig, seed: u64) {
    let level_info = config.verbose;
    let header = format!(
        "Simulating {} stages ({} model, seed={}): dcult={} dm={} Nm={} psucc_cult={} t_cult={}",
        config.num_stages,
        config.model,
        seed,
        config.dcult,
        config.dm,
        config.nm,
        config.psucc_cult,
        config.t_cult
    );
    let growing = if config.post_selected_growing {
        format!(
            "growing post-selected, psucc_growing={} t_grow={} pairing={}",
            config.growing_acceptance(),
            config.t_grow,
            config.pairing
        )
    } else {
        format!("growing not post-selected, t_grow={} pairing={}", config.t_grow, config.pairing)
    };

    if level_info {
        info!("{}", header);
        info!("{}", growing);
    } else {
        debug!("{}", header);
        debug!("{}", growing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PairingPolicy;
    use crate::error::ConfigError;
    use crate::stats::SimulationOutput;
    use approx::assert_relative_eq;

    fn summary(config: &MsdConfig) -> crate::TimingSummary {
        match simulate_msd(config).unwrap().output {
            SimulationOutput::Summary(summary) => summary,
            SimulationOutput::Samples(_) => panic!("expected summary"),
        }
    }

    fn samples(config: &MsdConfig) -> crate::TimingSamples {
        match simulate_msd(&config.clone().with_all_samples(true)).unwrap().output {
            SimulationOutput::Samples(samples) => samples,
            SimulationOutput::Summary(_) => panic!("expected samples"),
        }
    }

    #[test]
    fn test_certain_success_single_patch() {
        let config = MsdConfig::new(3, 3, 1, 1.0, 12)
            .without_post_selection()
            .with_stages(200)
            .with_seed(1);
        let raw = samples(&config);

        assert_eq!(raw.intervals.len(), 199);
        assert!(raw.intervals.iter().all(|&t| t == 12.0));
        assert!(raw.idle_times.iter().all(|&t| t == 0.0));

        let s = summary(&config);
        assert_relative_eq!(s.t_intv, 12.0);
        assert_relative_eq!(s.t_intv_se, 0.0);
        assert_relative_eq!(s.t_idle, 0.0);
    }

    #[test]
    fn test_single_stage_sample_counts() {
        let config = MsdConfig::new(3, 7, 2, 0.5, 5)
            .with_growing(0.5)
            .with_stages(1)
            .with_seed(3);

        let raw = samples(&config);
        assert_eq!(raw.intervals.len(), 0);
        assert_eq!(raw.idle_times.len(), 2);

        let s = summary(&config);
        assert!(s.t_intv.is_nan());
        assert!(s.t_intv_se.is_nan());
        assert!(s.t_idle.is_finite());
    }

    #[test]
    fn test_sample_lengths() {
        let config = MsdConfig::new(3, 7, 3, 0.3, 5)
            .with_growing(0.6)
            .with_stages(500)
            .with_seed(4);
        let raw = samples(&config);

        assert_eq!(raw.intervals.len(), 499);
        assert_eq!(raw.idle_times.len(), 1000);
        assert!(raw.idle_times.iter().all(|&t| t >= 0.0));
    }

    #[test]
    fn test_determinism_per_seed() {
        let config = MsdConfig::new(3, 7, 2, 0.3, 10)
            .with_growing(0.7)
            .with_stages(2000)
            .with_seed(2024);

        let a = samples(&config);
        let b = samples(&config);
        let c = samples(&config.clone().with_seed(2025));

        assert_eq!(a, b);
        assert_ne!(a, c);

        let sa = summary(&config);
        let sb = summary(&config);
        assert_eq!(sa.t_intv.to_bits(), sb.t_intv.to_bits());
        assert_eq!(sa.t_idle_se.to_bits(), sb.t_idle_se.to_bits());
    }

    #[test]
    fn test_get_all_matches_summary() {
        for model in [CycleModel::EventDriven, CycleModel::Staggered] {
            let config = MsdConfig::new(3, 9, 3, 0.4, 24)
                .with_growing(0.8)
                .with_stages(1500)
                .with_seed(77)
                .with_model(model);

            let raw = samples(&config);
            let s = summary(&config);

            let mean_intv = raw.intervals.iter().sum::<f64>() / raw.intervals.len() as f64;
            let mean_idle = raw.idle_times.iter().sum::<f64>() / raw.idle_times.len() as f64;
            assert_relative_eq!(mean_intv, s.t_intv, max_relative = 1e-12);
            assert_relative_eq!(mean_idle, s.t_idle, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_lower_success_rate_lengthens_interval() {
        let fast = MsdConfig::new(3, 3, 1, 0.9, 10)
            .without_post_selection()
            .with_stages(5000)
            .with_seed(7);
        let slow = MsdConfig {
            psucc_cult: 0.3,
            ..fast.clone()
        };

        assert!(summary(&slow).t_intv > summary(&fast).t_intv);
    }

    #[test]
    fn test_missing_growing_rate_fails_before_work() {
        let config = MsdConfig::new(3, 7, 2, 0.5, 5).with_seed(1);
        let mut seen = 0usize;

        let err = simulate_msd_observed(&config, &mut |_: &Stage| seen += 1).unwrap_err();

        assert_eq!(err, SimError::Config(ConfigError::MissingGrowingProbability));
        assert_eq!(seen, 0);
    }

    #[test]
    fn test_observer_sees_every_stage_in_order() {
        let config = MsdConfig::new(3, 7, 2, 0.5, 5)
            .with_growing(0.9)
            .with_stages(300)
            .with_seed(12)
            .with_pairing(PairingPolicy::RoundRobin);
        let mut rounds = Vec::new();

        simulate_msd_observed(&config, &mut |stage: &Stage| rounds.push(stage.round_time)).unwrap();

        assert_eq!(rounds.len(), 300);
        assert!(rounds.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_run_stages_matches_simulation() {
        let config = MsdConfig::new(3, 7, 2, 0.5, 5)
            .with_growing(0.9)
            .with_stages(100)
            .with_seed(8);

        let stages = run_stages(&config, &SeededContext::new(8)).unwrap();
        let mut observed = Vec::new();
        simulate_msd_observed(&config, &mut |stage: &Stage| observed.push(*stage)).unwrap();

        assert_eq!(stages, observed);
    }

    #[test]
    fn test_unseeded_runs_complete() {
        let config = MsdConfig::new(3, 7, 2, 0.5, 5)
            .without_post_selection()
            .with_stages(50);
        let s = summary(&config);

        assert_eq!(s.interval_count, 49);
        assert_eq!(s.idle_count, 100);
    }

    #[test]
    fn test_unseeded_run_replays_from_reported_seed() {
        let config = MsdConfig::new(3, 7, 2, 0.4, 6)
            .with_growing(0.8)
            .with_stages(300)
            .with_all_samples(true);

        let first = simulate_msd(&config).unwrap();
        let replay = simulate_msd(&config.clone().with_seed(first.seed)).unwrap();

        assert_eq!(replay.seed, first.seed);
        assert_eq!(replay.samples(), first.samples());
    }

    #[test]
    fn test_seeded_result_reports_seed() {
        let config = MsdConfig::new(3, 3, 1, 0.5, 4)
            .without_post_selection()
            .with_stages(10)
            .with_seed(31);

        assert_eq!(simulate_msd(&config).unwrap().seed, 31);
    }

    #[test]
    fn test_idle_time_independent_of_run_length() {
        for nm in [1, 3] {
            let short = MsdConfig::new(3, 7, nm, 0.5, 8)
                .with_growing(0.8)
                .with_stages(1_000)
                .with_seed(1);
            let long = short.clone().with_stages(100_000);

            let a = summary(&short);
            let b = summary(&long);

            let tolerance = 6.0 * (a.t_idle_se.powi(2) + b.t_idle_se.powi(2)).sqrt();
            assert!(
                (a.t_idle - b.t_idle).abs() <= tolerance,
                "Nm={}: T_idle {} vs {} (tolerance {})",
                nm,
                a.t_idle,
                b.t_idle,
                tolerance
            );
            assert_relative_eq!(a.t_intv, b.t_intv, max_relative = 0.1);
        }
    }

    #[test]
    fn test_single_patch_idle_is_bounded_by_interval() {
        // With one patch per side, a waiting state idles for less than the
        // round it waited in.
        let config = MsdConfig::new(3, 7, 1, 0.5, 8)
            .with_growing(0.8)
            .with_stages(20_000)
            .with_seed(5);
        let s = summary(&config);

        assert!(s.t_idle < s.t_intv);
    }
}
