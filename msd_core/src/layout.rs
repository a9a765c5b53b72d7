//! Staggered layout model - the tick-driven view of the same pipeline.
//!
//! Where the event-driven scheduler lets every patch retry freely, this
//! model follows the physical layout one tick at a time:
//! - On each side at most one new cultivation starts every `Tm` ticks, so
//!   trials are staggered across the `Nm` patches.
//! - A fresh state displaces the state already idling on its side.
//! - Consumed patches stay occupied by distillation for `dm + 1` ticks.
//! - A new stage can only be consumed once `dm` ticks passed since the
//!   previous one; outside that window trials that would finish a state are
//!   thrown away.
//!
//! Times reported by this model are in layout ticks, with
//! `ceil(t_cult / steps_per_tick)` ticks per cultivation trial.

use crate::config::MsdConfig;
use crate::error::{ConfigError, SimError};
use crate::scheduler::{Stage, StageSource};
use msd_env::{PatchId, Side, StreamContext};
use rand::distributions::{Bernoulli, Distribution};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// What a layout patch is doing during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStatus {
    /// Waiting for a cultivation slot
    Waiting,
    Cultivating,
    Growing,
    /// Holding a ready state
    Idling,
    /// Occupied by distillation
    Consumed,
}

#[derive(Debug, Clone)]
struct LayoutPatch {
    id: PatchId,
    status: PatchStatus,
    clock: u64,
}

impl LayoutPatch {
    fn set_status(&mut self, status: PatchStatus) {
        self.status = status;
        self.clock = 0;
    }
}

/// Durations of the layout model, all in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutTiming {
    /// Ticks per cultivation trial
    pub cult_ticks: u64,

    /// Ticks per growing step
    pub growing_ticks: u64,

    /// Minimum ticks between cultivation starts on one side
    pub stagger_ticks: u64,

    /// Distillation duration
    pub dm: u64,

    /// Whether a growing step follows cultivation
    pub need_growing: bool,

    /// Whether the growing step is post-selected
    pub post_selected: bool,
}

impl LayoutTiming {
    /// Derives tick durations from a configuration.
    pub fn from_config(config: &MsdConfig) -> Self {
        let cult_ticks = config.t_cult.div_ceil(config.steps_per_tick);
        let need_growing = config.dm > config.dcult;
        let post_selected = config.post_selected_growing && need_growing;

        Self {
            cult_ticks,
            growing_ticks: if post_selected { config.dm as u64 } else { 1 },
            stagger_ticks: cult_ticks.div_ceil(config.nm as u64),
            dm: config.dm as u64,
            need_growing,
            post_selected,
        }
    }
}

/// Tick-driven simulation of the `2 * Nm` patch layout.
#[derive(Debug)]
pub struct StaggeredLayout<R = ChaCha8Rng> {
    /// LEFT patches then RIGHT patches
    patches: Vec<LayoutPatch>,

    nm: usize,
    timing: LayoutTiming,
    cultivation: Bernoulli,

    /// None when growing always succeeds
    growing: Option<Bernoulli>,

    /// Single stream, drawn in fixed patch order
    rng: R,

    /// Patch currently idling on each side
    idling: [Option<usize>; 2],

    /// Ticks since the last cultivation start per side
    cult_clock: [u64; 2],

    /// Ticks since the last consumption
    stage_clock: u64,

    /// Absolute tick
    now: u64,

    stages: usize,
    last_round: Option<u64>,

    /// Ticks without a stage before giving up
    max_quiet_ticks: u64,
}

impl StaggeredLayout<ChaCha8Rng> {
    /// Creates the layout, drawing from the context's layout stream.
    pub fn new<C: StreamContext>(config: &MsdConfig, ctx: &C) -> Result<Self, SimError> {
        Self::with_rng(config, ctx.layout_stream())
    }
}

impl<R: Rng> StaggeredLayout<R> {
    /// Creates the layout with an explicit random stream.
    pub fn with_rng(config: &MsdConfig, rng: R) -> Result<Self, SimError> {
        config.validate()?;
        let timing = LayoutTiming::from_config(config);

        let cultivation = Bernoulli::new(config.psucc_cult)
            .map_err(|_| ConfigError::probability("psucc_cult", config.psucc_cult))?;
        let growing = if timing.post_selected {
            let p = config.growing_acceptance();
            Some(Bernoulli::new(p).map_err(|_| ConfigError::probability("psucc_growing", p))?)
        } else {
            None
        };

        let mut patches: Vec<LayoutPatch> = Side::BOTH
            .iter()
            .flat_map(|&side| {
                (0..config.nm).map(move |index| LayoutPatch {
                    id: PatchId::new(side, index),
                    status: PatchStatus::Waiting,
                    clock: 0,
                })
            })
            .collect();

        // The first patch of each side starts right away
        patches[0].set_status(PatchStatus::Cultivating);
        patches[config.nm].set_status(PatchStatus::Cultivating);

        let cycle = [timing.growing_ticks, timing.stagger_ticks, timing.dm, 1]
            .iter()
            .fold(timing.cult_ticks, |total, &ticks| total.saturating_add(ticks));

        Ok(Self {
            patches,
            nm: config.nm,
            timing,
            cultivation,
            growing,
            rng,
            idling: [None, None],
            cult_clock: [0, 0],
            stage_clock: 0,
            now: 0,
            stages: 0,
            last_round: None,
            max_quiet_ticks: config.max_attempts_per_event.saturating_mul(cycle),
        })
    }

    /// Returns the derived tick durations.
    pub fn timing(&self) -> LayoutTiming {
        self.timing
    }

    /// Returns the current absolute tick.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Returns the status of one patch.
    pub fn status(&self, patch: PatchId) -> Option<PatchStatus> {
        let offset = patch.side.as_index() * self.nm;
        self.patches
            .get(offset + patch.index)
            .filter(|p| patch.index < self.nm && p.id == patch)
            .map(|p| p.status)
    }

    fn side_of(&self, i: usize) -> usize {
        self.patches[i].id.side.as_index()
    }

    /// Starts a cultivation on `i` if the side's stagger slot is free,
    /// otherwise parks the patch.
    fn start_cultivation_or_wait(&mut self, i: usize) {
        let side = self.side_of(i);
        if self.cult_clock[side] >= self.timing.stagger_ticks {
            self.patches[i].set_status(PatchStatus::Cultivating);
            self.cult_clock[side] = 0;
        } else if self.patches[i].status != PatchStatus::Waiting {
            self.patches[i].set_status(PatchStatus::Waiting);
        }
    }

    /// Makes `i` the idling patch of its side, displacing any stale one.
    fn promote_to_idling(&mut self, i: usize) {
        let side = self.side_of(i);
        if let Some(previous) = self.idling[side] {
            self.start_cultivation_or_wait(previous);
        }
        self.patches[i].set_status(PatchStatus::Idling);
        self.idling[side] = Some(i);
    }

    fn step_patch(&mut self, i: usize, consumable: bool) {
        let status = self.patches[i].status;
        let clock = self.patches[i].clock;

        match status {
            PatchStatus::Waiting => self.start_cultivation_or_wait(i),
            PatchStatus::Cultivating if clock == self.timing.cult_ticks => {
                let success = (consumable || self.timing.need_growing)
                    && self.cultivation.sample(&mut self.rng);

                if !success {
                    self.start_cultivation_or_wait(i);
                } else if self.timing.need_growing {
                    self.patches[i].set_status(PatchStatus::Growing);
                } else {
                    self.promote_to_idling(i);
                }
            }
            PatchStatus::Growing if clock == self.timing.growing_ticks => {
                let success = consumable
                    && match &self.growing {
                        Some(growing) => growing.sample(&mut self.rng),
                        None => true,
                    };

                if success {
                    self.promote_to_idling(i);
                } else {
                    self.start_cultivation_or_wait(i);
                }
            }
            PatchStatus::Consumed if clock == self.timing.dm + 1 => {
                self.start_cultivation_or_wait(i);
            }
            _ => {}
        }
    }

    /// Advances one tick; returns a stage if one was consumed.
    fn tick(&mut self) -> Option<Stage> {
        self.now += 1;
        self.stage_clock += 1;
        self.cult_clock[0] += 1;
        self.cult_clock[1] += 1;
        for patch in &mut self.patches {
            patch.clock += 1;
        }

        let consumable = self.stage_clock > self.timing.dm || self.stages == 0;

        for i in 0..self.patches.len() {
            self.step_patch(i, consumable);
        }

        trace!(
            "tick={} stage_clock={} cult_clock={:?} consumable={}",
            self.now,
            self.stage_clock,
            self.cult_clock,
            consumable
        );

        if !consumable {
            return None;
        }
        let (Some(l), Some(r)) = (self.idling[0], self.idling[1]) else {
            return None;
        };

        let idle_left = self.patches[l].clock;
        let idle_right = self.patches[r].clock;
        let stage = Stage {
            index: self.stages,
            left_ready_time: self.now - idle_left,
            right_ready_time: self.now - idle_right,
            round_time: self.now,
            interval: self.last_round.map(|_| self.stage_clock),
            idle_left,
            idle_right,
            left_patch: self.patches[l].id,
            right_patch: self.patches[r].id,
        };

        self.patches[l].set_status(PatchStatus::Consumed);
        self.patches[r].set_status(PatchStatus::Consumed);
        self.idling = [None, None];
        self.stage_clock = 0;
        self.stages += 1;
        self.last_round = Some(self.now);

        Some(stage)
    }
}

impl<R: Rng> StageSource for StaggeredLayout<R> {
    fn next_stage(&mut self) -> Result<Stage, SimError> {
        loop {
            if let Some(stage) = self.tick() {
                return Ok(stage);
            }
            if self.stage_clock >= self.max_quiet_ticks {
                return Err(SimError::LayoutStalled {
                    ticks: self.stage_clock,
                });
            }
        }
    }
}
