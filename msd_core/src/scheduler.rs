//! Pairing Scheduler - joins the LEFT and RIGHT producer pools.
//!
//! Each side owns `Nm` independent patch processes. Every patch holds
//! exactly one pending state: either accepted and waiting, or still being
//! cultivated. A min-heap over the pending ready times makes the earliest
//! state of a side one `pop` away. A stage pairs one state from each side:
//!
//! ```text
//!  LEFT  L0 ──┐                         ┌── R0  RIGHT
//!        L1 ──┼─► min-heap ─┐     ┌─ min-heap ◄─┼── R1
//!        ..  ─┘             ▼     ▼             └── ..
//!                         Stage k
//!             round_time = max(left_ready, right_ready)
//! ```
//!
//! A patch whose state waits stops cultivating. Once paired, the two
//! consumed patches restart at the round time; every other patch keeps its
//! pending state. Because every patch has a private stream, the order in
//! which patches are pulled cannot change any ready time.

use crate::config::{MsdConfig, PairingPolicy};
use crate::error::SimError;
use crate::patch::{PatchProcess, ReadyEvent, TrialParams};
use msd_env::{PatchId, Side, StreamContext};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// One consumption event: a LEFT and a RIGHT state paired for distillation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Zero-based stage number
    pub index: usize,

    /// Ready time of the consumed LEFT state
    pub left_ready_time: u64,

    /// Ready time of the consumed RIGHT state
    pub right_ready_time: u64,

    /// Time both halves are available
    pub round_time: u64,

    /// Time since the previous round (None for the first stage)
    pub interval: Option<u64>,

    /// Wait of the LEFT state before consumption
    pub idle_left: u64,

    /// Wait of the RIGHT state before consumption
    pub idle_right: u64,

    /// Patch that produced the LEFT state
    pub left_patch: PatchId,

    /// Patch that produced the RIGHT state
    pub right_patch: PatchId,
}

impl Stage {
    /// Assembles a stage from the two consumed states.
    ///
    /// The round cannot complete before the previous one did, so the round
    /// time is also clamped to `previous_round`.
    pub fn pair(
        index: usize,
        left: ReadyEvent,
        right: ReadyEvent,
        previous_round: Option<u64>,
    ) -> Self {
        let round_time = left
            .time
            .max(right.time)
            .max(previous_round.unwrap_or(0));

        Self {
            index,
            left_ready_time: left.time,
            right_ready_time: right.time,
            round_time,
            interval: previous_round.map(|prev| round_time - prev),
            idle_left: round_time - left.time,
            idle_right: round_time - right.time,
            left_patch: left.patch,
            right_patch: right.patch,
        }
    }
}

/// Anything that yields an ordered stream of stages.
pub trait StageSource {
    /// Produces the next stage.
    fn next_stage(&mut self) -> Result<Stage, SimError>;
}

/// The producer pool of one side.
#[derive(Debug)]
struct SideQueue {
    /// Patch processes, indexed by patch index
    patches: Vec<PatchProcess>,

    /// Next state of every patch
    pending: Vec<ReadyEvent>,

    /// (time, patch index) of pending states not yet taken
    heads: BinaryHeap<Reverse<(u64, usize)>>,

    policy: PairingPolicy,
}

impl SideQueue {
    fn new<C: StreamContext>(
        side: Side,
        nm: usize,
        params: TrialParams,
        policy: PairingPolicy,
        ctx: &C,
    ) -> Result<Self, SimError> {
        let mut patches: Vec<PatchProcess> = (0..nm)
            .map(|index| {
                let id = PatchId::new(side, index);
                PatchProcess::new(id, params, ctx.patch_stream(id))
            })
            .collect();

        let pending = patches
            .iter_mut()
            .map(PatchProcess::next_ready)
            .collect::<Result<Vec<_>, _>>()?;

        let mut queue = Self {
            patches,
            pending,
            heads: BinaryHeap::with_capacity(nm),
            policy,
        };
        if policy == PairingPolicy::EarliestFirst {
            for (index, event) in queue.pending.iter().enumerate() {
                queue.heads.push(Reverse((event.time, index)));
            }
        }
        Ok(queue)
    }

    /// Takes the earliest pending state across all patches of the side.
    ///
    /// Ties go to the lowest patch index.
    fn pop_earliest(&mut self) -> ReadyEvent {
        let Some(Reverse((_, index))) = self.heads.pop() else {
            unreachable!("every patch keeps one pending state");
        };
        self.pending[index]
    }

    /// Returns the pending state of one specific patch.
    fn pending_of(&self, index: usize) -> ReadyEvent {
        self.pending[index]
    }

    /// Restarts a consumed patch at `round_time` and queues its next state.
    fn release(&mut self, index: usize, round_time: u64) -> Result<(), SimError> {
        let patch = &mut self.patches[index];
        patch.restart_at(round_time);
        let event = patch.next_ready()?;

        self.pending[index] = event;
        if self.policy == PairingPolicy::EarliestFirst {
            self.heads.push(Reverse((event.time, index)));
        }
        Ok(())
    }
}

/// Synchronizes the two producer pools into an ordered stage stream.
#[derive(Debug)]
pub struct PairingScheduler {
    left: SideQueue,
    right: SideQueue,
    policy: PairingPolicy,
    nm: usize,
    stages: usize,
    last_round: Option<u64>,
}

impl PairingScheduler {
    /// Creates the scheduler and its `2 * nm` patch processes.
    ///
    /// # Errors
    /// - `SimError::Config` if the configuration does not validate
    /// - any patch error raised while producing the first states
    pub fn new<C: StreamContext>(config: &MsdConfig, ctx: &C) -> Result<Self, SimError> {
        config.validate()?;
        let params = TrialParams::from_config(config)?;

        Ok(Self {
            left: SideQueue::new(Side::Left, config.nm, params, config.pairing, ctx)?,
            right: SideQueue::new(Side::Right, config.nm, params, config.pairing, ctx)?,
            policy: config.pairing,
            nm: config.nm,
            stages: 0,
            last_round: None,
        })
    }

    /// Returns the number of stages produced so far.
    pub fn stages_completed(&self) -> usize {
        self.stages
    }

    /// Returns the round time of the latest stage.
    pub fn last_round_time(&self) -> Option<u64> {
        self.last_round
    }

    /// Returns the pending state of every patch on one side.
    pub fn pending(&self, side: Side) -> &[ReadyEvent] {
        match side {
            Side::Left => &self.left.pending,
            Side::Right => &self.right.pending,
        }
    }

    fn pop_pair(&mut self) -> (ReadyEvent, ReadyEvent) {
        match self.policy {
            PairingPolicy::EarliestFirst => (self.left.pop_earliest(), self.right.pop_earliest()),
            PairingPolicy::RoundRobin => {
                let index = self.stages % self.nm;
                (self.left.pending_of(index), self.right.pending_of(index))
            }
        }
    }
}

impl StageSource for PairingScheduler {
    fn next_stage(&mut self) -> Result<Stage, SimError> {
        let (left, right) = self.pop_pair();
        let stage = Stage::pair(self.stages, left, right, self.last_round);

        self.left.release(left.patch.index, stage.round_time)?;
        self.right.release(right.patch.index, stage.round_time)?;

        self.stages += 1;
        self.last_round = Some(stage.round_time);
        Ok(stage)
    }
}

impl Iterator for PairingScheduler {
    type Item = Result<Stage, SimError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_stage())
    }
}
