//! Magic-State Cycle Environment Layer
//!
//! This crate owns every source of randomness the simulator touches, so the
//! engine in `msd_core` never reaches for a global generator.
//!
//! # Core Concept: One Seed, Many Streams
//!
//! A run is described by a single 64-bit master seed. Every cultivation
//! patch draws from its own ChaCha8 stream derived from that seed and the
//! patch identity:
//!
//! ```text
//!                master seed
//!                    │
//!      ┌─────────────┼──────────────┬─────────────┐
//!      ▼             ▼              ▼             ▼
//!  layout (0)   L0 stream      R0 stream    ...  L(Nm-1), R(Nm-1)
//! ```
//!
//! Because streams are private, the order in which the scheduler advances
//! patches never changes the outcome of a run.
//!
//! # Example
//!
//! ```
//! use msd_env::{PatchId, SeededContext, Side, StreamContext};
//! use rand::Rng;
//!
//! let ctx = SeededContext::new(42);
//! let mut a = ctx.patch_stream(PatchId::new(Side::Left, 0));
//! let mut b = ctx.patch_stream(PatchId::new(Side::Left, 0));
//! assert_eq!(a.gen::<u64>(), b.gen::<u64>());
//! ```

mod context;
mod entropy_impl;
mod seeded;
mod types;

pub use context::{derive_stream_seed, StreamContext, LAYOUT_STREAM};
pub use entropy_impl::EntropyContext;
pub use seeded::SeededContext;
pub use types::{PatchId, Side};
