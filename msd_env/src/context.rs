//! Core randomness context trait for the simulator.

use crate::types::PatchId;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Stream extension reserved for the shared layout-model stream.
///
/// Patch streams start at extension 1, see [`PatchId::stream_extension`].
pub const LAYOUT_STREAM: u64 = 0;

/// Mixes a master seed with a stream extension.
///
/// Derived as `master * golden_ratio + extension * prime` so that adding
/// more patches never perturbs the streams of existing ones.
pub fn derive_stream_seed(master_seed: u64, extension: u64) -> u64 {
    master_seed
        .wrapping_mul(0x9e3779b97f4a7c15) // Golden ratio prime
        .wrapping_add(extension.wrapping_mul(0x517cc1b727220a95))
}

/// The central interface for randomness.
///
/// # Implementations
///
/// - **Reproducible**: `SeededContext` - master seed supplied by the caller
/// - **Fresh**: `EntropyContext` - master seed drawn once from OS entropy
///
/// # Determinism
///
/// Both implementations hand out streams that depend only on the master
/// seed and the requested extension. Reporting [`StreamContext::seed`] is
/// therefore enough to replay any run.
pub trait StreamContext {
    /// Returns the master seed every stream is derived from.
    fn seed(&self) -> u64;

    /// Creates an independent stream for the given extension.
    ///
    /// Calling this twice with the same extension yields two generators
    /// that produce identical draws.
    fn stream(&self, extension: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(derive_stream_seed(self.seed(), extension))
    }

    /// Creates the private stream of one cultivation patch.
    fn patch_stream(&self, patch: PatchId) -> ChaCha8Rng {
        self.stream(patch.stream_extension())
    }

    /// Creates the single stream used by the tick-driven layout model.
    fn layout_stream(&self) -> ChaCha8Rng {
        self.stream(LAYOUT_STREAM)
    }
}
