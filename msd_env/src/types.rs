//! Identity types shared by the engine and the harness.

use serde::{Deserialize, Serialize};

/// Which half of the distillation layout a patch feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Both sides, in the order patches are laid out.
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// Returns 0 for LEFT and 1 for RIGHT.
    pub fn as_index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "L"),
            Side::Right => write!(f, "R"),
        }
    }
}

/// Identity of one cultivation patch.
///
/// Patches on the same side are interchangeable; the index only names the
/// patch and selects its random stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatchId {
    pub side: Side,
    pub index: usize,
}

impl PatchId {
    /// Creates a PatchId.
    pub fn new(side: Side, index: usize) -> Self {
        Self { side, index }
    }

    /// Returns the stream extension for this patch.
    ///
    /// Always >= 1; extension 0 belongs to the layout stream.
    pub fn stream_extension(&self) -> u64 {
        (self.index as u64) * 2 + self.side.as_index() as u64 + 1
    }
}

impl std::fmt::Display for PatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.side, self.index)
    }
}
