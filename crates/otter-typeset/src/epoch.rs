//! Checkpoint epochs
//!
//! The recorder rotates the epoch at chunk boundaries. The epoch alternates
//! between two states while a generation counter keeps increasing; records
//! emitted in one generation are only assumed present by later checkpoints of
//! the same generation.

use serde::Serialize;

/// Alternating epoch marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Epoch {
    /// Current alternating bit
    pub bit: bool,
    /// Number of rotations so far
    pub generation: u64,
}

impl Epoch {
    /// The marker the previous epoch had
    pub fn previous(self) -> Epoch {
        Epoch {
            bit: !self.bit,
            generation: self.generation.saturating_sub(1),
        }
    }
}

/// Owns the current epoch
#[derive(Debug, Default)]
pub struct EpochCounter {
    generation: u64,
}

impl EpochCounter {
    /// Start at generation 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch
    pub fn current(&self) -> Epoch {
        Epoch {
            bit: self.generation & 1 == 1,
            generation: self.generation,
        }
    }

    /// Advance to the next epoch, returning it
    pub fn rotate(&mut self) -> Epoch {
        self.generation += 1;
        self.current()
    }
}
