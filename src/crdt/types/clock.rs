//! Logical clock for numbering insertions.
//!
//! The clock lives inside the sequence's locked state, so ticking it needs no atomics:
//! whoever holds the sequence lock owns the clock for the duration of the edit.

use crate::crdt::types::sequence_number::SequenceNumber;

/// A monotonically increasing insertion counter. The default clock's first tick yields 1.
#[derive(Debug, Default)]
pub struct LogicalClock {
    counter: u64,
}

impl LogicalClock {
    /// Advances the clock and returns the new value
    pub fn tick(&mut self) -> SequenceNumber {
        self.counter += 1;
        SequenceNumber(self.counter)
    }

    /// Gets the last value handed out, or 0 if the clock never ticked
    pub fn current(&self) -> u64 {
        self.counter
    }
}
