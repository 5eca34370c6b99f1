//! Type definitions for the replicated sequence.
//!
//! This module contains the logical clock and the sequence numbers it hands out
//! to every inserted element.

pub mod clock;
pub mod sequence_number;

pub use clock::LogicalClock;
pub use sequence_number::SequenceNumber;
