//! Element definition for the replicated sequence.
//!
//! This module contains the Element struct which represents one atomic content unit
//! (usually a single character) of the document.

use chrono::{DateTime, Utc};

use crate::crdt::types::SequenceNumber;

/// Represents a single value within the sequence.
///
/// Each element contains:
/// - The value itself, one string token
/// - The sequence number handed out by the logical clock when it was inserted
/// - The wall-clock time of the insertion
///
/// Elements are immutable once created. Their position is implied by their index in the
/// owning sequence, and deletion removes them outright; there are no tombstones.
#[derive(Debug, Clone)]
pub struct Element {
    /// The content of this element
    pub value: String,
    /// Logical clock value at insertion
    pub sequence: SequenceNumber,
    /// When the element was inserted
    pub created_at: DateTime<Utc>,
}

impl Element {
    /// Creates a new element stamped with the current time.
    pub fn new(value: impl Into<String>, sequence: SequenceNumber) -> Self {
        Element {
            value: value.into(),
            sequence,
            created_at: Utc::now(),
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence && self.value == other.value
    }
}

impl Eq for Element {}
