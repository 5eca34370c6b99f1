//! Core replicated sequence implementation.
//!
//! This module contains the `ReplicatedSequence` struct, the single authoritative copy of
//! the document. Edits are positional: an insert places a new element at an index and
//! shifts the tail right, a delete removes the element at an index.

use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

use crate::crdt::element::Element;
use crate::crdt::types::{LogicalClock, SequenceNumber};
use crate::error::SequenceError;

/// State guarded by the sequence lock. The clock and the list always move together.
#[derive(Debug, Default)]
struct Inner {
    elements: Vec<Element>,
    clock: LogicalClock,
}

/// The authoritative, lock-protected document sequence.
///
/// # Design
///
/// - One `parking_lot::Mutex` guards both the element list and the logical clock
/// - Every method takes the lock for the duration of the call and never across `.await`
/// - Readers get owned snapshots, the underlying list is never exposed by reference
/// - Out-of-range inserts are reported as errors; out-of-range deletes are no-ops
#[derive(Debug, Default)]
pub struct ReplicatedSequence {
    inner: Mutex<Inner>,
}

impl ReplicatedSequence {
    /// Creates an empty sequence whose clock has not ticked yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a sequence by appending each value in order.
    ///
    /// Clock values are assigned afresh starting at 1; metadata from any earlier
    /// incarnation of the document is not recovered.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sequence = Self::new();
        sequence.load_from_values(values);
        sequence
    }

    /// Replaces the current contents with `values`, appended in order.
    ///
    /// The logical clock restarts, so the rebuilt elements carry sequence numbers
    /// `1..=values.len()`.
    pub fn load_from_values<I, S>(&self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.inner.lock();
        *inner = Inner::default();
        for value in values {
            let sequence = inner.clock.tick();
            inner.elements.push(Element::new(value, sequence));
        }
        debug!(len = inner.elements.len(), "Loaded sequence from values");
    }

    /// Inserts `value` so that it becomes the element at `position`.
    ///
    /// # Arguments
    ///
    /// * `position` - Target index, must satisfy `position <= len`
    /// * `value` - The content unit to insert
    ///
    /// # Returns
    ///
    /// * `Ok(SequenceNumber)` - The clock value assigned to the new element
    /// * `Err(SequenceError::PositionOutOfBounds)` - Nothing was changed, the clock did not advance
    pub fn insert(
        &self,
        position: usize,
        value: impl Into<String>,
    ) -> Result<SequenceNumber, SequenceError> {
        let mut inner = self.inner.lock();
        let len = inner.elements.len();
        if position > len {
            return Err(SequenceError::PositionOutOfBounds {
                position: i64::try_from(position).unwrap_or(i64::MAX),
                len,
            });
        }

        let sequence = inner.clock.tick();
        let element = Element::new(value, sequence);
        debug!("Inserted {:?} at position {} ({})", element.value, position, sequence);
        inner.elements.insert(position, element);
        Ok(sequence)
    }

    /// Removes the element at `position`.
    ///
    /// Returns the removed element, or `None` when `position` is outside `0..len`; in
    /// that case the call is a silent no-op.
    pub fn delete(&self, position: usize) -> Option<Element> {
        let mut inner = self.inner.lock();
        if position >= inner.elements.len() {
            return None;
        }

        let removed = inner.elements.remove(position);
        debug!("Deleted {:?} from position {}", removed.value, position);
        Some(removed)
    }

    /// Returns a point-in-time snapshot of the element values in document order.
    pub fn document(&self) -> Vec<String> {
        self.inner
            .lock()
            .elements
            .iter()
            .map(|element| element.value.clone())
            .collect()
    }

    /// Returns every live element including its metadata (for debugging/testing).
    pub fn elements(&self) -> Vec<Element> {
        self.inner.lock().elements.clone()
    }

    /// Gets the number of live elements.
    pub fn len(&self) -> usize {
        self.inner.lock().elements.len()
    }

    /// Returns true if the document holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the last clock value handed out (0 for a fresh sequence).
    pub fn current_clock(&self) -> u64 {
        self.inner.lock().clock.current()
    }
}

impl fmt::Display for ReplicatedSequence {
    /// Writes the concatenated values, i.e. the visible text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        for element in &inner.elements {
            f.write_str(&element.value)?;
        }
        Ok(())
    }
}
