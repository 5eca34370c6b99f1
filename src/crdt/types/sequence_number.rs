//! Insertion-order sequence numbers.
//!
//! Every element inserted into a sequence is tagged with the clock value that was
//! current when it was created. The value identifies the insertion, it does not
//! determine where the element sits in the document.

use std::fmt;

/// Logical clock value assigned to an element at insertion.
///
/// Sequence numbers start at 1 and strictly increase with each successful insert on a
/// given sequence instance. They are never reused, even after the element is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Gets the raw counter value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
