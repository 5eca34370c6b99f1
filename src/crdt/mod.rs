//! Replicated sequence implementation module.
//!
//! This module contains the authoritative document sequence and all its supporting
//! types. Convergence comes from every edit passing through one instance in arrival
//! order, not from merging diverged copies.

pub mod element;
pub mod rga;
pub mod types;

pub use element::Element;
pub use rga::ReplicatedSequence;
pub use types::{LogicalClock, SequenceNumber};
