//! Participant sessions and the wire protocol they speak.
//!
//! This module contains the session manager that serializes all edits into the shared
//! document, the transport abstraction it writes through, and the message codec.

pub mod manager;
pub mod message;
pub mod transport;

pub use manager::{
    BroadcastReport, Disposition, ManagerConfig, SessionId, SessionManager, SessionState,
};
pub use message::{Operation, OperationMessage, encode_document};
pub use transport::{ChannelTransport, CloseReason, Inbound, Outbound, Transport};
