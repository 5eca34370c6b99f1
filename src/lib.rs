//! # RGA Collab - realtime collaborative plain-text documents
//!
//! A websocket service where participants submit character insert/delete operations
//! against one shared document and receive the resulting document after every change.
//!
//! ## Features
//!
//! - **Single authoritative sequence**: every edit is applied to one lock-protected
//!   `ReplicatedSequence` in arrival order, which is what makes participants converge
//! - **Broadcast fan-out**: each applied operation is sent to every connected participant,
//!   and a participant whose connection fails is dropped without affecting the rest
//! - **Durable snapshots**: the flattened document is saved after every edit and reloaded
//!   at startup
//!
//! ## Example
//!
//! ```rust
//! use rga_collab::ReplicatedSequence;
//!
//! let doc = ReplicatedSequence::new();
//! doc.insert(0, "H").unwrap();
//! doc.insert(1, "i").unwrap();
//! assert_eq!(doc.document(), vec!["H", "i"]);
//! println!("Content: {}", doc);
//! ```

pub mod config;
pub mod crdt;
pub mod error;
pub mod server;
pub mod session;
pub mod store;

pub use config::Config;
pub use crdt::{Element, LogicalClock, ReplicatedSequence, SequenceNumber};
pub use error::{DecodeError, SequenceError, StoreError, TransportError};
pub use session::{
    BroadcastReport, Disposition, ManagerConfig, SessionId, SessionManager, SessionState,
};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
