//! Session management for collaborative editing.
//!
//! The `SessionManager` owns the set of connected participants and the one authoritative
//! `ReplicatedSequence`. Every inbound operation is applied, persisted and then broadcast
//! to all participants, so every participant converges on the order the server applied.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::crdt::ReplicatedSequence;
use crate::error::{SequenceError, StoreError, TransportError};
use crate::session::message::{Operation, OperationMessage, encode_document};
use crate::session::transport::{CloseReason, Inbound, Transport};
use crate::store::SnapshotStore;

/// Process-unique identifier of a connected participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Lifecycle of a session: `Connecting -> Active -> Closed`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closed,
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Applied to the document, persisted and broadcast.
    Applied,
    /// Decoded, but its type is not one the server acts on.
    Ignored,
    /// Malformed or out of range; dropped.
    Rejected,
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<SessionId>,
    pub dropped: Vec<SessionId>,
}

/// Tunables for the session manager.
#[derive(Debug, Clone, Default)]
pub struct ManagerConfig {
    /// Upper bound on a single write to one participant. `None` waits indefinitely.
    pub write_timeout: Option<Duration>,
}

struct Session {
    transport: Arc<dyn Transport>,
    state: SessionState,
}

/// Coordinates participants around the single authoritative document.
pub struct SessionManager {
    sequence: ReplicatedSequence,
    store: Arc<dyn SnapshotStore>,
    config: ManagerConfig,
    sessions: Mutex<HashMap<SessionId, Session>>,
    next_session: AtomicU64,
    /// Serializes every delivery (initial snapshot and broadcasts) so participants
    /// observe snapshots in the order they were materialized.
    delivery: AsyncMutex<()>,
    /// Serializes snapshot saves; the document is read after acquiring it.
    persistence: AsyncMutex<()>,
}

impl SessionManager {
    pub fn new(
        sequence: ReplicatedSequence,
        store: Arc<dyn SnapshotStore>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            sequence,
            store,
            config,
            sessions: Mutex::new(HashMap::new()),
            next_session: AtomicU64::new(0),
            delivery: AsyncMutex::new(()),
            persistence: AsyncMutex::new(()),
        }
    }

    /// Rebuilds the document from the store's last snapshot, or starts empty if there is none.
    pub async fn restore(
        store: Arc<dyn SnapshotStore>,
        config: ManagerConfig,
    ) -> Result<Self, StoreError> {
        let sequence = match store.load().await? {
            Some(values) => ReplicatedSequence::from_values(values),
            None => ReplicatedSequence::new(),
        };
        info!("Restored document with {} elements", sequence.len());
        Ok(Self::new(sequence, store, config))
    }

    /// Current document snapshot.
    pub fn document(&self) -> Vec<String> {
        self.sequence.document()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Lifecycle state of `id`. Sessions no longer in the registry are `Closed`.
    pub fn state(&self, id: SessionId) -> SessionState {
        self.sessions
            .lock()
            .get(&id)
            .map_or(SessionState::Closed, |session| session.state)
    }

    fn is_active(&self, id: SessionId) -> bool {
        self.state(id) == SessionState::Active
    }

    /// Adds a participant and sends it the current document.
    ///
    /// If the initial send fails the session is removed again, its transport closed and
    /// the error returned to the caller; other sessions never see it.
    pub async fn register(
        &self,
        transport: Arc<dyn Transport>,
    ) -> Result<SessionId, TransportError> {
        let id = SessionId(self.next_session.fetch_add(1, Ordering::SeqCst) + 1);

        let _delivery = self.delivery.lock().await;
        self.sessions.lock().insert(
            id,
            Session {
                transport: Arc::clone(&transport),
                state: SessionState::Connecting,
            },
        );

        let result = match encode_document(&self.sequence.document()) {
            Ok(frame) => self.write(transport.as_ref(), frame).await,
            Err(e) => Err(TransportError::Io(e.to_string())),
        };

        match result {
            Ok(()) => {
                if let Some(session) = self.sessions.lock().get_mut(&id) {
                    session.state = SessionState::Active;
                }
                info!("Session {} established", id);
                Ok(id)
            }
            Err(e) => {
                self.sessions.lock().remove(&id);
                warn!("Failed to send initial document to {}: {}", id, e);
                transport
                    .close(CloseReason::error("failed to send initial document"))
                    .await;
                Err(e)
            }
        }
    }

    /// Removes a session from the live set. Returns false if it was already gone.
    pub fn deregister(&self, id: SessionId) -> bool {
        let removed = self.sessions.lock().remove(&id).is_some();
        if removed {
            info!("Session {} ended", id);
        }
        removed
    }

    /// Decodes and applies one raw inbound message.
    ///
    /// Applied operations are persisted and broadcast before this returns. Nothing is
    /// ever sent back to the submitter other than that broadcast.
    pub async fn handle_message(&self, raw: &[u8]) -> Disposition {
        let message = match OperationMessage::decode(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping malformed message: {}", e);
                return Disposition::Rejected;
            }
        };

        match self.apply(message.into_operation()) {
            Ok(Disposition::Applied) => {}
            Ok(other) => return other,
            Err(e) => {
                warn!("Dropping operation: {}", e);
                return Disposition::Rejected;
            }
        }

        self.persist().await;
        self.broadcast().await;
        Disposition::Applied
    }

    fn apply(&self, operation: Operation) -> Result<Disposition, SequenceError> {
        match operation {
            Operation::Insert { position, value } => {
                let index = usize::try_from(position).map_err(|_| {
                    SequenceError::PositionOutOfBounds {
                        position,
                        len: self.sequence.len(),
                    }
                })?;
                self.sequence.insert(index, value)?;
            }
            Operation::Delete { position } => {
                // Negative positions are out of range, so the delete is a no-op.
                if let Ok(index) = usize::try_from(position) {
                    self.sequence.delete(index);
                }
            }
            Operation::Unknown(op_type) => {
                warn!("Unknown operation type '{}'", op_type);
                return Ok(Disposition::Ignored);
            }
        }
        Ok(Disposition::Applied)
    }

    async fn persist(&self) {
        let _persistence = self.persistence.lock().await;
        let document = self.sequence.document();
        if let Err(e) = self.store.save(&document).await {
            error!("Error saving document: {}", e);
        }
    }

    /// Sends the current document to every active session.
    ///
    /// A session whose write fails is removed and closed; delivery to the rest continues.
    pub async fn broadcast(&self) -> BroadcastReport {
        let _delivery = self.delivery.lock().await;

        let frame = match encode_document(&self.sequence.document()) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode document: {}", e);
                return BroadcastReport::default();
            }
        };

        let targets: Vec<(SessionId, Arc<dyn Transport>)> = self
            .sessions
            .lock()
            .iter()
            .filter(|(_, session)| session.state == SessionState::Active)
            .map(|(id, session)| (*id, Arc::clone(&session.transport)))
            .collect();

        let mut report = BroadcastReport::default();
        for (id, transport) in targets {
            match self.write(transport.as_ref(), frame.clone()).await {
                Ok(()) => report.delivered.push(id),
                Err(e) => {
                    error!("Error broadcasting to {}: {}", id, e);
                    self.sessions.lock().remove(&id);
                    transport.close(CloseReason::error("error broadcasting")).await;
                    report.dropped.push(id);
                }
            }
        }

        debug!(
            delivered = report.delivered.len(),
            dropped = report.dropped.len(),
            "Broadcast complete"
        );
        report
    }

    async fn write(&self, transport: &dyn Transport, frame: String) -> Result<(), TransportError> {
        match self.config.write_timeout {
            Some(limit) => tokio::time::timeout(limit, transport.send(frame))
                .await
                .map_err(|_| TransportError::Timeout(limit))?,
            None => transport.send(frame).await,
        }
    }

    /// Runs one participant from connect to disconnect.
    ///
    /// Registers the transport, applies every inbound message in order, and deregisters
    /// when the stream ends, reports an error, or the session was dropped by a broadcast.
    pub async fn serve<S>(&self, transport: Arc<dyn Transport>, mut inbound: S)
    where
        S: Stream<Item = Result<Inbound, TransportError>> + Unpin + Send,
    {
        let id = match self.register(Arc::clone(&transport)).await {
            Ok(id) => id,
            Err(_) => return,
        };

        async {
            while let Some(next) = inbound.next().await {
                if !self.is_active(id) {
                    debug!("Session no longer active, stopping reads");
                    break;
                }
                match next {
                    Ok(Inbound::Text(text)) => {
                        debug!("Received: {}", text);
                        self.handle_message(text.as_bytes()).await;
                    }
                    Ok(Inbound::Binary(data)) => {
                        debug!("Received {} binary bytes", data.len());
                        self.handle_message(&data).await;
                    }
                    Ok(Inbound::Close) => {
                        info!("Closed by client");
                        break;
                    }
                    Err(e) => {
                        warn!("Read error: {}", e);
                        break;
                    }
                }
            }
        }
        .instrument(info_span!("session", session_id = %id))
        .await;

        if self.deregister(id) {
            transport.close(CloseReason::normal()).await;
        }
    }
}
