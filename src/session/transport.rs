//! Transport abstraction for connected participants.
//!
//! The session manager only needs to push frames to a participant and close its
//! connection. Reading is modelled separately as a stream of [`Inbound`] events that
//! the per-participant worker drains.

use std::borrow::Cow;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Close code for an orderly shutdown.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code used when the server gives up on a participant.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// One event read from a participant's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

/// Why a transport is being closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: Cow<'static, str>,
}

impl CloseReason {
    pub fn normal() -> Self {
        Self {
            code: CLOSE_NORMAL,
            reason: Cow::Borrowed("closing"),
        }
    }

    pub fn error(reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: CLOSE_INTERNAL_ERROR,
            reason: reason.into(),
        }
    }
}

/// Outbound half of a participant's connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Writes one complete message.
    async fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Closes the connection. Closing an already closed transport is not an error.
    async fn close(&self, reason: CloseReason);
}

/// What a [`ChannelTransport`] hands to its receiving end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(String),
    Closed(CloseReason),
}

/// In-process transport backed by an unbounded channel.
///
/// Sends fail with [`TransportError::Closed`] once the receiver is dropped.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        self.tx
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self, reason: CloseReason) {
        let _ = self.tx.send(Outbound::Closed(reason));
    }
}
