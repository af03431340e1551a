//! Transport port - Interface for the raw bidirectional text channel.
//!
//! The connection manager owns lifecycle, queueing and reconnection; a
//! transport only knows how to open one link and move text frames over it.
//! Adapters: WebSocket (production), scripted (tests).

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::realtime::CloseCode;

/// Something that happened on an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One text frame from the server.
    Frame(String),

    /// Transport fault. A `Closed` event (or end of stream) follows.
    Error(String),

    /// The peer closed the link with this code.
    Closed(CloseCode),
}

/// Errors raised by transport operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Failed to open transport: {0}")]
    Connect(String),

    #[error("Failed to send frame: {0}")]
    Send(String),

    #[error("Transport is closed")]
    Closed,
}

/// Write half of an open link.
#[async_trait]
pub trait FrameSink: Send {
    /// Writes one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Sends a close frame with `code` and stops writing.
    async fn close(&mut self, code: CloseCode) -> Result<(), TransportError>;
}

/// An open link: a sink for outbound frames and a stream of inbound events.
///
/// When `events` yields `None` the link is gone without a close frame,
/// which counts as an abnormal closure.
pub struct TransportLink {
    pub sink: Box<dyn FrameSink>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl TransportLink {
    pub fn new(sink: Box<dyn FrameSink>, events: mpsc::Receiver<TransportEvent>) -> Self {
        Self { sink, events }
    }
}

/// Port for opening links to the session endpoint.
///
/// Each call opens a fresh link; callers must not keep two open at once.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self) -> Result<TransportLink, TransportError>;
}
