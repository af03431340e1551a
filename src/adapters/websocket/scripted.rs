//! Scripted transport for testing.
//!
//! Plays the server side of every link the connection manager opens:
//! tests pull a [`ScriptedPeer`] per opened link, push frames or closes
//! through it, and assert on what the client sent.
//!
//! # Example
//!
//! ```ignore
//! let transport = Arc::new(ScriptedTransport::new());
//! let connection = ConnectionManager::spawn(transport.clone(), bus, decoder, policy);
//!
//! connection.connect(credential)?;
//! let peer = transport.next_peer().await.unwrap();
//! assert_eq!(peer.wait_for_sent(1).await[0], r#"{"type":"AUTH","userId":"u1"}"#);
//!
//! peer.deliver(r#"{"type":"NEW_ORDER","order":{...}}"#).await;
//! peer.close(CloseCode::ABNORMAL).await;
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::domain::realtime::CloseCode;
use crate::ports::{FrameSink, Transport, TransportError, TransportEvent, TransportLink};

const EVENT_BUFFER: usize = 64;

/// Transport whose links are driven by the test.
pub struct ScriptedTransport {
    failures: Mutex<VecDeque<String>>,
    attempts: AtomicUsize,
    gate: watch::Sender<bool>,
    peers_tx: mpsc::UnboundedSender<ScriptedPeer>,
    peers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ScriptedPeer>>,
}

impl ScriptedTransport {
    /// Creates a transport whose opens succeed immediately.
    pub fn new() -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            failures: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
            gate: watch::Sender::new(true),
            peers_tx,
            peers_rx: tokio::sync::Mutex::new(peers_rx),
        }
    }

    /// Makes the next `count` opens fail with `reason`.
    pub fn fail_next_opens(&self, count: usize, reason: impl Into<String>) {
        let reason = reason.into();
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.extend(std::iter::repeat(reason).take(count));
    }

    /// Holds every open pending until [`release_opens`](Self::release_opens).
    pub fn hold_opens(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_opens(&self) {
        self.gate.send_replace(true);
    }

    /// Number of times `open` has been called, including failed and held ones.
    pub fn open_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Waits for the next successfully opened link.
    pub async fn next_peer(&self) -> Option<ScriptedPeer> {
        self.peers_rx.lock().await.recv().await
    }

    /// Returns an already opened link without waiting.
    pub fn try_next_peer(&self) -> Option<ScriptedPeer> {
        self.peers_rx.try_lock().ok()?.try_recv().ok()
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self) -> Result<TransportLink, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let released = self.gate.subscribe().wait_for(|open| *open).await.is_ok();
        if !released {
            return Err(TransportError::Connect("transport dropped".to_string()));
        }

        let failure = self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(reason) = failure {
            return Err(TransportError::Connect(reason));
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (sent_count, _) = watch::channel(0usize);
        let shared = Arc::new(PeerShared {
            sent: Mutex::new(Vec::new()),
            sent_count,
            closed_with: Mutex::new(None),
            fail_sends: AtomicBool::new(false),
        });

        let peer = ScriptedPeer {
            events: Arc::new(Mutex::new(Some(events_tx))),
            shared: shared.clone(),
        };
        let _ = self.peers_tx.send(peer);

        Ok(TransportLink::new(Box::new(ScriptedSink { shared }), events_rx))
    }
}

struct PeerShared {
    sent: Mutex<Vec<String>>,
    sent_count: watch::Sender<usize>,
    closed_with: Mutex<Option<CloseCode>>,
    fail_sends: AtomicBool,
}

/// Server side of one scripted link.
#[derive(Clone)]
pub struct ScriptedPeer {
    events: Arc<Mutex<Option<mpsc::Sender<TransportEvent>>>>,
    shared: Arc<PeerShared>,
}

impl ScriptedPeer {
    async fn emit(&self, event: TransportEvent) {
        let sender = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    /// Pushes one text frame to the client.
    pub async fn deliver(&self, text: impl Into<String>) {
        self.emit(TransportEvent::Frame(text.into())).await;
    }

    /// Reports a transport fault to the client.
    pub async fn fail(&self, reason: impl Into<String>) {
        self.emit(TransportEvent::Error(reason.into())).await;
    }

    /// Closes the link from the server side with `code`.
    pub async fn close(&self, code: CloseCode) {
        self.emit(TransportEvent::Closed(code)).await;
    }

    /// Ends the event stream without a close frame.
    pub fn hang_up(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Makes every further client send fail.
    pub fn fail_sends(&self) {
        self.shared.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Frames the client has written so far.
    pub fn sent(&self) -> Vec<String> {
        self.shared
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Waits until the client has written at least `count` frames.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<String> {
        let mut sent_count = self.shared.sent_count.subscribe();
        let _ = sent_count.wait_for(|sent| *sent >= count).await;
        self.sent()
    }

    /// Close code the client sent, if it closed the link.
    pub fn closed_with(&self) -> Option<CloseCode> {
        *self
            .shared
            .closed_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

struct ScriptedSink {
    shared: Arc<PeerShared>,
}

#[async_trait]
impl FrameSink for ScriptedSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed_code().is_some() {
            return Err(TransportError::Closed);
        }
        if self.shared.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send("scripted send failure".to_string()));
        }

        let count = {
            let mut sent = self.shared.sent.lock().unwrap_or_else(PoisonError::into_inner);
            sent.push(text);
            sent.len()
        };
        self.shared.sent_count.send_replace(count);
        Ok(())
    }

    async fn close(&mut self, code: CloseCode) -> Result<(), TransportError> {
        *self
            .shared
            .closed_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(code);
        Ok(())
    }
}

impl ScriptedSink {
    fn closed_code(&self) -> Option<CloseCode> {
        *self
            .shared
            .closed_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
