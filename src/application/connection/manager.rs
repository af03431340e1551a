//! ConnectionManager - Owns the one shared session socket.
//!
//! The manager runs as a single task that owns every piece of connection
//! state: lifecycle state, outbound queue, session identity, the current
//! link and the reconnect timer. Callers talk to it through a cloneable
//! [`ConnectionHandle`]; commands are processed strictly in arrival order,
//! interleaved with transport events, so no state is ever shared.
//!
//! ```text
//!  ConnectionHandle ──commands──▶ ┌──────────────────────┐ ──publish──▶ MessageBus
//!                                 │  ConnectionManager   │
//!  Transport ──frames/close────▶  │  (single task)       │ ──text────▶ FrameSink
//!                                 └──────────────────────┘
//! ```

use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;

use crate::domain::foundation::{
    AuthError, Credential, DomainError, ErrorCode, SessionIdentity, StateMachine, UserId,
};
use crate::domain::realtime::{
    Admission, BusMessage, CloseCode, ConnectionEvent, ConnectionState, IdentityFilter,
    InboundMessage, OutboundFrame,
};
use crate::ports::{
    CredentialDecoder, MessagePublisher, Transport, TransportError, TransportEvent, TransportLink,
};

use super::reconnect_policy::ReconnectPolicy;

/// Errors returned by [`ConnectionHandle`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The credential could not be decoded into an identity.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The manager task is gone.
    #[error("Connection manager has stopped")]
    Stopped,
}

impl From<ConnectionError> for DomainError {
    fn from(err: ConnectionError) -> Self {
        let code = match &err {
            ConnectionError::Auth(_) => ErrorCode::Unauthorized,
            ConnectionError::Stopped => ErrorCode::InternalError,
        };
        DomainError::new(code, err.to_string())
    }
}

/// Point-in-time view of the manager's internals.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    /// Outbound frames waiting for the next open link.
    pub queued: usize,
    pub reconnect_scheduled: bool,
    /// Reconnect attempts since the last successful open.
    pub reconnect_attempt: u32,
    pub identity: Option<UserId>,
}

enum Command {
    Connect(Credential),
    Send(OutboundFrame),
    Disconnect,
    Inspect(oneshot::Sender<ConnectionSnapshot>),
}

enum Step {
    Command(Option<Command>),
    Opened(Result<TransportLink, TransportError>),
    Transport(Option<TransportEvent>),
    ReconnectDue,
}

/// Cloneable front door to the connection manager task.
///
/// The task stops once every handle is dropped, closing any open link
/// with a normal-closure code.
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    decoder: Arc<dyn CredentialDecoder>,
}

impl ConnectionHandle {
    /// Connects with `credential`.
    ///
    /// No-op when already connected or connecting with the same credential.
    /// A different credential tears down the current link and reconnects.
    /// Fails fast if the credential carries no decodable identity.
    pub fn connect(&self, credential: Credential) -> Result<(), ConnectionError> {
        self.identify(&credential)?;
        self.commands
            .send(Command::Connect(credential))
            .map_err(|_| ConnectionError::Stopped)
    }

    /// Decodes the identity behind `credential` without touching the link.
    pub fn identify(&self, credential: &Credential) -> Result<SessionIdentity, ConnectionError> {
        Ok(self.decoder.decode(credential)?)
    }

    /// Sends `frame` now if connected, otherwise queues it for the next open.
    ///
    /// Never fails: transport faults surface as bus events, not here.
    pub fn send(&self, frame: OutboundFrame) {
        if self.commands.send(Command::Send(frame)).is_err() {
            tracing::warn!("Dropping outbound frame: connection manager has stopped");
        }
    }

    /// Closes the connection normally, cancels any reconnect and clears the
    /// outbound queue and identity.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Receiver that observes every state change.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Snapshot taken after every command sent before this call is applied.
    pub async fn snapshot(&self) -> Result<ConnectionSnapshot, ConnectionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Inspect(reply))
            .map_err(|_| ConnectionError::Stopped)?;
        response.await.map_err(|_| ConnectionError::Stopped)
    }
}

/// The connection manager task.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    bus: Arc<dyn MessagePublisher<BusMessage>>,
    decoder: Arc<dyn CredentialDecoder>,
    filter: IdentityFilter,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    queue: VecDeque<OutboundFrame>,
    credential: Option<Credential>,
    identity: Option<SessionIdentity>,
    link: Option<TransportLink>,
    opening: Option<JoinHandle<Result<TransportLink, TransportError>>>,
    reconnect: Option<Pin<Box<Sleep>>>,
    attempt: u32,
}

impl ConnectionManager {
    /// Spawns the manager on the current runtime and returns its handle.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        bus: Arc<dyn MessagePublisher<BusMessage>>,
        decoder: Arc<dyn CredentialDecoder>,
        policy: ReconnectPolicy,
    ) -> ConnectionHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let manager = Self {
            transport,
            bus,
            decoder: decoder.clone(),
            filter: IdentityFilter::new(),
            policy,
            state: state_tx,
            queue: VecDeque::new(),
            credential: None,
            identity: None,
            link: None,
            opening: None,
            reconnect: None,
            attempt: 0,
        };
        tokio::spawn(manager.run(commands_rx));

        ConnectionHandle {
            commands: commands_tx,
            state: state_rx,
            decoder,
        }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let step = tokio::select! {
                command = commands.recv() => Step::Command(command),
                opened = next_opened(&mut self.opening) => Step::Opened(opened),
                event = next_event(&mut self.link) => Step::Transport(event),
                () = reconnect_due(&mut self.reconnect) => Step::ReconnectDue,
            };

            match step {
                Step::Command(Some(command)) => self.handle_command(command).await,
                Step::Command(None) => break,
                Step::Opened(result) => self.handle_opened(result).await,
                Step::Transport(Some(event)) => self.handle_transport_event(event).await,
                Step::Transport(None) => self.handle_closed(CloseCode::ABNORMAL),
                Step::ReconnectDue => self.handle_reconnect_due(),
            }
        }

        self.shutdown().await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(credential) => self.connect(credential).await,
            Command::Send(frame) => {
                self.queue.push_back(frame);
                if self.current_state().is_connected() {
                    self.flush().await;
                }
            }
            Command::Disconnect => self.disconnect().await,
            Command::Inspect(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn connect(&mut self, credential: Credential) {
        let state = self.current_state();
        let same_credential = self.credential.as_ref() == Some(&credential);

        if same_credential && state != ConnectionState::Disconnected {
            tracing::debug!(%state, "Connect ignored: already active on this credential");
            return;
        }

        self.reconnect = None;
        self.attempt = 0;

        if state != ConnectionState::Disconnected {
            tracing::info!("Credential changed, replacing the session link");
            self.abort_opening();
            self.close_link(CloseCode::NORMAL).await;
            self.identity = None;
            self.set_state(ConnectionState::Disconnected);
            self.publish(ConnectionEvent::Disconnected {
                code: CloseCode::NORMAL,
                will_reconnect: true,
            });
        }

        self.credential = Some(credential);
        self.begin_open();
    }

    async fn disconnect(&mut self) {
        let was = self.current_state();

        self.reconnect = None;
        self.attempt = 0;
        self.abort_opening();
        self.close_link(CloseCode::NORMAL).await;
        self.queue.clear();
        self.identity = None;
        self.credential = None;
        self.set_state(ConnectionState::Disconnected);

        if was != ConnectionState::Disconnected {
            tracing::info!("Disconnected on request");
            self.publish(ConnectionEvent::Disconnected {
                code: CloseCode::NORMAL,
                will_reconnect: false,
            });
        }
    }

    fn begin_open(&mut self) {
        self.set_state(ConnectionState::Connecting);
        let transport = self.transport.clone();
        self.opening = Some(tokio::spawn(async move { transport.open().await }));
    }

    async fn handle_opened(&mut self, result: Result<TransportLink, TransportError>) {
        let mut link = match result {
            Ok(link) => link,
            Err(error) => {
                tracing::warn!(error = %error, "Transport failed to open");
                self.publish(ConnectionEvent::Error {
                    message: error.to_string(),
                });
                self.set_state(ConnectionState::Disconnected);
                self.close_and_maybe_reconnect(CloseCode::ABNORMAL);
                return;
            }
        };

        let identity = match self.credential.as_ref().map(|c| self.decoder.decode(c)) {
            Some(Ok(identity)) => identity,
            Some(Err(error)) => {
                tracing::warn!(error = %error, "Credential no longer decodes, giving up");
                let _ = link.sink.close(CloseCode::NORMAL).await;
                self.credential = None;
                self.publish(ConnectionEvent::Error {
                    message: error.to_string(),
                });
                self.set_state(ConnectionState::Disconnected);
                self.publish(ConnectionEvent::Disconnected {
                    code: CloseCode::NORMAL,
                    will_reconnect: false,
                });
                return;
            }
            None => {
                let _ = link.sink.close(CloseCode::NORMAL).await;
                self.set_state(ConnectionState::Disconnected);
                return;
            }
        };

        let auth = OutboundFrame::auth(identity.id.clone()).encode();
        if let Err(error) = link.sink.send_text(auth).await {
            tracing::warn!(error = %error, "Failed to send AUTH");
            self.publish(ConnectionEvent::Error {
                message: error.to_string(),
            });
            self.set_state(ConnectionState::Disconnected);
            self.close_and_maybe_reconnect(CloseCode::ABNORMAL);
            return;
        }

        tracing::info!(identity = %identity.id, queued = self.queue.len(), "Connected");

        self.link = Some(link);
        self.attempt = 0;
        self.identity = Some(identity.clone());
        self.set_state(ConnectionState::Connected);
        self.publish(ConnectionEvent::Connected {
            identity: identity.id,
        });
        self.flush().await;
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(text) => self.handle_frame(&text),
            TransportEvent::Error(message) => {
                tracing::warn!(error = %message, "Transport error");
                self.publish(ConnectionEvent::Error { message });
            }
            TransportEvent::Closed(code) => self.handle_closed(code),
        }
    }

    fn handle_frame(&mut self, text: &str) {
        let message = match InboundMessage::decode(text) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(error = %error, "Dropping undecodable frame");
                return;
            }
        };

        if self.filter.admit(self.identity.as_ref(), &message) == Admission::Drop {
            tracing::debug!(kind = message.kind(), "Dropping frame addressed elsewhere");
            return;
        }

        if let InboundMessage::AuthAck(ack) = &message {
            tracing::debug!(user_id = ?ack.user_id, "Server acknowledged AUTH");
        }

        let report = self.bus.publish(&BusMessage::Inbound(message));
        if report.failed > 0 {
            tracing::debug!(failed = report.failed, "Some subscribers failed on inbound frame");
        }
    }

    fn handle_closed(&mut self, code: CloseCode) {
        self.link = None;
        self.identity = None;
        self.set_state(ConnectionState::Disconnected);
        self.close_and_maybe_reconnect(code);
    }

    fn close_and_maybe_reconnect(&mut self, code: CloseCode) {
        let will_reconnect = !code.is_normal() && self.credential.is_some();

        tracing::info!(%code, will_reconnect, "Connection closed");
        self.publish(ConnectionEvent::Disconnected {
            code,
            will_reconnect,
        });

        if will_reconnect {
            self.schedule_reconnect();
        }
    }

    fn schedule_reconnect(&mut self) {
        let delay = self.policy.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        tracing::debug!(
            delay_ms = delay.as_millis() as u64,
            attempt = self.attempt,
            "Reconnect scheduled"
        );
        self.reconnect = Some(Box::pin(tokio::time::sleep(delay)));
    }

    fn handle_reconnect_due(&mut self) {
        if self.credential.is_some() && self.current_state() == ConnectionState::Disconnected {
            self.begin_open();
        }
    }

    /// Drains the queue in FIFO order. A failed send puts the frame back at
    /// the front and takes the abnormal-close path.
    async fn flush(&mut self) {
        while let Some(frame) = self.queue.pop_front() {
            let Some(link) = self.link.as_mut() else {
                self.queue.push_front(frame);
                return;
            };

            if let Err(error) = link.sink.send_text(frame.encode()).await {
                tracing::warn!(error = %error, kind = ?frame.kind(), "Send failed, requeueing");
                self.queue.push_front(frame);
                self.publish(ConnectionEvent::Error {
                    message: error.to_string(),
                });
                self.handle_closed(CloseCode::ABNORMAL);
                return;
            }
        }
    }

    async fn close_link(&mut self, code: CloseCode) {
        if let Some(mut link) = self.link.take() {
            if let Err(error) = link.sink.close(code).await {
                tracing::debug!(error = %error, "Close frame not delivered");
            }
        }
    }

    fn abort_opening(&mut self) {
        if let Some(opening) = self.opening.take() {
            opening.abort();
        }
    }

    async fn shutdown(&mut self) {
        tracing::debug!("All connection handles dropped, shutting down");
        self.reconnect = None;
        self.abort_opening();
        self.close_link(CloseCode::NORMAL).await;
        self.set_state(ConnectionState::Disconnected);
    }

    fn publish(&self, event: ConnectionEvent) {
        self.bus.publish(&BusMessage::Connection(event));
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if !current.can_transition_to(&next) {
                tracing::warn!(from = %current, to = %next, "Unexpected connection state transition");
            }
            tracing::debug!(from = %current, to = %next, "Connection state changed");
            *current = next;
            true
        });
    }

    fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            state: self.current_state(),
            queued: self.queue.len(),
            reconnect_scheduled: self.reconnect.is_some(),
            reconnect_attempt: self.attempt,
            identity: self.identity.as_ref().map(|identity| identity.id.clone()),
        }
    }
}

async fn next_opened(
    opening: &mut Option<JoinHandle<Result<TransportLink, TransportError>>>,
) -> Result<TransportLink, TransportError> {
    let Some(handle) = opening.as_mut() else {
        return pending().await;
    };
    let joined = handle.await;
    *opening = None;
    joined.unwrap_or_else(|e| Err(TransportError::Connect(e.to_string())))
}

async fn next_event(link: &mut Option<TransportLink>) -> Option<TransportEvent> {
    match link.as_mut() {
        Some(link) => link.events.recv().await,
        None => pending().await,
    }
}

async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    let Some(sleep) = timer.as_mut() else {
        return pending().await;
    };
    sleep.as_mut().await;
    *timer = None;
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;
