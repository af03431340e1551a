//! WebSocket transport backed by tokio-tungstenite.
//!
//! Each `open` dials the configured URL, splits the stream, and spawns a
//! reader task that turns incoming frames into [`TransportEvent`]s. The
//! reader stops when the peer closes, on a protocol error, or when the
//! link's event receiver is dropped.

use std::borrow::Cow;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::domain::realtime::CloseCode;
use crate::ports::{FrameSink, Transport, TransportError, TransportEvent, TransportLink};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound events buffered per link before the reader applies backpressure.
const EVENT_BUFFER: usize = 256;

/// Production transport: one WebSocket per `open`.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
}

impl WebSocketTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self) -> Result<TransportLink, TransportError> {
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(url = %self.url, "WebSocket opened");

        let (sink, source) = stream.split();
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(read_frames(source, events_tx));

        Ok(TransportLink::new(Box::new(WebSocketSink { sink }), events_rx))
    }
}

async fn read_frames(mut source: SplitStream<WsStream>, events: mpsc::Sender<TransportEvent>) {
    loop {
        let next = tokio::select! {
            _ = events.closed() => return,
            next = source.next() => next,
        };

        let event = match next {
            Some(Ok(Message::Text(text))) => TransportEvent::Frame(text),
            Some(Ok(Message::Close(frame))) => {
                let code = frame
                    .map(|f| CloseCode::new(u16::from(f.code)))
                    .unwrap_or(CloseCode::NO_STATUS);
                let _ = events.send(TransportEvent::Closed(code)).await;
                return;
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::warn!("Ignoring binary WebSocket frame");
                continue;
            }
            // Ping/pong are answered by tungstenite
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                let _ = events.send(TransportEvent::Error(e.to_string())).await;
                return;
            }
            None => return,
        };

        if events.send(event).await.is_err() {
            return;
        }
    }
}

struct WebSocketSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self, code: CloseCode) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: WsCloseCode::from(code.as_u16()),
            reason: Cow::Borrowed(""),
        };
        self.sink
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}
