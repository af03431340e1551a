//! order-relay - follows a provider session's pending orders in real time.
//!
//! Wires the websocket transport, the in-memory message bus and the HTTP
//! order service into a running connection and order projection, then logs
//! every change to the pending list until Ctrl-C.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_relay::adapters::{
    HttpOrderApi, InMemoryMessageBus, JwtIdentityDecoder, WebSocketTransport,
};
use order_relay::application::{ConnectionManager, OrderProjection};
use order_relay::config::AppConfig;
use order_relay::domain::foundation::{DomainError, ErrorCode};
use order_relay::domain::realtime::{BusMessage, InboundMessage};
use order_relay::ports::{FnSubscriber, MessageSubscriber};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("order-relay: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "order-relay stopped with an error");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.client.log_level));

    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    config.validate()?;
    let credential = config
        .auth
        .credential()
        .ok_or("ORDER_RELAY__AUTH__TOKEN is required")?;

    let bus = Arc::new(InMemoryMessageBus::<BusMessage>::new());
    let connection = ConnectionManager::spawn(
        Arc::new(WebSocketTransport::new(config.realtime.url.as_str())),
        bus.clone(),
        Arc::new(JwtIdentityDecoder::new()),
        config.realtime.reconnect_policy(),
    );
    let api = Arc::new(HttpOrderApi::new(config.api.http_order_api())?);
    let projection = OrderProjection::new(
        api,
        connection.clone(),
        bus.clone(),
        config.orders.projection(),
    );

    let chat = bus.subscribe(Arc::new(FnSubscriber::new(
        "ChatLog",
        |message: &BusMessage| {
            if let Some(InboundMessage::NewPrivateMessage(chat)) = message.as_inbound() {
                tracing::info!(sender = %chat.sender, len = chat.text.len(), "Private message");
            }
        },
    )));

    tracing::info!(
        realtime_url = %config.realtime.url,
        api_url = %config.api.base_url,
        "Starting order relay"
    );

    match projection.start(credential).await {
        Ok(merged) => tracing::info!(merged, "Pending orders loaded"),
        Err(e) if session_rejected(&e) => {
            tracing::error!(error = %e, "Session token rejected, not following orders");
            chat.unsubscribe();
            projection.shutdown().await;
            connection.disconnect();
            return Err(e.into());
        }
        Err(e) => tracing::warn!(error = %e, "Initial snapshot failed, following live updates only"),
    }

    let mut view = projection.watch();
    let mut last_ids = Vec::new();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                break;
            }
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow_and_update().clone();
                let ids = current.ids();
                if ids != last_ids {
                    for row in &current.orders {
                        tracing::info!(order_id = %row.order.id, remaining = %row.remaining, "Pending");
                    }
                    tracing::info!(count = ids.len(), "Pending orders changed");
                    last_ids = ids;
                }
            }
        }
    }

    tracing::info!("Shutting down");
    chat.unsubscribe();
    projection.shutdown().await;
    connection.disconnect();
    // Commands are handled in order: once this answers, the socket is closed.
    if let Ok(snapshot) = connection.snapshot().await {
        tracing::debug!(state = ?snapshot.state, "Connection closed");
    }
    Ok(())
}

/// A rejected session token will not recover by waiting for live updates.
fn session_rejected(err: &DomainError) -> bool {
    err.code == ErrorCode::Unauthorized
}
