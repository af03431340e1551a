//! OrderProjection - The provider's live list of pending orders.
//!
//! Seeds itself from the order service snapshot, then follows `NEW_ORDER`
//! and `ORDER_UPDATE` frames from the message bus. A fixed-interval tick
//! drops orders whose timer has run out and refreshes every countdown.
//! Accept/reject go over HTTP; success removes the order locally.
//!
//! The order book is only ever mutated here. UI consumers read it through
//! [`OrderProjection::watch`] or [`OrderProjection::orders`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::application::connection::ConnectionHandle;
use crate::domain::foundation::{Credential, DomainError, ErrorCode, OrderId, Timestamp};
use crate::domain::orders::{BookChange, OrderBook, OrderListView, PendingOrder};
use crate::domain::realtime::{BusMessage, InboundMessage};
use crate::ports::{MessageSubscriber, OrderApi, OrderDecision, Subscriber, Subscription};

/// Configuration for [`OrderProjection`].
#[derive(Debug, Clone)]
pub struct OrderProjectionConfig {
    /// How often countdowns refresh and expired orders are swept.
    pub tick_interval: Duration,
}

impl Default for OrderProjectionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
        }
    }
}

impl OrderProjectionConfig {
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

/// State shared between the projection, its bus subscriber and its tick task.
struct ProjectionState {
    book: Mutex<OrderBook>,
    credential: Mutex<Option<Credential>>,
    /// Bumped whenever the book is reset for a new identity.
    generation: AtomicU64,
    view: watch::Sender<OrderListView>,
}

impl ProjectionState {
    fn book(&self) -> MutexGuard<'_, OrderBook> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn credential(&self) -> Option<Credential> {
        self.credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stores `credential`, returning true if it differs from the previous one.
    fn replace_credential(&self, credential: Credential) -> bool {
        let mut current = self.credential.lock().unwrap_or_else(PoisonError::into_inner);
        let changed = current.as_ref().is_some_and(|c| c != &credential);
        *current = Some(credential);
        changed
    }

    /// Empties the book for a new identity. Snapshots still in flight for the
    /// previous one are discarded when they land.
    fn reset(&self) {
        self.mutate(|book| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *book = OrderBook::new();
        });
    }

    /// Opens a snapshot fetch and returns the generation it belongs to.
    fn begin_sync(&self) -> u64 {
        let mut book = self.book();
        book.begin_sync();
        self.generation.load(Ordering::SeqCst)
    }

    fn abandon_sync(&self, generation: u64) {
        let mut book = self.book();
        if self.generation.load(Ordering::SeqCst) == generation {
            book.abandon_sync();
        }
    }

    /// Merges `snapshot` unless the book was reset since the fetch began.
    fn finish_sync(&self, generation: u64, snapshot: Vec<PendingOrder>) -> Option<usize> {
        let now = Timestamp::now();
        self.mutate(|book| {
            (self.generation.load(Ordering::SeqCst) == generation)
                .then(|| book.merge_snapshot(snapshot, &now))
        })
    }

    /// Applies `change` to the book and republishes the view.
    fn mutate<T>(&self, change: impl FnOnce(&mut OrderBook) -> T) -> T {
        let now = Timestamp::now();
        let (result, view) = {
            let mut book = self.book();
            let result = change(&mut book);
            (result, book.view(&now))
        };
        self.view.send_replace(view);
        result
    }

    fn apply(&self, message: &InboundMessage) {
        let change = match message {
            InboundMessage::NewOrder(order) => {
                self.mutate(|book| book.insert_front(order.clone()))
            }
            InboundMessage::OrderUpdate(update) => {
                self.mutate(|book| book.apply_update(update.clone()))
            }
            _ => return,
        };

        match change {
            BookChange::Inserted(id) => tracing::info!(order_id = %id, "New pending order"),
            BookChange::Replaced(id) => tracing::debug!(order_id = %id, "Pending order refreshed"),
            BookChange::Removed(id) => tracing::info!(order_id = %id, "Order left pending state"),
            BookChange::Unchanged => {
                tracing::debug!(kind = message.kind(), "Order frame did not change the book")
            }
        }
    }

    fn sweep(&self, now: &Timestamp) -> Vec<OrderId> {
        let (expired, view) = {
            let mut book = self.book();
            let expired = book.remove_expired(now);
            (expired, book.view(now))
        };
        self.view.send_replace(view);

        for id in &expired {
            tracing::info!(order_id = %id, "Pending order expired");
        }
        expired
    }
}

/// Bus subscriber feeding order frames into the projection.
struct OrderFrameSubscriber {
    state: Arc<ProjectionState>,
}

impl Subscriber<BusMessage> for OrderFrameSubscriber {
    fn receive(&self, message: &BusMessage) -> Result<(), DomainError> {
        if let Some(inbound) = message.as_inbound() {
            self.state.apply(inbound);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "OrderProjection"
    }
}

struct Running {
    subscription: Subscription,
    shutdown: watch::Sender<bool>,
    ticker: JoinHandle<()>,
}

/// Client-side projection of the session's pending orders.
pub struct OrderProjection {
    api: Arc<dyn OrderApi>,
    connection: ConnectionHandle,
    bus: Arc<dyn MessageSubscriber<BusMessage>>,
    config: OrderProjectionConfig,
    state: Arc<ProjectionState>,
    running: Mutex<Option<Running>>,
}

impl OrderProjection {
    pub fn new(
        api: Arc<dyn OrderApi>,
        connection: ConnectionHandle,
        bus: Arc<dyn MessageSubscriber<BusMessage>>,
        config: OrderProjectionConfig,
    ) -> Self {
        let (view, _) = watch::channel(OrderListView::default());
        Self {
            api,
            connection,
            bus,
            config,
            state: Arc::new(ProjectionState {
                book: Mutex::new(OrderBook::new()),
                credential: Mutex::new(None),
                generation: AtomicU64::new(0),
                view,
            }),
            running: Mutex::new(None),
        }
    }

    /// Starts following orders for the identity behind `credential`.
    ///
    /// Rejects a credential with no decodable identity before touching any
    /// state. Otherwise subscribes to the bus and starts the tick (once),
    /// asks the shared connection to connect, then seeds the book from the
    /// order service. Returns how many snapshot orders were merged. A
    /// snapshot failure is returned to the caller; the subscription and
    /// connection stay up.
    ///
    /// Frames and decisions applied while the snapshot is in flight win over
    /// it: an order they settled is not brought back by the merge.
    pub async fn start(&self, credential: Credential) -> Result<usize, DomainError> {
        let identity = self.connection.identify(&credential)?;

        if self.state.replace_credential(credential.clone()) {
            tracing::info!(user_id = %identity.id, "Credential changed, clearing pending orders");
            self.state.reset();
        }

        self.ensure_running();
        self.connection.connect(credential.clone())?;

        let generation = self.state.begin_sync();
        let snapshot = match self.api.pending_orders(&credential).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.state.abandon_sync(generation);
                tracing::warn!(error = %e, "Failed to fetch pending orders");
                return Err(DomainError::from(e));
            }
        };

        match self.state.finish_sync(generation, snapshot) {
            Some(merged) => {
                tracing::info!(merged, "Seeded pending orders from snapshot");
                Ok(merged)
            }
            None => {
                tracing::info!("Discarding snapshot fetched for a previous credential");
                Ok(0)
            }
        }
    }

    fn ensure_running(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return;
        }

        let subscription = self.bus.subscribe(Arc::new(OrderFrameSubscriber {
            state: self.state.clone(),
        }));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let ticker = tokio::spawn(run_ticker(
            self.state.clone(),
            self.config.tick_interval,
            shutdown_rx,
        ));

        *running = Some(Running {
            subscription,
            shutdown,
            ticker,
        });
    }

    /// Accepts `order_id` server-side, then drops it from the list.
    pub async fn accept(&self, order_id: &OrderId) -> Result<(), DomainError> {
        self.decide(order_id, OrderDecision::Accept).await
    }

    /// Rejects `order_id` server-side, then drops it from the list.
    pub async fn reject(&self, order_id: &OrderId) -> Result<(), DomainError> {
        self.decide(order_id, OrderDecision::Reject).await
    }

    async fn decide(&self, order_id: &OrderId, decision: OrderDecision) -> Result<(), DomainError> {
        let credential = self.state.credential().ok_or_else(|| {
            DomainError::new(ErrorCode::Unauthorized, "Projection has not been started")
        })?;

        self.api
            .decide(&credential, order_id, decision)
            .await
            .map_err(|e| {
                tracing::warn!(order_id = %order_id, %decision, error = %e, "Order decision failed");
                DomainError::from(e)
                    .with_detail("order_id", order_id.to_string())
                    .with_detail("decision", decision.to_string())
            })?;

        self.state.mutate(|book| book.remove(order_id));
        tracing::info!(order_id = %order_id, %decision, "Order decided");
        Ok(())
    }

    /// Removes every order expired at `now`. The tick calls this each interval.
    pub fn sweep(&self, now: &Timestamp) -> Vec<OrderId> {
        self.state.sweep(now)
    }

    /// Current pending orders, newest first.
    pub fn orders(&self) -> Vec<PendingOrder> {
        self.state.book().orders().to_vec()
    }

    /// List with countdowns computed at `now`.
    pub fn view_at(&self, now: &Timestamp) -> OrderListView {
        self.state.book().view(now)
    }

    /// Receiver refreshed on every change and every tick.
    pub fn watch(&self) -> watch::Receiver<OrderListView> {
        self.state.view.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Unsubscribes from the bus and stops the tick.
    ///
    /// Leaves the shared connection alone: other consumers may still use it.
    pub async fn shutdown(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(running) = running {
            running.subscription.unsubscribe();
            let _ = running.shutdown.send(true);
            if let Err(e) = running.ticker.await {
                tracing::warn!(error = %e, "Order tick task ended abnormally");
            }
            tracing::debug!("Order projection stopped");
        }
    }
}

async fn run_ticker(
    state: Arc<ProjectionState>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
            }
            _ = interval.tick() => {
                state.sweep(&Timestamp::now());
            }
        }
    }
}

#[cfg(test)]
#[path = "projection_test.rs"]
mod projection_test;
