//! MessageBus port - Fan-out of admitted messages to independent consumers.
//!
//! The bus is transport-agnostic: the connection manager publishes, any
//! component (order projection, chat, UI status) subscribes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::foundation::{DomainError, SubscriptionId};

/// Typed consumer of bus messages.
///
/// Implementations should be:
/// - **Quick** - delivery is synchronous; long work belongs in a spawned task
/// - **Isolated** - errors and panics are contained by the bus
///
/// # Example
///
/// ```ignore
/// struct ChatInbox { /* ... */ }
///
/// impl Subscriber<BusMessage> for ChatInbox {
///     fn receive(&self, message: &BusMessage) -> Result<(), DomainError> {
///         if let Some(InboundMessage::NewPrivateMessage(m)) = message.as_inbound() {
///             self.push(m.clone());
///         }
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "ChatInbox"
///     }
/// }
/// ```
pub trait Subscriber<M>: Send + Sync {
    /// Handle one message.
    fn receive(&self, message: &M) -> Result<(), DomainError>;

    /// Subscriber name for logging.
    fn name(&self) -> &'static str;
}

/// Adapts a closure into a [`Subscriber`].
pub struct FnSubscriber<F> {
    name: &'static str,
    f: F,
}

impl<F> FnSubscriber<F> {
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<M, F> Subscriber<M> for FnSubscriber<F>
where
    F: Fn(&M) + Send + Sync,
{
    fn receive(&self, message: &M) -> Result<(), DomainError> {
        (self.f)(message);
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Disposer returned by [`MessageSubscriber::subscribe`].
///
/// `unsubscribe` is idempotent. Dropping a `Subscription` does not
/// unsubscribe: the registration lives until it is explicitly released.
pub struct Subscription {
    id: SubscriptionId,
    release: Arc<dyn Fn(SubscriptionId) + Send + Sync>,
    released: AtomicBool,
}

impl Subscription {
    pub fn new(id: SubscriptionId, release: impl Fn(SubscriptionId) + Send + Sync + 'static) -> Self {
        Self {
            id,
            release: Arc::new(release),
            released: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Deregisters the subscriber. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            (self.release)(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        !self.released.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Outcome of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Port for publishing to every current subscriber.
pub trait MessagePublisher<M>: Send + Sync {
    /// Synchronously delivers `message` to every registered subscriber.
    ///
    /// Never fails: subscriber faults are logged and counted.
    fn publish(&self, message: &M) -> DeliveryReport;
}

/// Port for registering subscribers.
pub trait MessageSubscriber<M>: Send + Sync {
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<M>>) -> Subscription;

    /// Number of live registrations.
    fn subscriber_count(&self) -> usize;
}

/// Combined trait for bus implementations.
pub trait MessageBus<M>: MessagePublisher<M> + MessageSubscriber<M> {}

impl<M, T: MessagePublisher<M> + MessageSubscriber<M>> MessageBus<M> for T {}
