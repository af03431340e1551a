//! In-memory message bus.
//!
//! Synchronous, in-process fan-out. Every subscriber registered at publish
//! time receives the message exactly once, in registration order. Subscriber
//! errors and panics are logged and counted; they never reach the publisher
//! or the other subscribers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::domain::foundation::SubscriptionId;
use crate::ports::{DeliveryReport, MessagePublisher, MessageSubscriber, Subscriber, Subscription};

type Registry<M> = RwLock<Vec<(SubscriptionId, Arc<dyn Subscriber<M>>)>>;

/// In-memory message bus.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryMessageBus::<BusMessage>::new());
///
/// let subscription = bus.subscribe(Arc::new(FnSubscriber::new("log", |m: &BusMessage| {
///     println!("{}", m.label());
/// })));
///
/// bus.publish(&BusMessage::from(ConnectionEvent::Error { message: "boom".into() }));
/// subscription.unsubscribe();
/// ```
pub struct InMemoryMessageBus<M> {
    subscribers: Arc<Registry<M>>,
}

impl<M: 'static> InMemoryMessageBus<M> {
    /// Creates a new bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn Subscriber<M>>> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect()
    }

    fn release(registry: &Weak<Registry<M>>, id: SubscriptionId) {
        if let Some(registry) = registry.upgrade() {
            registry
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(registered, _)| *registered != id);
        }
    }
}

impl<M: 'static> Default for InMemoryMessageBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> MessagePublisher<M> for InMemoryMessageBus<M>
where
    M: Send + Sync + 'static,
{
    fn publish(&self, message: &M) -> DeliveryReport {
        // Copy out so subscribers may (un)subscribe during delivery
        let subscribers = self.snapshot();

        let mut report = DeliveryReport::default();
        for subscriber in subscribers {
            match catch_unwind(AssertUnwindSafe(|| subscriber.receive(message))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(error)) => {
                    report.failed += 1;
                    tracing::warn!(
                        subscriber = subscriber.name(),
                        error = %error,
                        "Subscriber failed to handle message"
                    );
                }
                Err(_) => {
                    report.failed += 1;
                    tracing::error!(
                        subscriber = subscriber.name(),
                        "Subscriber panicked while handling message"
                    );
                }
            }
        }
        report
    }
}

impl<M> MessageSubscriber<M> for InMemoryMessageBus<M>
where
    M: Send + Sync + 'static,
{
    fn subscribe(&self, subscriber: Arc<dyn Subscriber<M>>) -> Subscription {
        let id = SubscriptionId::new();
        tracing::debug!(subscriber = subscriber.name(), %id, "Subscriber registered");

        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, subscriber));

        let registry = Arc::downgrade(&self.subscribers);
        Subscription::new(id, move |id| Self::release(&registry, id))
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
