//! In-memory order service for testing.
//!
//! Holds a list of pending orders and records every accept/reject call.
//! Decided orders leave the pending list, as they would server-side.
//! Snapshot fetches can be held open to simulate a slow service.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::foundation::{Credential, OrderId};
use crate::domain::orders::PendingOrder;
use crate::ports::{OrderApi, OrderApiError, OrderDecision};

#[derive(Default)]
struct State {
    pending: Vec<PendingOrder>,
    decisions: Vec<(OrderId, OrderDecision)>,
    snapshot_failures: VecDeque<OrderApiError>,
    decision_failures: VecDeque<OrderApiError>,
    last_credential: Option<Credential>,
}

/// In-memory [`OrderApi`].
pub struct InMemoryOrderApi {
    state: Mutex<State>,
    /// False while snapshot answers are held back.
    gate: watch::Sender<bool>,
    snapshot_calls: watch::Sender<usize>,
}

impl Default for InMemoryOrderApi {
    fn default() -> Self {
        Self {
            state: Mutex::new(State::default()),
            gate: watch::channel(true).0,
            snapshot_calls: watch::channel(0).0,
        }
    }
}

impl InMemoryOrderApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds every snapshot answer until [`release_snapshots`](Self::release_snapshots).
    /// The answer is taken when the call arrives, not when it is released.
    pub fn hold_snapshots(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_snapshots(&self) {
        self.gate.send_replace(true);
    }

    /// Resolves once `count` snapshot fetches have arrived.
    pub async fn wait_for_snapshot_calls(&self, count: usize) {
        let mut calls = self.snapshot_calls.subscribe();
        let _ = calls.wait_for(|n| *n >= count).await;
    }

    /// Seeds the pending-order snapshot.
    pub fn with_pending(self, orders: Vec<PendingOrder>) -> Self {
        self.lock().pending = orders;
        self
    }

    /// Makes the next snapshot fetch fail with `error`.
    pub fn fail_next_snapshot(&self, error: OrderApiError) {
        self.lock().snapshot_failures.push_back(error);
    }

    /// Makes the next accept/reject fail with `error`.
    pub fn fail_next_decision(&self, error: OrderApiError) {
        self.lock().decision_failures.push_back(error);
    }

    /// Decisions that succeeded, in call order.
    pub fn decisions(&self) -> Vec<(OrderId, OrderDecision)> {
        self.lock().decisions.clone()
    }

    pub fn snapshot_calls(&self) -> usize {
        *self.snapshot_calls.borrow()
    }

    /// Credential presented on the most recent call.
    pub fn last_credential(&self) -> Option<Credential> {
        self.lock().last_credential.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl OrderApi for InMemoryOrderApi {
    async fn pending_orders(
        &self,
        credential: &Credential,
    ) -> Result<Vec<PendingOrder>, OrderApiError> {
        let answer = {
            let mut state = self.lock();
            state.last_credential = Some(credential.clone());
            match state.snapshot_failures.pop_front() {
                Some(error) => Err(error),
                None => Ok(state.pending.clone()),
            }
        };
        self.snapshot_calls.send_modify(|n| *n += 1);

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;
        answer
    }

    async fn decide(
        &self,
        credential: &Credential,
        order_id: &OrderId,
        decision: OrderDecision,
    ) -> Result<(), OrderApiError> {
        let mut state = self.lock();
        state.last_credential = Some(credential.clone());
        if let Some(error) = state.decision_failures.pop_front() {
            return Err(error);
        }
        state.pending.retain(|order| &order.id != order_id);
        state.decisions.push((order_id.clone(), decision));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Timestamp, UserId};
    use crate::domain::orders::CustomerRef;

    fn order(id: &str) -> PendingOrder {
        PendingOrder {
            id: OrderId::new(id).unwrap(),
            customer: CustomerRef::Id(UserId::new("c1").unwrap()),
            dishes: Vec::new(),
            number_of_people: 1,
            total: 10.0,
            timer_expiry: Timestamp::now().plus_millis(60_000),
        }
    }

    #[tokio::test]
    async fn decided_orders_leave_the_snapshot() {
        let api = InMemoryOrderApi::new().with_pending(vec![order("o1"), order("o2")]);
        let credential = Credential::new("t");

        api.decide(&credential, &OrderId::new("o1").unwrap(), OrderDecision::Accept)
            .await
            .unwrap();

        let remaining = api.pending_orders(&credential).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(api.decisions().len(), 1);
        assert_eq!(api.snapshot_calls(), 1);
    }

    #[tokio::test]
    async fn scripted_failure_applies_once() {
        let api = InMemoryOrderApi::new();
        let credential = Credential::new("t");
        api.fail_next_snapshot(OrderApiError::Network("down".into()));

        assert!(api.pending_orders(&credential).await.is_err());
        assert!(api.pending_orders(&credential).await.is_ok());
    }

    #[tokio::test]
    async fn held_snapshot_answers_with_the_list_at_call_time() {
        let api = std::sync::Arc::new(InMemoryOrderApi::new().with_pending(vec![order("o1")]));
        let credential = Credential::new("t");
        api.hold_snapshots();

        let fetch = tokio::spawn({
            let api = api.clone();
            let credential = credential.clone();
            async move { api.pending_orders(&credential).await }
        });
        api.wait_for_snapshot_calls(1).await;
        api.decide(&credential, &OrderId::new("o1").unwrap(), OrderDecision::Accept)
            .await
            .unwrap();
        assert!(!fetch.is_finished());

        api.release_snapshots();
        let snapshot = fetch.await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
    }
}
