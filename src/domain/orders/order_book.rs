//! The client-held collection of pending orders.
//!
//! Holds at most one entry per order id, in presentation order (newest
//! first). Every mutation is a remove or replace by id, so stream frames,
//! snapshot merges and expiry sweeps can be applied in any interleaving
//! without duplicating entries.
//!
//! A snapshot fetched over HTTP can be older than frames applied while it
//! was in flight. Between [`OrderBook::begin_sync`] and the matching merge,
//! the book remembers every id a frame or decision settled, and the merge
//! leaves those ids alone.

use std::collections::HashSet;

use serde::Serialize;

use crate::domain::foundation::{OrderId, Timestamp};

use super::countdown::Countdown;
use super::pending_order::{OrderUpdate, PendingOrder};

/// What an operation did to the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookChange {
    Inserted(OrderId),
    Replaced(OrderId),
    Removed(OrderId),
    Unchanged,
}

impl BookChange {
    pub fn is_change(&self) -> bool {
        !matches!(self, BookChange::Unchanged)
    }
}

/// Pending orders keyed by id, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBook {
    orders: Vec<PendingOrder>,
    /// Snapshot fetches started and not yet merged or abandoned.
    open_syncs: usize,
    /// Ids settled by frames or decisions since the oldest open fetch began.
    touched: HashSet<OrderId>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Orders in presentation order.
    pub fn orders(&self) -> &[PendingOrder] {
        &self.orders
    }

    pub fn get(&self, id: &OrderId) -> Option<&PendingOrder> {
        self.orders.iter().find(|o| &o.id == id)
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &OrderId) -> Option<usize> {
        self.orders.iter().position(|o| &o.id == id)
    }

    /// Marks the start of a snapshot fetch. Pair with
    /// [`merge_snapshot`](Self::merge_snapshot) or [`abandon_sync`](Self::abandon_sync).
    pub fn begin_sync(&mut self) {
        if self.open_syncs == 0 {
            self.touched.clear();
        }
        self.open_syncs += 1;
    }

    /// Closes a fetch that produced no snapshot.
    pub fn abandon_sync(&mut self) {
        self.end_sync();
    }

    pub fn is_syncing(&self) -> bool {
        self.open_syncs > 0
    }

    fn end_sync(&mut self) {
        self.open_syncs = self.open_syncs.saturating_sub(1);
        if self.open_syncs == 0 {
            self.touched.clear();
        }
    }

    fn touch(&mut self, id: &OrderId) {
        if self.open_syncs > 0 {
            self.touched.insert(id.clone());
        }
    }

    /// Inserts a freshly announced order at the front, dropping any older
    /// entry with the same id.
    pub fn insert_front(&mut self, order: PendingOrder) -> BookChange {
        let id = order.id.clone();
        self.touch(&id);
        let replaced = match self.position(&id) {
            Some(index) => {
                self.orders.remove(index);
                true
            }
            None => false,
        };
        self.orders.insert(0, order);
        if replaced {
            BookChange::Replaced(id)
        } else {
            BookChange::Inserted(id)
        }
    }

    /// Applies a status change.
    ///
    /// A non-pending status removes the order. A pending status replaces the
    /// entry in place with the refreshed order, or only moves its expiry when
    /// the frame carried no full order. A refreshed order we have never seen
    /// is inserted at the front.
    pub fn apply_update(&mut self, update: OrderUpdate) -> BookChange {
        if !update.status.is_pending() {
            return match self.remove(&update.id) {
                Some(_) => BookChange::Removed(update.id),
                None => BookChange::Unchanged,
            };
        }

        match (self.position(&update.id), update.order, update.timer_expiry) {
            (Some(index), Some(order), _) => {
                self.touch(&update.id);
                self.orders[index] = order;
                BookChange::Replaced(update.id)
            }
            (Some(index), None, Some(expiry)) => {
                self.touch(&update.id);
                self.orders[index].timer_expiry = expiry;
                BookChange::Replaced(update.id)
            }
            (None, Some(order), _) => self.insert_front(order),
            _ => BookChange::Unchanged,
        }
    }

    /// Merges an HTTP snapshot into the book and closes one open fetch.
    ///
    /// Entries already expired at `now` are skipped, and so are ids a frame
    /// or decision settled while the fetch was in flight. Known ids are
    /// replaced in place, unknown ids are appended behind the streamed ones.
    pub fn merge_snapshot(&mut self, snapshot: Vec<PendingOrder>, now: &Timestamp) -> usize {
        let mut merged = 0;
        for order in snapshot.into_iter().filter(|o| !o.is_expired_at(now)) {
            if self.touched.contains(&order.id) {
                continue;
            }
            match self.position(&order.id) {
                Some(index) => self.orders[index] = order,
                None => self.orders.push(order),
            }
            merged += 1;
        }
        self.end_sync();
        merged
    }

    /// Removes `id`. While a fetch is open the id stays settled, so the
    /// snapshot cannot bring it back.
    pub fn remove(&mut self, id: &OrderId) -> Option<PendingOrder> {
        self.touch(id);
        self.position(id).map(|index| self.orders.remove(index))
    }

    /// Drops every order whose timer has run out at `now`.
    pub fn remove_expired(&mut self, now: &Timestamp) -> Vec<OrderId> {
        let mut expired = Vec::new();
        self.orders.retain(|order| {
            if order.is_expired_at(now) {
                expired.push(order.id.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Read model for the UI at `now`.
    pub fn view(&self, now: &Timestamp) -> OrderListView {
        OrderListView {
            as_of: *now,
            orders: self
                .orders
                .iter()
                .map(|order| {
                    let countdown = Countdown::between(now, &order.timer_expiry);
                    OrderCountdownView {
                        remaining: countdown.label(),
                        countdown,
                        order: order.clone(),
                    }
                })
                .collect(),
        }
    }
}

/// One order with its countdown, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCountdownView {
    pub order: PendingOrder,
    pub countdown: Countdown,
    pub remaining: String,
}

/// The pending-order list as the UI sees it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListView {
    pub as_of: Timestamp,
    pub orders: Vec<OrderCountdownView>,
}

impl OrderListView {
    pub fn ids(&self) -> Vec<OrderId> {
        self.orders.iter().map(|v| v.order.id.clone()).collect()
    }
}

#[cfg(test)]
#[path = "order_book_test.rs"]
mod order_book_test;
