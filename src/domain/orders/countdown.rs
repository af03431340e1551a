//! Remaining-time derivation for pending orders.
//!
//! Pure functions of `(now, timer_expiry)`. Removing expired orders is the
//! order book's job; nothing here mutates state.

use serde::Serialize;

use crate::domain::foundation::Timestamp;

/// Display text for an order whose timer has run out.
pub const EXPIRED_LABEL: &str = "Expired";

/// Time left on an order's timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Countdown {
    Remaining { minutes: i64, seconds: i64 },
    Expired,
}

impl Countdown {
    /// Computes the countdown at `now` for a timer ending at `expiry`.
    ///
    /// Sub-second remainders are truncated, so the last second before
    /// expiry reads `0m 0s`.
    pub fn between(now: &Timestamp, expiry: &Timestamp) -> Self {
        let remaining_ms = expiry.duration_since(now).num_milliseconds();
        if remaining_ms <= 0 {
            return Countdown::Expired;
        }
        Countdown::Remaining {
            minutes: remaining_ms / 60_000,
            seconds: (remaining_ms % 60_000) / 1_000,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Countdown::Expired)
    }

    /// `"<m>m <s>s"` or `"Expired"`.
    pub fn label(&self) -> String {
        match self {
            Countdown::Remaining { minutes, seconds } => format!("{}m {}s", minutes, seconds),
            Countdown::Expired => EXPIRED_LABEL.to_string(),
        }
    }
}

/// Shorthand for `Countdown::between(now, expiry).label()`.
pub fn remaining_label(now: &Timestamp, expiry: &Timestamp) -> String {
    Countdown::between(now, expiry).label()
}
