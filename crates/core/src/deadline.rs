//! Order start deadline and escalation bands.
//!
//! Shared by the order list (color band + label) and the action queue
//! (numeric hour offset only).

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::order::OrderStatus;

/// Hours between order creation and the start deadline.
pub const DEFAULT_DEADLINE_HOURS: i64 = 48;

/// Escalation band for an order that has not been started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationBand {
    /// 24 hours or more left.
    Safe,
    /// Between 12 and 24 hours left.
    Warning,
    /// Less than 12 hours left.
    Urgent,
    /// Deadline reached or passed.
    Breached,
}

impl EscalationBand {
    fn from_hours_left(hours_left: i64) -> Self {
        match hours_left {
            h if h >= 24 => EscalationBand::Safe,
            h if h >= 12 => EscalationBand::Warning,
            h if h > 0 => EscalationBand::Urgent,
            _ => EscalationBand::Breached,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            EscalationBand::Safe => "green",
            EscalationBand::Warning => "yellow",
            EscalationBand::Urgent => "orange",
            EscalationBand::Breached => "red",
        }
    }
}

/// Result of classifying an order against its start deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadlineStatus {
    pub deadline: DateTime<Utc>,
    pub hours_left: i64,
    pub label: String,
    pub band: EscalationBand,
    pub color: &'static str,
    /// Only orders still in `processing` show a deadline.
    pub visible: bool,
}

/// Deadline window applied to every order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlinePolicy {
    window: Duration,
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        Self::from_hours(DEFAULT_DEADLINE_HOURS)
    }
}

impl DeadlinePolicy {
    pub fn from_hours(hours: i64) -> Self {
        Self {
            window: Duration::hours(hours),
        }
    }

    pub fn deadline(&self, order_created_at: DateTime<Utc>) -> DateTime<Utc> {
        order_created_at + self.window
    }

    /// Classify an order for the order list.
    pub fn classify(
        &self,
        order_created_at: DateTime<Utc>,
        status: &OrderStatus,
        now: DateTime<Utc>,
    ) -> DeadlineStatus {
        let deadline = self.deadline(order_created_at);
        let hours_left = hours_left(deadline, now);
        let band = EscalationBand::from_hours_left(hours_left);

        let label = if band == EscalationBand::Breached {
            format!("{} Hours past deadline!", -hours_left)
        } else {
            format!("{} hours left to start!", hours_left)
        };

        DeadlineStatus {
            deadline,
            hours_left,
            label,
            band,
            color: band.color(),
            visible: *status == OrderStatus::Processing,
        }
    }
}

/// Whole hours until `deadline`, rounded half away from zero. Negative once passed.
pub fn hours_left(deadline: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (deadline - now).num_milliseconds() as f64;
    (millis / 3_600_000.0).round() as i64
}

/// Compact due label used by action items: `"5h left"` or `"2h ago!"`.
///
/// The wording follows which side of the deadline `now` is on, so the last
/// half hour reads `"0h left"`.
pub fn due_label(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = hours_left(deadline, now);
    if now <= deadline {
        format!("{}h left", hours)
    } else {
        format!("{}h ago!", -hours)
    }
}
