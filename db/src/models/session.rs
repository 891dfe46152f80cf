use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One bookable trainer slot.
///
/// `lock` is the checkout hold. It is only trusted while `locked_at` is
/// younger than the hold window; past that the slot is free again even if no
/// release ever arrived.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct TrainerSession {
    pub session_id: Uuid,
    pub trainer_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub price: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration: i32,
    pub booked: bool,
    pub lock: bool,
    pub locked_by: Option<Uuid>,
    pub locked_at: Option<DateTime<Utc>>,
    pub zoom_link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldOutcome {
    Held,
    AlreadyHeld,
    AlreadyBooked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookOutcome {
    Booked,
    /// Same customer, booked before. Repeat finalizations land here.
    AlreadyBooked,
    /// Booked by someone else.
    Conflict,
}

impl TrainerSession {
    /// Whether the hold still blocks other customers at `now`.
    /// A lock without a timestamp predates hold expiry and is kept.
    pub fn hold_active(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.lock && self.locked_at.is_none_or(|at| now - at < ttl)
    }

    pub fn try_hold(&mut self, customer_id: Uuid, now: DateTime<Utc>, ttl: Duration) -> HoldOutcome {
        if self.booked {
            return HoldOutcome::AlreadyBooked;
        }
        if self.hold_active(now, ttl) {
            return HoldOutcome::AlreadyHeld;
        }
        self.lock = true;
        self.locked_by = Some(customer_id);
        self.locked_at = Some(now);
        HoldOutcome::Held
    }

    pub fn release(&mut self) {
        self.lock = false;
        self.locked_by = None;
        self.locked_at = None;
    }

    /// Release on behalf of `customer_id`: only that customer's hold is
    /// cleared. `None` clears any hold. Returns whether the row was touched.
    pub fn release_for(&mut self, customer_id: Option<Uuid>) -> bool {
        if customer_id.is_some_and(|c| self.locked_by != Some(c)) {
            return false;
        }
        self.release();
        true
    }

    pub fn book(&mut self, customer_id: Uuid) -> BookOutcome {
        if self.booked {
            return if self.customer_id == Some(customer_id) {
                BookOutcome::AlreadyBooked
            } else {
                BookOutcome::Conflict
            };
        }
        self.booked = true;
        self.customer_id = Some(customer_id);
        self.release();
        BookOutcome::Booked
    }

    /// Outcome of a hold that did not update the row, read from the row as it is now.
    pub fn hold_refusal(&self) -> HoldOutcome {
        if self.booked {
            HoldOutcome::AlreadyBooked
        } else {
            HoldOutcome::AlreadyHeld
        }
    }

    /// Outcome of a book that did not update the row.
    pub fn book_refusal(&self, customer_id: Uuid) -> BookOutcome {
        if self.customer_id == Some(customer_id) {
            BookOutcome::AlreadyBooked
        } else {
            BookOutcome::Conflict
        }
    }
}

/// Rows for tests in this and dependent crates.
#[cfg(any(test, feature = "testing"))]
pub mod fixtures {
    use super::*;

    /// Unbooked, unlocked, priced at 5000.
    pub fn open_session() -> TrainerSession {
        TrainerSession {
            session_id: Uuid::new_v4(),
            trainer_id: Uuid::new_v4(),
            customer_id: None,
            price: 5000,
            date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            duration: 60,
            booked: false,
            lock: false,
            locked_by: None,
            locked_at: None,
            zoom_link: None,
        }
    }
}
