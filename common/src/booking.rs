//! Identifiers that travel through Stripe with a session purchase, and the
//! small amount of arithmetic the checkout needs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TRAINER_SESSION_ID: &str = "trainer_session_id";
pub const APP_CUSTOMER_ID: &str = "app_customer_id";
pub const TRAINER_USER_ID: &str = "trainer_user_id";

/// Who bought which trainer session.
///
/// Written into both the Checkout Session metadata and the PaymentIntent
/// metadata, read back by the webhook and the success redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingMetadata {
    pub trainer_session_id: Uuid,
    pub app_customer_id: Uuid,
    pub trainer_user_id: Option<Uuid>,
}

impl BookingMetadata {
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(
            TRAINER_SESSION_ID.to_string(),
            self.trainer_session_id.to_string(),
        );
        map.insert(APP_CUSTOMER_ID.to_string(), self.app_customer_id.to_string());
        if let Some(trainer) = self.trainer_user_id {
            map.insert(TRAINER_USER_ID.to_string(), trainer.to_string());
        }
        map
    }

    /// Parses one metadata map. Both the session id and the customer id must be
    /// present and valid, otherwise the map does not identify a booking.
    pub fn from_map(map: &HashMap<String, String>) -> Option<Self> {
        let parse = |key: &str| map.get(key).and_then(|v| Uuid::parse_str(v.trim()).ok());

        Some(BookingMetadata {
            trainer_session_id: parse(TRAINER_SESSION_ID)?,
            app_customer_id: parse(APP_CUSTOMER_ID)?,
            trainer_user_id: parse(TRAINER_USER_ID),
        })
    }

    /// Session metadata wins; the payment intent is the fallback.
    pub fn from_maps(
        session: Option<&HashMap<String, String>>,
        intent: Option<&HashMap<String, String>>,
    ) -> Option<Self> {
        session
            .and_then(Self::from_map)
            .or_else(|| intent.and_then(Self::from_map))
    }
}

/// Platform cut in minor units, rounded half up. Never exceeds the amount.
pub fn application_fee(unit_amount: i64, percent: i64) -> i64 {
    if unit_amount <= 0 || percent <= 0 {
        return 0;
    }
    let fee = (unit_amount * percent + 50) / 100;
    fee.min(unit_amount)
}
