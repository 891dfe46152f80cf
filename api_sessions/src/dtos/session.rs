use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use db::models::session::TrainerSession;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldSessionRequest {
    pub session_id: Uuid,
    pub customer_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldSessionResponse {
    pub session_id: Uuid,
    pub locked_until: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSessionRequest {
    pub session_id: Uuid,
    /// When given, only this customer's hold is released.
    #[serde(default)]
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSessionResponse {
    pub session_id: Uuid,
    pub released: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSessionRequest {
    pub session_id: Uuid,
    pub customer_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSessionResponse {
    pub session_id: Uuid,
    pub customer_id: Uuid,
    pub already_booked: bool,
}

/// A session as callers should see it: `lock` and its owner only while the
/// hold is still inside its window.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
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
    pub locked_until: Option<DateTime<Utc>>,
    pub zoom_link: Option<String>,
}

impl SessionStatusResponse {
    pub fn from_row(session: TrainerSession, hold_active: bool, ttl: Duration) -> Self {
        SessionStatusResponse {
            session_id: session.session_id,
            trainer_id: session.trainer_id,
            customer_id: session.customer_id,
            price: session.price,
            date: session.date,
            time: session.time,
            duration: session.duration,
            booked: session.booked,
            lock: hold_active,
            locked_by: session.locked_by.filter(|_| hold_active),
            locked_until: session.locked_at.filter(|_| hold_active).map(|at| at + ttl),
            zoom_link: session.zoom_link,
        }
    }
}
