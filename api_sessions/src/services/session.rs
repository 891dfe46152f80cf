use chrono::{DateTime, Duration, Utc};
use common::error::{AppError, Res};
use db::models::session::{BookOutcome, HoldOutcome, TrainerSession};
use sqlx::PgPool;
use uuid::Uuid;

pub const ALREADY_BOOKED: &str = "Session already booked";
pub const ALREADY_HELD: &str = "Session is currently on hold, try again later";
pub const BOOKED_BY_OTHER: &str = "Session already booked by another customer";

fn not_found(session_id: Uuid) -> AppError {
    AppError::NotFound(format!("Trainer session {} does not exist", session_id))
}

fn hold_error(outcome: HoldOutcome) -> AppError {
    match outcome {
        HoldOutcome::AlreadyBooked => AppError::Conflict(ALREADY_BOOKED.to_string()),
        _ => AppError::Conflict(ALREADY_HELD.to_string()),
    }
}

/// Holds a session for `customer_id`.
///
/// The conditional update is the only write, so two concurrent holds can never
/// both succeed. When it touches nothing the current row explains why.
pub async fn hold_session(
    pool: &PgPool,
    session_id: Uuid,
    customer_id: Uuid,
    hold_ttl_seconds: i64,
) -> Res<TrainerSession> {
    if let Some(session) = db::session::try_hold(pool, session_id, customer_id, hold_ttl_seconds).await? {
        log::info!("Session {} held for customer {}", session_id, customer_id);
        return Ok(session);
    }

    let current = db::session::get_session(pool, session_id)
        .await?
        .ok_or_else(|| not_found(session_id))?;
    let refusal = current.hold_refusal();
    log::info!("Hold on session {} refused: {:?}", session_id, refusal);
    Err(hold_error(refusal))
}

/// Clears the hold, or only `customer_id`'s hold when given. Unknown, never
/// held or already retaken sessions are not an error.
pub async fn release_session(
    pool: &PgPool,
    session_id: Uuid,
    customer_id: Option<Uuid>,
) -> Res<bool> {
    let released = db::session::release(pool, session_id, customer_id).await?;
    match (released, customer_id) {
        (true, _) => log::info!("Session {} released", session_id),
        (false, Some(customer)) => log::info!(
            "Release of session {} for {} skipped, hold belongs to someone else or is gone",
            session_id,
            customer
        ),
        (false, None) => log::warn!("Release for unknown session {}", session_id),
    }
    Ok(released)
}

/// Books the session for `customer_id`. Repeating the call for the same
/// customer is a no-op that reports `AlreadyBooked`.
pub async fn book_session(
    pool: &PgPool,
    session_id: Uuid,
    customer_id: Uuid,
) -> Res<(BookOutcome, TrainerSession)> {
    if let Some(session) = db::session::try_book(pool, session_id, customer_id).await? {
        log::info!("Session {} booked by customer {}", session_id, customer_id);
        return Ok((BookOutcome::Booked, session));
    }

    let current = db::session::get_session(pool, session_id)
        .await?
        .ok_or_else(|| not_found(session_id))?;
    match current.book_refusal(customer_id) {
        BookOutcome::Conflict => {
            log::error!(
                "Session {} already booked by {:?}, refusing customer {}",
                session_id,
                current.customer_id,
                customer_id
            );
            Err(AppError::Conflict(BOOKED_BY_OTHER.to_string()))
        }
        outcome => {
            log::info!("Session {} already booked by customer {}", session_id, customer_id);
            Ok((outcome, current))
        }
    }
}

pub async fn session_status(
    pool: &PgPool,
    session_id: Uuid,
    hold_ttl_seconds: i64,
    now: DateTime<Utc>,
) -> Res<(TrainerSession, bool)> {
    let session = db::session::get_session(pool, session_id)
        .await?
        .ok_or_else(|| not_found(session_id))?;
    let active = session.hold_active(now, Duration::seconds(hold_ttl_seconds));
    Ok((session, active))
}
