use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::session::TrainerSession;

const COLUMNS: &str = r#"session_id, trainer_id, customer_id, price, "date", "time", duration, booked, "lock", locked_by, locked_at, zoom_link"#;

pub async fn get_session<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    session_id: Uuid,
) -> Res<Option<TrainerSession>> {
    sqlx::query_as::<_, TrainerSession>(&format!(
        "SELECT {COLUMNS} FROM trainer_sessions WHERE session_id = $1"
    ))
    .bind(session_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Takes the hold when the slot is unbooked and either unlocked or its hold
/// is at least `ttl_seconds` old. Returns the updated row, or `None` when the
/// row was left untouched.
pub async fn try_hold<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    session_id: Uuid,
    customer_id: Uuid,
    ttl_seconds: i64,
) -> Res<Option<TrainerSession>> {
    sqlx::query_as::<_, TrainerSession>(&format!(
        r#"
        UPDATE trainer_sessions
        SET "lock" = TRUE, locked_by = $2, locked_at = now()
        WHERE session_id = $1
          AND booked = FALSE
          AND ("lock" = FALSE
               OR (locked_at IS NOT NULL AND locked_at <= now() - ($3::bigint * interval '1 second')))
        RETURNING {COLUMNS}
        "#
    ))
    .bind(session_id)
    .bind(customer_id)
    .bind(ttl_seconds)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Clears the hold. With `customer_id` only that customer's hold is cleared,
/// so a late release cannot free a slot someone else has since taken.
/// Returns whether a row was touched.
pub async fn release<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    session_id: Uuid,
    customer_id: Option<Uuid>,
) -> Res<bool> {
    sqlx::query(
        r#"
        UPDATE trainer_sessions
        SET "lock" = FALSE, locked_by = NULL, locked_at = NULL
        WHERE session_id = $1 AND ($2::uuid IS NULL OR locked_by = $2)
        "#,
    )
    .bind(session_id)
    .bind(customer_id)
    .execute(executor)
    .await
    .map(|res| res.rows_affected() > 0)
    .map_err(AppError::from)
}

/// Books an unbooked slot for `customer_id`. `booked` only ever moves from
/// false to true, so a `None` here is final and can be classified by reading
/// the row afterwards.
pub async fn try_book<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    session_id: Uuid,
    customer_id: Uuid,
) -> Res<Option<TrainerSession>> {
    sqlx::query_as::<_, TrainerSession>(&format!(
        r#"
        UPDATE trainer_sessions
        SET booked = TRUE, customer_id = $2, "lock" = FALSE, locked_by = NULL, locked_at = NULL
        WHERE session_id = $1 AND booked = FALSE
        RETURNING {COLUMNS}
        "#
    ))
    .bind(session_id)
    .bind(customer_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Writes a row as given, including any hold. Seeds tests against a real
/// database.
#[cfg(any(test, feature = "testing"))]
pub async fn insert_session<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    session: &TrainerSession,
) -> Res<()> {
    sqlx::query(&format!(
        "INSERT INTO trainer_sessions ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
    ))
    .bind(session.session_id)
    .bind(session.trainer_id)
    .bind(session.customer_id)
    .bind(session.price)
    .bind(session.date)
    .bind(session.time)
    .bind(session.duration)
    .bind(session.booked)
    .bind(session.lock)
    .bind(session.locked_by)
    .bind(session.locked_at)
    .bind(&session.zoom_link)
    .execute(executor)
    .await?;
    Ok(())
}
