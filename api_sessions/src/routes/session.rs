use std::sync::Arc;

use actix_web::{
    Responder, get, post,
    web::{self},
};
use chrono::{Duration, Utc};
use common::{env_config::Config, error::Res, http::Success};
use db::models::session::BookOutcome;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    dtos::session::{
        BookSessionRequest, BookSessionResponse, HoldSessionRequest, HoldSessionResponse,
        ReleaseSessionRequest, ReleaseSessionResponse, SessionStatusResponse,
    },
    services,
};

/// Places a checkout hold on a trainer session.
///
/// # Input
/// - `sessionId`, `customerId`
///
/// # Output
/// - 200 `{sessionId, lockedUntil}` when the hold was taken
/// - 409 when the session is booked or held by someone else
/// - 404 when the session does not exist
#[post("/holdsession")]
pub async fn post_hold(
    pool: web::Data<Arc<PgPool>>,
    config: web::Data<Arc<Config>>,
    req: web::Json<HoldSessionRequest>,
) -> Res<impl Responder> {
    let ttl = config.payment.hold_ttl_seconds;
    let session = services::session::hold_session(&pool, req.session_id, req.customer_id, ttl).await?;

    let locked_at = session.locked_at.unwrap_or_else(Utc::now);
    Success::ok(HoldSessionResponse {
        session_id: session.session_id,
        locked_until: locked_at + Duration::seconds(ttl),
    })
}

/// Clears a hold. Always 200, also for sessions that were never held.
/// With `customerId` only that customer's hold is cleared; `released` says
/// whether anything changed.
#[post("/releasesession")]
pub async fn post_release(
    pool: web::Data<Arc<PgPool>>,
    req: web::Json<ReleaseSessionRequest>,
) -> Res<impl Responder> {
    let released =
        services::session::release_session(&pool, req.session_id, req.customer_id).await?;
    Success::ok(ReleaseSessionResponse {
        session_id: req.session_id,
        released,
    })
}

/// Confirms a paid booking.
///
/// Safe to call more than once for the same customer: the webhook and the
/// success redirect both end up here. A different customer gets 409.
#[post("/booksession")]
pub async fn post_book(
    pool: web::Data<Arc<PgPool>>,
    req: web::Json<BookSessionRequest>,
) -> Res<impl Responder> {
    let (outcome, session) =
        services::session::book_session(&pool, req.session_id, req.customer_id).await?;

    Success::ok(BookSessionResponse {
        session_id: session.session_id,
        customer_id: req.customer_id,
        already_booked: outcome == BookOutcome::AlreadyBooked,
    })
}

/// Current row with `lock` reported as it counts now.
#[get("/sessionstatus/{session_id}")]
pub async fn get_status(
    pool: web::Data<Arc<PgPool>>,
    config: web::Data<Arc<Config>>,
    path: web::Path<Uuid>,
) -> Res<impl Responder> {
    let ttl = config.payment.hold_ttl_seconds;
    let (session, hold_active) =
        services::session::session_status(&pool, path.into_inner(), ttl, Utc::now()).await?;

    Success::ok(SessionStatusResponse::from_row(
        session,
        hold_active,
        Duration::seconds(ttl),
    ))
}
