use actix_web::{Responder, post, web};
use chrono::Utc;
use common::{error::Res, http::Success};

use crate::{
    context::PayContext,
    dtos::pay::{
        ConnectedAccountRequest, ConnectedAccountResponse, SessionPaymentRequest,
        SessionPriceRequest, SessionPriceResponse,
    },
    services::{checkout, price},
};

/// Starts a Stripe Checkout for one trainer session.
///
/// # Input
/// - `sessionId`, `customer_id`, `user_id` (the trainer), `email`
/// - optional `redirect` on the frontend domain
///
/// # Output
/// - 200 `{url}` with the hosted checkout page
/// - 200 `{error}` when the session has no price or the trainer no payout account
/// - the gate's status and message when the hold is refused
#[post("")]
pub async fn post_session_payment(
    ctx: web::Data<PayContext>,
    req: web::Json<SessionPaymentRequest>,
) -> Res<impl Responder> {
    let outcome = checkout::start_checkout(&ctx, &req, Utc::now()).await?;
    Success::ok(outcome)
}

/// Creates the Stripe price for a session on first call, returns it afterwards.
/// Mounted behind the service key.
pub async fn post_session_price(
    ctx: web::Data<PayContext>,
    req: web::Json<SessionPriceRequest>,
) -> Res<impl Responder> {
    let price = price::ensure_session_price(&ctx, &req).await?;
    Success::ok(SessionPriceResponse {
        session_id: price.session_id,
        price_id: price.price_id,
        product_id: price.product_id,
        unit_amount: price.unit_amount,
        currency: price.currency,
    })
}

/// Mounted behind the service key.
pub async fn post_connected_account(
    ctx: web::Data<PayContext>,
    req: web::Json<ConnectedAccountRequest>,
) -> Res<impl Responder> {
    let account = price::register_connected_account(&ctx, &req).await?;
    Success::ok(ConnectedAccountResponse {
        user_id: account.user_id,
        stripe_account_id: account.stripe_account_id,
    })
}
