use actix_web::{HttpRequest, Responder, post, web};
use common::{
    error::{AppError, Res},
    http::Success,
};

use crate::{
    context::PayContext,
    dtos::pay::WebhookAck,
    services::{finalize::handle_webhook_signal, stripe::parse_webhook},
};

/// Stripe webhook endpoint.
///
/// An unverifiable event is answered with 400. A verified one is always
/// acknowledged; failures while acting on it are only logged so Stripe does
/// not retry into the same error.
#[post("")]
pub async fn post_webhook(
    ctx: web::Data<PayContext>,
    req: HttpRequest,
    payload: String,
) -> Res<impl Responder> {
    let signature = req
        .headers()
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    let signal = parse_webhook(&payload, signature, &ctx.settings.webhook_secret)?;
    handle_webhook_signal(&ctx, signal).await;

    Success::ok(WebhookAck { received: true })
}
