use chrono::{DateTime, Utc};
use common::{
    booking::{BookingMetadata, application_fee},
    error::{AppError, Res},
    misc::safe_redirect,
};
use log::{error, info, warn};
use serde::Serialize;
use url::form_urlencoded::byte_serialize;
use uuid::Uuid;

use crate::{
    context::{PayContext, PaySettings},
    dtos::pay::SessionPaymentRequest,
    services::stripe::CheckoutRequest,
};

pub const PRICE_NOT_FOUND: &str = "Price ID not found for this plan";
pub const ACCOUNT_NOT_FOUND: &str = "Trainer payment account not found";

/// Either a place to send the browser or a business reason why not. Both are
/// answered with 200.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CheckoutOutcome {
    Redirect { url: String },
    Unavailable { error: String },
}

/// Holds the session, then builds a Stripe Checkout for it.
///
/// Once the hold is taken, every way out other than a created checkout queues
/// a release before returning.
pub async fn start_checkout(
    ctx: &PayContext,
    req: &SessionPaymentRequest,
    now: DateTime<Utc>,
) -> Res<CheckoutOutcome> {
    if req.email.trim().is_empty() {
        return Err(AppError::BadRequest("email is required".to_string()));
    }

    ctx.gate.hold(req.session_id, req.customer_id).await?;

    match checkout_after_hold(ctx, req, now).await {
        Ok(CheckoutOutcome::Redirect { url }) => Ok(CheckoutOutcome::Redirect { url }),
        Ok(unavailable) => {
            ctx.releases.enqueue(req.session_id, Some(req.customer_id));
            Ok(unavailable)
        }
        Err(e) => {
            error!(
                "Checkout for session {} failed after hold, releasing: {}",
                req.session_id, e
            );
            ctx.releases.enqueue(req.session_id, Some(req.customer_id));
            Err(e)
        }
    }
}

async fn checkout_after_hold(
    ctx: &PayContext,
    req: &SessionPaymentRequest,
    now: DateTime<Utc>,
) -> Res<CheckoutOutcome> {
    let stripe_customer_id = match ctx.store.stripe_customer(req.customer_id).await? {
        Some(id) => id,
        None => {
            let created = ctx
                .payments
                .create_customer(req.email.trim(), req.customer_id)
                .await?;
            ctx.store
                .save_stripe_customer(req.customer_id, &created)
                .await?
        }
    };

    let Some(price) = ctx.store.session_price(req.session_id).await? else {
        warn!("No Stripe price for session {}", req.session_id);
        return Ok(CheckoutOutcome::Unavailable {
            error: PRICE_NOT_FOUND.to_string(),
        });
    };

    let Some(destination_account) = ctx.store.connected_account(req.user_id).await? else {
        warn!("No connected account for trainer {}", req.user_id);
        return Ok(CheckoutOutcome::Unavailable {
            error: ACCOUNT_NOT_FOUND.to_string(),
        });
    };

    let settings = &ctx.settings;
    let redirect = safe_redirect(req.redirect.as_deref(), &settings.domain);
    let checkout = CheckoutRequest {
        stripe_customer_id,
        price_id: price.price_id,
        application_fee: application_fee(price.unit_amount, settings.application_fee_percent),
        destination_account,
        metadata: BookingMetadata {
            trainer_session_id: req.session_id,
            app_customer_id: req.customer_id,
            trainer_user_id: Some(req.user_id),
        },
        success_url: success_url(settings, &redirect),
        cancel_url: cancel_url(settings, req.session_id, req.customer_id, &redirect),
        expires_at: now.timestamp() + settings.checkout_expiry_seconds,
    };

    let link = ctx.payments.create_checkout(&checkout).await?;
    info!(
        "Checkout {} created for session {} (customer {}), expires at {}",
        link.id, req.session_id, req.customer_id, link.expires_at
    );
    Ok(CheckoutOutcome::Redirect { url: link.url })
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

/// `{CHECKOUT_SESSION_ID}` is left literal; Stripe substitutes it.
fn success_url(settings: &PaySettings, redirect: &str) -> String {
    format!(
        "{}/sessionpayment/success?cs={{CHECKOUT_SESSION_ID}}&redirect={}",
        settings.payment_service_base_url,
        encode(redirect)
    )
}

/// Names the holder so a late cancel cannot clear someone else's hold.
fn cancel_url(settings: &PaySettings, session_id: Uuid, customer_id: Uuid, redirect: &str) -> String {
    format!(
        "{}/sessionpayment/cancel?sessionId={}&customerId={}&redirect={}",
        settings.payment_service_base_url,
        session_id,
        customer_id,
        encode(redirect)
    )
}
