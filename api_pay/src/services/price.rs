use common::error::{AppError, Res};
use db::models::mapping::{ConnectedAccount, SessionPrice};
use log::info;

use crate::{
    context::PayContext,
    dtos::pay::{ConnectedAccountRequest, SessionPriceRequest},
};

/// Returns the Stripe Price for a session, creating Product and Price the
/// first time. The amount is the session row's price; later calls return the
/// stored mapping untouched.
pub async fn ensure_session_price(ctx: &PayContext, req: &SessionPriceRequest) -> Res<SessionPrice> {
    if let Some(existing) = ctx.store.session_price(req.session_id).await? {
        return Ok(existing);
    }
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }

    let unit_amount = ctx.gate.session_price(req.session_id).await?;
    if unit_amount <= 0 {
        return Err(AppError::BadRequest(format!(
            "Session {} has no positive price",
            req.session_id
        )));
    }

    let currency = req
        .currency
        .clone()
        .unwrap_or_else(|| ctx.settings.currency.clone())
        .to_lowercase();
    let (price_id, product_id) = ctx
        .payments
        .create_session_price(req.session_id, req.name.trim(), unit_amount, &currency)
        .await?;
    info!(
        "Created price {} for session {} at {} {}",
        price_id, req.session_id, unit_amount, currency
    );

    ctx.store
        .save_session_price(&SessionPrice {
            session_id: req.session_id,
            price_id,
            product_id,
            unit_amount,
            currency,
        })
        .await
}

pub async fn register_connected_account(
    ctx: &PayContext,
    req: &ConnectedAccountRequest,
) -> Res<ConnectedAccount> {
    let account = req.stripe_account_id.trim();
    if !account.starts_with("acct_") {
        return Err(AppError::BadRequest(format!(
            "Invalid Stripe account id: {}",
            account
        )));
    }
    ctx.store.save_connected_account(req.user_id, account).await
}
