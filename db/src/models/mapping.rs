use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct StripeCustomer {
    pub customer_id: Uuid,
    pub stripe_customer_id: String,
    pub created_at: DateTime<Utc>,
}

/// Stripe Product/Price created once per trainer session.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct SessionPrice {
    pub session_id: Uuid,
    pub price_id: String,
    pub product_id: String,
    pub unit_amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ConnectedAccount {
    pub user_id: Uuid,
    pub stripe_account_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
