use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::mapping::{ConnectedAccount, SessionPrice, StripeCustomer};

pub async fn get_stripe_customer<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    customer_id: Uuid,
) -> Res<Option<StripeCustomer>> {
    sqlx::query_as::<_, StripeCustomer>(
        "SELECT customer_id, stripe_customer_id, created_at FROM stripe_customers WHERE customer_id = $1",
    )
    .bind(customer_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// First writer wins: a concurrent first purchase keeps whichever Stripe
/// customer was stored first and returns it.
pub async fn insert_stripe_customer<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    customer_id: Uuid,
    stripe_customer_id: &str,
) -> Res<StripeCustomer> {
    sqlx::query_as::<_, StripeCustomer>(
        r#"
        INSERT INTO stripe_customers (customer_id, stripe_customer_id)
        VALUES ($1, $2)
        ON CONFLICT (customer_id) DO UPDATE SET customer_id = stripe_customers.customer_id
        RETURNING customer_id, stripe_customer_id, created_at
        "#,
    )
    .bind(customer_id)
    .bind(stripe_customer_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_session_price<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    session_id: Uuid,
) -> Res<Option<SessionPrice>> {
    sqlx::query_as::<_, SessionPrice>(
        "SELECT session_id, price_id, product_id, unit_amount, currency FROM stripe_session_prices WHERE session_id = $1",
    )
    .bind(session_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn insert_session_price<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    price: &SessionPrice,
) -> Res<SessionPrice> {
    sqlx::query_as::<_, SessionPrice>(
        r#"
        INSERT INTO stripe_session_prices (session_id, price_id, product_id, unit_amount, currency)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (session_id) DO UPDATE SET session_id = stripe_session_prices.session_id
        RETURNING session_id, price_id, product_id, unit_amount, currency
        "#,
    )
    .bind(price.session_id)
    .bind(&price.price_id)
    .bind(&price.product_id)
    .bind(price.unit_amount)
    .bind(&price.currency)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_connected_account<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Option<ConnectedAccount>> {
    sqlx::query_as::<_, ConnectedAccount>(
        "SELECT user_id, stripe_account_id, created_at, updated_at FROM stripe_connected_accounts WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn upsert_connected_account<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    stripe_account_id: &str,
) -> Res<ConnectedAccount> {
    sqlx::query_as::<_, ConnectedAccount>(
        r#"
        INSERT INTO stripe_connected_accounts (user_id, stripe_account_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE
            SET stripe_account_id = EXCLUDED.stripe_account_id, updated_at = now()
        RETURNING user_id, stripe_account_id, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(stripe_account_id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}
