use std::sync::Arc;

use async_trait::async_trait;
use common::error::Res;
use db::models::mapping::{ConnectedAccount, SessionPrice};
use sqlx::PgPool;
use uuid::Uuid;

/// FitNest ids mapped to the Stripe objects created for them.
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn stripe_customer(&self, customer_id: Uuid) -> Res<Option<String>>;
    /// Returns the id that ended up stored, which is the earlier one if two
    /// first purchases raced.
    async fn save_stripe_customer(&self, customer_id: Uuid, stripe_customer_id: &str) -> Res<String>;
    async fn session_price(&self, session_id: Uuid) -> Res<Option<SessionPrice>>;
    async fn save_session_price(&self, price: &SessionPrice) -> Res<SessionPrice>;
    async fn connected_account(&self, user_id: Uuid) -> Res<Option<String>>;
    async fn save_connected_account(&self, user_id: Uuid, stripe_account_id: &str) -> Res<ConnectedAccount>;
}

pub struct PgMappingStore {
    pool: Arc<PgPool>,
}

impl PgMappingStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        PgMappingStore { pool }
    }
}

#[async_trait]
impl MappingStore for PgMappingStore {
    async fn stripe_customer(&self, customer_id: Uuid) -> Res<Option<String>> {
        let row = db::mapping::get_stripe_customer(&*self.pool, customer_id).await?;
        Ok(row.map(|c| c.stripe_customer_id))
    }

    async fn save_stripe_customer(&self, customer_id: Uuid, stripe_customer_id: &str) -> Res<String> {
        let row = db::mapping::insert_stripe_customer(&*self.pool, customer_id, stripe_customer_id).await?;
        Ok(row.stripe_customer_id)
    }

    async fn session_price(&self, session_id: Uuid) -> Res<Option<SessionPrice>> {
        db::mapping::get_session_price(&*self.pool, session_id).await
    }

    async fn save_session_price(&self, price: &SessionPrice) -> Res<SessionPrice> {
        db::mapping::insert_session_price(&*self.pool, price).await
    }

    async fn connected_account(&self, user_id: Uuid) -> Res<Option<String>> {
        let row = db::mapping::get_connected_account(&*self.pool, user_id).await?;
        Ok(row.map(|a| a.stripe_account_id))
    }

    async fn save_connected_account(&self, user_id: Uuid, stripe_account_id: &str) -> Res<ConnectedAccount> {
        db::mapping::upsert_connected_account(&*self.pool, user_id, stripe_account_id).await
    }
}
