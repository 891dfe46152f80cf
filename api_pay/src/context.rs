use std::{sync::Arc, time::Duration};

use common::env_config::Config;
use sqlx::PgPool;

use crate::services::{
    gate::{SessionGate, TrainerClient},
    release::{ReleasePolicy, ReleaseQueue},
    store::{MappingStore, PgMappingStore},
    stripe::{Payments, StripePayments},
};

/// Values the payment routes read from `Config`, copied out so the flow can
/// be driven without a full environment.
#[derive(Clone, Debug)]
pub struct PaySettings {
    pub domain: String,
    pub payment_service_base_url: String,
    pub webhook_secret: String,
    pub application_fee_percent: i64,
    pub checkout_expiry_seconds: i64,
    pub currency: String,
}

impl PaySettings {
    pub fn from_config(config: &Config) -> Self {
        PaySettings {
            domain: config.domain.clone(),
            payment_service_base_url: config.payment_service_base_url.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
            application_fee_percent: config.payment.application_fee_percent,
            checkout_expiry_seconds: config.payment.checkout_expiry_seconds,
            currency: config.payment.currency.clone(),
        }
    }
}

/// Everything a payment handler talks to.
#[derive(Clone)]
pub struct PayContext {
    pub gate: Arc<dyn SessionGate>,
    pub payments: Arc<dyn Payments>,
    pub store: Arc<dyn MappingStore>,
    pub releases: ReleaseQueue,
    pub settings: PaySettings,
}

impl PayContext {
    /// Wires the real gate client, Stripe and Postgres, and starts the release
    /// worker. Must be called from within a tokio runtime.
    pub fn production(config: &Config, pool: Arc<PgPool>) -> Self {
        let gate: Arc<dyn SessionGate> = Arc::new(TrainerClient::new(
            config.trainer_service_url.clone(),
            config.service_api_keys.first().cloned(),
        ));
        let releases = ReleaseQueue::spawn(
            Arc::clone(&gate),
            ReleasePolicy {
                max_attempts: config.payment.release_max_attempts,
                retry_delay: Duration::from_millis(config.payment.release_retry_delay_ms),
            },
        );

        PayContext {
            gate,
            payments: Arc::new(StripePayments::new(&config.stripe_secret_key)),
            store: Arc::new(PgMappingStore::new(pool)),
            releases,
            settings: PaySettings::from_config(config),
        }
    }
}
