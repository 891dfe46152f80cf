//! In-memory stand-ins for the gate, Stripe and the mapping tables.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{
    booking::BookingMetadata,
    error::{AppError, Res},
};
use db::models::{
    mapping::{ConnectedAccount, SessionPrice},
    session::{BookOutcome, HoldOutcome, TrainerSession},
};
pub use db::models::session::fixtures::open_session;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use crate::{
    context::{PayContext, PaySettings},
    services::{
        gate::{Finalized, SessionGate},
        release::{ReleaseJob, ReleaseQueue},
        store::MappingStore,
        stripe::{CheckoutLink, CheckoutRequest, CheckoutSnapshot, Payments},
    },
};

fn conflict(message: &str) -> AppError {
    AppError::Upstream {
        status: 409,
        message: message.to_string(),
    }
}

/// Gate over a map of rows, applying the same transitions the database does.
#[derive(Default)]
pub struct MemoryGate {
    rows: Mutex<HashMap<Uuid, TrainerSession>>,
    failing_releases: AtomicUsize,
    release_calls: AtomicUsize,
    book_calls: AtomicUsize,
}

impl MemoryGate {
    pub fn insert(&self, session: TrainerSession) {
        self.rows.lock().unwrap().insert(session.session_id, session);
    }

    pub fn session(&self, id: Uuid) -> Option<TrainerSession> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn fail_next_releases(&self, n: usize) {
        self.failing_releases.store(n, Ordering::SeqCst);
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn book_calls(&self) -> usize {
        self.book_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionGate for MemoryGate {
    async fn hold(&self, session_id: Uuid, customer_id: Uuid) -> Res<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;
        match row.try_hold(customer_id, Utc::now(), Duration::seconds(1860)) {
            HoldOutcome::Held => Ok(()),
            HoldOutcome::AlreadyHeld => Err(conflict("Session is currently being booked")),
            HoldOutcome::AlreadyBooked => Err(conflict("Session already booked")),
        }
    }

    async fn release(&self, session_id: Uuid, customer_id: Option<Uuid>) -> Res<()> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_releases.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_releases.store(failing - 1, Ordering::SeqCst);
            return Err(AppError::Upstream {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        if let Some(row) = self.rows.lock().unwrap().get_mut(&session_id) {
            row.release_for(customer_id);
        }
        Ok(())
    }

    async fn book(&self, session_id: Uuid, customer_id: Uuid) -> Res<Finalized> {
        self.book_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;
        match row.book(customer_id) {
            BookOutcome::Booked => Ok(Finalized::Booked),
            BookOutcome::AlreadyBooked => Ok(Finalized::AlreadyBooked),
            BookOutcome::Conflict => Err(conflict("Session booked by another customer")),
        }
    }

    async fn session_price(&self, session_id: Uuid) -> Res<i64> {
        self.session(session_id)
            .map(|row| row.price)
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))
    }
}

#[derive(Default)]
pub struct FakePayments {
    checkouts: Mutex<Vec<CheckoutRequest>>,
    retrievable: Mutex<HashMap<String, CheckoutSnapshot>>,
    intents: Mutex<HashMap<String, BookingMetadata>>,
    customers: AtomicUsize,
    prices: AtomicUsize,
    fail: AtomicBool,
}

impl FakePayments {
    pub fn fail_checkouts(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn last_checkout(&self) -> Option<CheckoutRequest> {
        self.checkouts.lock().unwrap().last().cloned()
    }

    pub fn customers_created(&self) -> usize {
        self.customers.load(Ordering::SeqCst)
    }

    pub fn prices_created(&self) -> usize {
        self.prices.load(Ordering::SeqCst)
    }

    pub fn put_checkout(&self, snapshot: CheckoutSnapshot) {
        self.retrievable
            .lock()
            .unwrap()
            .insert(snapshot.id.clone(), snapshot);
    }

    pub fn put_intent_metadata(&self, id: &str, metadata: BookingMetadata) {
        self.intents.lock().unwrap().insert(id.to_string(), metadata);
    }
}

#[async_trait]
impl Payments for FakePayments {
    async fn create_customer(&self, _email: &str, _customer_id: Uuid) -> Res<String> {
        let n = self.customers.fetch_add(1, Ordering::SeqCst);
        Ok(format!("cus_test_{}", n))
    }

    async fn create_session_price(
        &self,
        _session_id: Uuid,
        _name: &str,
        _unit_amount: i64,
        _currency: &str,
    ) -> Res<(String, String)> {
        let n = self.prices.fetch_add(1, Ordering::SeqCst);
        Ok((format!("price_test_{}", n), format!("prod_test_{}", n)))
    }

    async fn create_checkout(&self, req: &CheckoutRequest) -> Res<CheckoutLink> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("stripe unavailable".to_string()));
        }
        let mut checkouts = self.checkouts.lock().unwrap();
        checkouts.push(req.clone());
        let id = format!("cs_test_{}", checkouts.len());
        Ok(CheckoutLink {
            url: format!("https://checkout.stripe.test/{}", id),
            id,
            expires_at: req.expires_at,
        })
    }

    async fn retrieve_checkout(&self, checkout_id: &str) -> Res<CheckoutSnapshot> {
        self.retrievable
            .lock()
            .unwrap()
            .get(checkout_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No such checkout session: {}", checkout_id)))
    }

    async fn payment_intent_metadata(&self, payment_intent_id: &str) -> Res<Option<BookingMetadata>> {
        Ok(self.intents.lock().unwrap().get(payment_intent_id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    customers: Mutex<HashMap<Uuid, String>>,
    prices: Mutex<HashMap<Uuid, SessionPrice>>,
    accounts: Mutex<HashMap<Uuid, String>>,
}

impl MemoryStore {
    pub async fn put_price(&self, session_id: Uuid, price_id: &str, unit_amount: i64) {
        self.save_session_price(&SessionPrice {
            session_id,
            price_id: price_id.to_string(),
            product_id: format!("prod_for_{}", price_id),
            unit_amount,
            currency: "usd".to_string(),
        })
        .await
        .unwrap();
    }
}

#[async_trait]
impl MappingStore for MemoryStore {
    async fn stripe_customer(&self, customer_id: Uuid) -> Res<Option<String>> {
        Ok(self.customers.lock().unwrap().get(&customer_id).cloned())
    }

    async fn save_stripe_customer(&self, customer_id: Uuid, stripe_customer_id: &str) -> Res<String> {
        Ok(self
            .customers
            .lock()
            .unwrap()
            .entry(customer_id)
            .or_insert_with(|| stripe_customer_id.to_string())
            .clone())
    }

    async fn session_price(&self, session_id: Uuid) -> Res<Option<SessionPrice>> {
        Ok(self.prices.lock().unwrap().get(&session_id).cloned())
    }

    async fn save_session_price(&self, price: &SessionPrice) -> Res<SessionPrice> {
        Ok(self
            .prices
            .lock()
            .unwrap()
            .entry(price.session_id)
            .or_insert_with(|| price.clone())
            .clone())
    }

    async fn connected_account(&self, user_id: Uuid) -> Res<Option<String>> {
        Ok(self.accounts.lock().unwrap().get(&user_id).cloned())
    }

    async fn save_connected_account(&self, user_id: Uuid, stripe_account_id: &str) -> Res<ConnectedAccount> {
        self.accounts
            .lock()
            .unwrap()
            .insert(user_id, stripe_account_id.to_string());
        let now = Utc::now();
        Ok(ConnectedAccount {
            user_id,
            stripe_account_id: stripe_account_id.to_string(),
            created_at: now,
            updated_at: now,
        })
    }
}

pub fn test_settings() -> PaySettings {
    PaySettings {
        domain: "https://fitnest.test".to_string(),
        payment_service_base_url: "https://pay.fitnest.test".to_string(),
        webhook_secret: "whsec_test".to_string(),
        application_fee_percent: 10,
        checkout_expiry_seconds: 1860,
        currency: "usd".to_string(),
    }
}

pub struct TestContext {
    pub ctx: PayContext,
    pub gate: Arc<MemoryGate>,
    pub payments: Arc<FakePayments>,
    pub store: Arc<MemoryStore>,
    /// Receiving end of the release queue; nothing drains it automatically.
    pub releases: UnboundedReceiver<ReleaseJob>,
}

pub fn test_context() -> TestContext {
    let gate = Arc::new(MemoryGate::default());
    let payments = Arc::new(FakePayments::default());
    let store = Arc::new(MemoryStore::default());
    let (queue, releases) = ReleaseQueue::channel();

    let ctx = PayContext {
        gate: gate.clone(),
        payments: payments.clone(),
        store: store.clone(),
        releases: queue,
        settings: test_settings(),
    };

    TestContext {
        ctx,
        gate,
        payments,
        store,
        releases,
    }
}
