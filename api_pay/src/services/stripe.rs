//! Everything that talks to Stripe.

use async_trait::async_trait;
use common::{
    booking::BookingMetadata,
    error::{AppError, Res},
};
use log::{error, info};
use serde_json::Value;
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus,
    CheckoutSessionStatus, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionPaymentIntentData, CreateCheckoutSessionPaymentIntentDataTransferData,
    CreatePrice, CreateProduct, Currency, CustomerId, Event, EventObject, EventType, IdOrCreate,
    PaymentIntent, PaymentIntentId, Price, Product, Webhook,
};
use uuid::Uuid;

/// Input for one hosted checkout of a single trainer session.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub stripe_customer_id: String,
    pub price_id: String,
    pub application_fee: i64,
    pub destination_account: String,
    pub metadata: BookingMetadata,
    pub success_url: String,
    pub cancel_url: String,
    /// Unix seconds.
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutLink {
    pub id: String,
    pub url: String,
    pub expires_at: i64,
}

/// The parts of a Checkout Session the booking flow reads back.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSnapshot {
    pub id: String,
    pub paid: bool,
    pub complete: bool,
    pub metadata: Option<BookingMetadata>,
    pub payment_intent_id: Option<String>,
}

impl From<&CheckoutSession> for CheckoutSnapshot {
    fn from(session: &CheckoutSession) -> Self {
        let intent = session.payment_intent.as_ref();
        let intent_metadata = intent.and_then(|pi| pi.as_object()).map(|pi| &pi.metadata);

        CheckoutSnapshot {
            id: session.id.to_string(),
            paid: session.payment_status == CheckoutSessionPaymentStatus::Paid,
            complete: session.status == Some(CheckoutSessionStatus::Complete),
            metadata: BookingMetadata::from_maps(session.metadata.as_ref(), intent_metadata),
            payment_intent_id: intent.map(|pi| pi.id().to_string()),
        }
    }
}

#[async_trait]
pub trait Payments: Send + Sync {
    /// Returns the Stripe customer id.
    async fn create_customer(&self, email: &str, customer_id: Uuid) -> Res<String>;
    /// Creates a Product and a one-off Price for it; returns `(price_id, product_id)`.
    async fn create_session_price(
        &self,
        session_id: Uuid,
        name: &str,
        unit_amount: i64,
        currency: &str,
    ) -> Res<(String, String)>;
    async fn create_checkout(&self, req: &CheckoutRequest) -> Res<CheckoutLink>;
    async fn retrieve_checkout(&self, checkout_id: &str) -> Res<CheckoutSnapshot>;
    async fn payment_intent_metadata(&self, payment_intent_id: &str) -> Res<Option<BookingMetadata>>;
}

pub struct StripePayments {
    client: Client,
}

impl StripePayments {
    pub fn new(secret_key: &str) -> Self {
        StripePayments {
            client: common::stripe::create_client(secret_key),
        }
    }
}

fn parse_currency(currency: &str) -> Res<Currency> {
    serde_json::from_value(Value::String(currency.to_lowercase()))
        .map_err(|_| AppError::BadRequest(format!("Unsupported currency: {}", currency)))
}

#[async_trait]
impl Payments for StripePayments {
    async fn create_customer(&self, email: &str, customer_id: Uuid) -> Res<String> {
        let customer = common::stripe::create_customer(&self.client, email, customer_id).await?;
        info!("Created Stripe customer {} for {}", customer.id, customer_id);
        Ok(customer.id.to_string())
    }

    async fn create_session_price(
        &self,
        session_id: Uuid,
        name: &str,
        unit_amount: i64,
        currency: &str,
    ) -> Res<(String, String)> {
        let currency = parse_currency(currency)?;
        let metadata = [(common::booking::TRAINER_SESSION_ID.to_string(), session_id.to_string())]
            .into_iter()
            .collect();

        let mut product_params = CreateProduct::new(name);
        product_params.metadata = Some(metadata);
        let product = Product::create(&self.client, product_params).await?;

        let mut price_params = CreatePrice::new(currency);
        price_params.product = Some(IdOrCreate::Id(&product.id));
        price_params.unit_amount = Some(unit_amount);
        let price = Price::create(&self.client, price_params).await?;

        Ok((price.id.to_string(), product.id.to_string()))
    }

    async fn create_checkout(&self, req: &CheckoutRequest) -> Res<CheckoutLink> {
        let customer = req.stripe_customer_id.parse::<CustomerId>().map_err(|e| {
            AppError::Internal(format!(
                "Failed to parse customer id: {}. {}",
                req.stripe_customer_id, e
            ))
        })?;
        let metadata = req.metadata.to_metadata();

        let params = CreateCheckoutSession {
            line_items: Some(vec![CreateCheckoutSessionLineItems {
                price: Some(req.price_id.clone()),
                quantity: Some(1),
                ..Default::default()
            }]),
            mode: Some(CheckoutSessionMode::Payment),
            customer: Some(customer),
            success_url: Some(req.success_url.as_str()),
            cancel_url: Some(req.cancel_url.as_str()),
            expires_at: Some(req.expires_at),
            metadata: Some(metadata.clone()),
            payment_intent_data: Some(CreateCheckoutSessionPaymentIntentData {
                application_fee_amount: Some(req.application_fee),
                metadata: Some(metadata),
                transfer_data: Some(CreateCheckoutSessionPaymentIntentDataTransferData {
                    amount: None,
                    destination: req.destination_account.clone(),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let session = CheckoutSession::create(&self.client, params).await?;
        let url = session.url.clone().ok_or_else(|| {
            AppError::Internal(format!("Checkout session {} has no url", session.id))
        })?;

        Ok(CheckoutLink {
            id: session.id.to_string(),
            url,
            expires_at: session.expires_at,
        })
    }

    async fn retrieve_checkout(&self, checkout_id: &str) -> Res<CheckoutSnapshot> {
        let id = checkout_id
            .parse::<CheckoutSessionId>()
            .map_err(|e| AppError::BadRequest(format!("Invalid checkout session id: {}", e)))?;
        let session = CheckoutSession::retrieve(&self.client, &id, &["payment_intent"]).await?;
        Ok(CheckoutSnapshot::from(&session))
    }

    async fn payment_intent_metadata(&self, payment_intent_id: &str) -> Res<Option<BookingMetadata>> {
        let id = payment_intent_id
            .parse::<PaymentIntentId>()
            .map_err(|e| AppError::Internal(format!("Invalid payment intent id: {}", e)))?;
        let intent = PaymentIntent::retrieve(&self.client, &id, &[]).await?;
        Ok(BookingMetadata::from_map(&intent.metadata))
    }
}

/// What a verified webhook event means for the booking flow.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookSignal {
    /// Checkout finished; `paid` on the snapshot says whether money moved.
    Completed(CheckoutSnapshot),
    /// Checkout expired or its delayed payment failed.
    Abandoned(CheckoutSnapshot),
    IntentFailed {
        payment_intent_id: String,
        metadata: Option<BookingMetadata>,
    },
    Ignored(String),
}

/// Verifies the signature and builds the event.
pub fn construct_event(payload: &str, signature: &str, webhook_secret: &str) -> Res<Event> {
    match Webhook::construct_event(payload, signature, webhook_secret) {
        Ok(event) => Ok(event),
        Err(e) => {
            error!("Error constructing webhook event: {}", e);
            Err(AppError::BadRequest(format!("Webhook Error: {}", e)))
        }
    }
}

/// Classifies a verified event.
pub fn classify_event(event: Event) -> WebhookSignal {
    info!("Processing webhook event: {}", event.type_);

    match (event.type_, event.data.object) {
        (
            EventType::CheckoutSessionCompleted | EventType::CheckoutSessionAsyncPaymentSucceeded,
            EventObject::CheckoutSession(session),
        ) => WebhookSignal::Completed(CheckoutSnapshot::from(&session)),
        (
            EventType::CheckoutSessionExpired | EventType::CheckoutSessionAsyncPaymentFailed,
            EventObject::CheckoutSession(session),
        ) => WebhookSignal::Abandoned(CheckoutSnapshot::from(&session)),
        (
            EventType::PaymentIntentPaymentFailed | EventType::PaymentIntentCanceled,
            EventObject::PaymentIntent(intent),
        ) => WebhookSignal::IntentFailed {
            payment_intent_id: intent.id.to_string(),
            metadata: BookingMetadata::from_map(&intent.metadata),
        },
        (other, _) => WebhookSignal::Ignored(other.to_string()),
    }
}

pub fn parse_webhook(payload: &str, signature: &str, webhook_secret: &str) -> Res<WebhookSignal> {
    construct_event(payload, signature, webhook_secret).map(classify_event)
}
