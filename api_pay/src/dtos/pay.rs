use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /sessionpayment`. The frontend sends `sessionId` camel cased
/// and the rest snake cased.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionPaymentRequest {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    pub customer_id: Uuid,
    /// The trainer who owns the session and receives the payout.
    pub user_id: Uuid,
    pub email: String,
    /// Where the browser goes after checkout; falls back to the domain.
    #[serde(default)]
    pub redirect: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPriceRequest {
    pub session_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPriceResponse {
    pub session_id: Uuid,
    pub price_id: String,
    pub product_id: String,
    pub unit_amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedAccountRequest {
    pub user_id: Uuid,
    pub stripe_account_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedAccountResponse {
    pub user_id: Uuid,
    pub stripe_account_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub cs: String,
    pub redirect: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    #[serde(rename = "customerId")]
    pub customer_id: Option<Uuid>,
    pub redirect: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}
