//! Client side of the booking gate.

use async_trait::async_trait;
use common::error::{AppError, Res};
use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalized {
    Booked,
    AlreadyBooked,
}

/// What the payment flow needs from whoever owns the session rows. `book`
/// must be idempotent per customer. `release` with a customer only clears
/// that customer's hold.
#[async_trait]
pub trait SessionGate: Send + Sync {
    async fn hold(&self, session_id: Uuid, customer_id: Uuid) -> Res<()>;
    async fn release(&self, session_id: Uuid, customer_id: Option<Uuid>) -> Res<()>;
    async fn book(&self, session_id: Uuid, customer_id: Uuid) -> Res<Finalized>;
    /// Price of the session in minor units, as stored on its row.
    async fn session_price(&self, session_id: Uuid) -> Res<i64>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionCustomerBody {
    session_id: Uuid,
    customer_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseBody {
    session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookBody {
    #[serde(default)]
    already_booked: bool,
}

/// The part of `sessionstatus` the payment flow reads.
#[derive(Debug, Deserialize)]
struct StatusBody {
    price: i64,
}

pub struct TrainerClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl TrainerClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        TrainerClient {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .request(method, format!("{}/{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.header("X-API-Key", key),
            None => request,
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Res<reqwest::Response> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        Self::checked(path, response).await
    }

    async fn get(&self, path: &str) -> Res<reqwest::Response> {
        let response = self.request(reqwest::Method::GET, path).send().await?;
        Self::checked(path, response).await
    }

    async fn checked(path: &str, response: reqwest::Response) -> Res<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        let message = upstream_message(&body)
            .unwrap_or_else(|| format!("Trainer service responded with {}", status));
        warn!("Trainer service {} failed with {}: {}", path, status, message);
        Err(AppError::Upstream { status, message })
    }
}

/// Pulls the human readable part out of an error body, whichever key the
/// service used for it.
fn upstream_message(body: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl SessionGate for TrainerClient {
    async fn hold(&self, session_id: Uuid, customer_id: Uuid) -> Res<()> {
        info!("Requesting hold on session {} for {}", session_id, customer_id);
        self.post(
            "holdsession",
            &SessionCustomerBody {
                session_id,
                customer_id,
            },
        )
        .await?;
        Ok(())
    }

    async fn release(&self, session_id: Uuid, customer_id: Option<Uuid>) -> Res<()> {
        self.post(
            "releasesession",
            &ReleaseBody {
                session_id,
                customer_id,
            },
        )
        .await?;
        Ok(())
    }

    async fn book(&self, session_id: Uuid, customer_id: Uuid) -> Res<Finalized> {
        let response = self
            .post(
                "booksession",
                &SessionCustomerBody {
                    session_id,
                    customer_id,
                },
            )
            .await?;
        let body = response.json::<BookBody>().await?;
        Ok(if body.already_booked {
            Finalized::AlreadyBooked
        } else {
            Finalized::Booked
        })
    }

    async fn session_price(&self, session_id: Uuid) -> Res<i64> {
        let response = self.get(&format!("sessionstatus/{}", session_id)).await?;
        Ok(response.json::<StatusBody>().await?.price)
    }
}
