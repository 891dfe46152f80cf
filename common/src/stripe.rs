use std::collections::HashMap;

use stripe::{Client, CreateCustomer, Customer};
use uuid::Uuid;

use crate::{
    booking::APP_CUSTOMER_ID,
    error::{AppError, Res},
};

pub fn create_client(secret_key: &str) -> Client {
    Client::new(secret_key)
}

/// Creates a Stripe customer tagged with the FitNest customer id.
pub async fn create_customer(client: &Client, email: &str, app_customer_id: Uuid) -> Res<Customer> {
    let mut metadata = HashMap::new();
    metadata.insert(APP_CUSTOMER_ID.to_string(), app_customer_id.to_string());

    let params = CreateCustomer {
        email: Some(email),
        metadata: Some(metadata),
        ..Default::default()
    };

    Customer::create(client, params)
        .await
        .map_err(AppError::from)
}
