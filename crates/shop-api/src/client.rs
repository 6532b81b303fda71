//! # Payments Backend Client
//!
//! reqwest client for the storefront backend. Implements
//! `shop_core::PaymentsBackend` (`POST /payments/`,
//! `POST /payments/check/{id}`) and exposes the read-side endpoints used by
//! the `storefront` binary.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shop_core::{
    CheckoutError, CheckoutResult, ConfirmOrderRequest, CreateSessionRequest, MinorAmount,
    PaymentSession, PaymentsBackend,
};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

/// Item as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: u64,
    pub name: String,
    pub price: u64,
}

/// Customer as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: u64,
    pub stripe_id: String,
}

/// One purchased unit attached to a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedItemRecord {
    #[serde(default)]
    pub item: Option<ItemRecord>,
}

/// Payment as stored by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Payment intent id (`pi_...`)
    pub id: String,
    /// Whether the order for this payment was confirmed
    pub is_checked: bool,
    #[serde(default)]
    pub customer: Option<CustomerRecord>,
    #[serde(default)]
    pub purchased_items: Vec<PurchasedItemRecord>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// HTTP client for the payments backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    client: Client,
}

impl BackendClient {
    /// Create a client for `base_url` (e.g. `http://127.0.0.1:8000`)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CheckoutError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Payments recorded for a customer (`GET /payments/{customer_id}`)
    #[instrument(skip(self))]
    pub async fn payment_history(&self, customer_id: u64) -> CheckoutResult<Vec<PaymentRecord>> {
        let response = self
            .client
            .get(self.url(&format!("/payments/{}", customer_id)))
            .send()
            .await
            .map_err(network_error)?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(CheckoutError::MalformedResponse(format!(
                "HTTP {}: {}",
                status,
                error_detail(&body)
            )));
        }
        parse_json(&body)
    }

    /// Backend item record (`GET /items/{id}`); `None` when unknown
    #[instrument(skip(self))]
    pub async fn get_item(&self, item_id: u64) -> CheckoutResult<Option<ItemRecord>> {
        let response = self
            .client
            .get(self.url(&format!("/items/{}", item_id)))
            .send()
            .await
            .map_err(network_error)?;

        let (status, body) = read_body(response).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CheckoutError::MalformedResponse(format!(
                "HTTP {}: {}",
                status,
                error_detail(&body)
            )));
        }
        parse_json(&body)
    }

    /// Register a new customer (`POST /customers/`)
    #[instrument(skip(self))]
    pub async fn register_customer(&self) -> CheckoutResult<CustomerRecord> {
        let response = self
            .client
            .post(self.url("/customers/"))
            .send()
            .await
            .map_err(network_error)?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            return Err(CheckoutError::MalformedResponse(format!(
                "HTTP {}: {}",
                status,
                error_detail(&body)
            )));
        }

        let customer: CustomerRecord = parse_json(&body)?;
        info!("Registered customer {} ({})", customer.id, customer.stripe_id);
        Ok(customer)
    }
}

#[async_trait]
impl PaymentsBackend for BackendClient {
    #[instrument(skip(self, amount), fields(amount = %amount))]
    async fn create_session(
        &self,
        amount: MinorAmount,
        customer_id: u64,
    ) -> CheckoutResult<PaymentSession> {
        let request = CreateSessionRequest {
            amount,
            customer_id,
        };

        let response = self
            .client
            .post(self.url("/payments/"))
            .json(&request)
            .send()
            .await
            .map_err(network_error)?;

        let (status, body) = read_body(response).await?;
        if !status.is_success() {
            error!("Payment session error: status={}, body={}", status, body);
            return Err(CheckoutError::SessionRejected {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        let session: PaymentSession = parse_json(&body)?;
        session.validate()?;

        debug!(customer = %session.customer, "Payment session issued");
        Ok(session)
    }

    #[instrument(skip(self, items_id), fields(items = items_id.len()))]
    async fn confirm_order(
        &self,
        payment_intent_id: &str,
        items_id: &[u64],
        customer_id: u64,
    ) -> CheckoutResult<()> {
        let request = ConfirmOrderRequest {
            items_id: items_id.to_vec(),
            customer_id,
        };

        let response = self
            .client
            .post(self.url(&format!("/payments/check/{}", payment_intent_id)))
            .header("Idempotency-Key", payment_intent_id)
            .json(&request)
            .send()
            .await
            .map_err(network_error)?;

        let (status, body) = read_body(response).await?;
        if status != StatusCode::OK {
            error!("Order confirmation error: status={}, body={}", status, body);
            return Err(CheckoutError::ConfirmationRejected {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        info!("Order confirmed for {}", payment_intent_id);
        Ok(())
    }
}

fn network_error(e: reqwest::Error) -> CheckoutError {
    if e.is_timeout() {
        CheckoutError::Network(format!("request timed out: {}", e))
    } else {
        CheckoutError::Network(e.to_string())
    }
}

async fn read_body(response: reqwest::Response) -> CheckoutResult<(StatusCode, String)> {
    let status = response.status();
    let body = response.text().await.map_err(network_error)?;
    Ok((status, body))
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &str) -> CheckoutResult<T> {
    serde_json::from_str(body).map_err(|e| CheckoutError::MalformedResponse(e.to_string()))
}

/// `detail` of an error body, or the raw body
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => body.to_string(),
    }
}
