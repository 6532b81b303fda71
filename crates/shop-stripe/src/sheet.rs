//! # Stripe Payment Sheet
//!
//! `PaymentSheet` implementation backed by Stripe's client-side PaymentIntent
//! endpoints. Initialization retrieves the intent with the publishable key and
//! client secret; presenting confirms it with the configured payment method.
//!
//! Only `succeeded` counts as paid. A `processing` payment is re-checked for
//! a while; if it has not settled, `present` fails with code `Processing` and
//! the next `present` checks the same intent again instead of re-confirming.

use crate::config::StripeConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use shop_core::{
    derive_payment_intent_id, CheckoutError, CheckoutResult, PaymentSheet, SheetError,
    SheetParams,
};
use std::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Sheet state between `initialize` and `present`
#[derive(Debug, Clone)]
struct PreparedIntent {
    intent_id: String,
    client_secret: String,
    merchant_display_name: String,
    /// Confirmation was sent and the payment was still processing
    confirmed: bool,
}

/// Stripe payment sheet
pub struct StripePaymentSheet {
    config: StripeConfig,
    client: Client,
    prepared: Mutex<Option<PreparedIntent>>,
}

impl StripePaymentSheet {
    /// Create a new Stripe payment sheet
    pub fn new(config: StripeConfig) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CheckoutError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            prepared: Mutex::new(None),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> CheckoutResult<Self> {
        let config = StripeConfig::from_env()?;
        Self::new(config)
    }

    /// Whether `initialize` succeeded and the sheet has not been used yet
    pub fn is_ready(&self) -> bool {
        self.prepared
            .lock()
            .map(|p| p.is_some())
            .unwrap_or(false)
    }

    fn set_prepared(&self, value: Option<PreparedIntent>) {
        if let Ok(mut prepared) = self.prepared.lock() {
            *prepared = value;
        }
    }

    fn prepared(&self) -> Option<PreparedIntent> {
        self.prepared.lock().ok().and_then(|p| p.clone())
    }

    async fn retrieve_intent(
        &self,
        intent_id: &str,
        client_secret: &str,
    ) -> Result<StripePaymentIntent, SheetError> {
        let url = format!(
            "{}/v1/payment_intents/{}",
            self.config.api_base_url, intent_id
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .query(&[("client_secret", client_secret)])
            .send()
            .await
            .map_err(network_error)?;

        parse_intent_response(response).await
    }

    async fn confirm_intent(
        &self,
        prepared: &PreparedIntent,
    ) -> Result<StripePaymentIntent, SheetError> {
        let url = format!(
            "{}/v1/payment_intents/{}/confirm",
            self.config.api_base_url, prepared.intent_id
        );

        let form_params = [
            ("client_secret", prepared.client_secret.as_str()),
            ("payment_method", self.config.payment_method.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .form(&form_params)
            .send()
            .await
            .map_err(network_error)?;

        parse_intent_response(response).await
    }

    /// Re-check a `processing` intent until it settles or the checks run out
    async fn wait_while_processing(
        &self,
        mut intent: StripePaymentIntent,
        prepared: &PreparedIntent,
    ) -> Result<StripePaymentIntent, SheetError> {
        let mut checks = 0;
        while intent.status == "processing" && checks < self.config.processing_checks {
            checks += 1;
            debug!(intent = %intent.id, check = checks, "Payment processing");
            tokio::time::sleep(self.config.processing_interval).await;
            intent = self
                .retrieve_intent(&prepared.intent_id, &prepared.client_secret)
                .await?;
        }
        Ok(intent)
    }
}

#[async_trait]
impl PaymentSheet for StripePaymentSheet {
    #[instrument(skip(self, params), fields(customer = %params.customer_id))]
    async fn initialize(&self, params: SheetParams) -> Result<(), SheetError> {
        self.set_prepared(None);

        if params.allows_delayed_payment_methods {
            return Err(SheetError::new(
                "Failed",
                "Delayed payment methods are not supported",
            ));
        }
        if params.customer_id.is_empty() || params.customer_ephemeral_key_secret.is_empty() {
            return Err(SheetError::new(
                "Failed",
                "Customer id and ephemeral key are required",
            ));
        }

        let client_secret = params.payment_intent_client_secret;
        if !client_secret.contains("_secret_") {
            return Err(SheetError::new(
                "Failed",
                "paymentIntentClientSecret is not a client secret",
            ));
        }
        let intent_id = derive_payment_intent_id(&client_secret)
            .map_err(|e| SheetError::new("Failed", e.to_string()))?;

        let intent = self.retrieve_intent(&intent_id, &client_secret).await?;
        match intent.status.as_str() {
            "requires_payment_method" | "requires_confirmation" | "requires_action" => {}
            "canceled" => return Err(SheetError::canceled()),
            other => {
                return Err(SheetError::new(
                    "Failed",
                    format!("PaymentIntent is in terminal state `{}`", other),
                ))
            }
        }

        debug!(
            intent = %intent.id,
            amount = intent.amount,
            currency = %intent.currency,
            "Payment sheet ready"
        );

        self.set_prepared(Some(PreparedIntent {
            intent_id: intent.id,
            client_secret,
            merchant_display_name: params.merchant_display_name,
            confirmed: false,
        }));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn present(&self) -> Result<(), SheetError> {
        let prepared = self.prepared().ok_or_else(|| {
            SheetError::new("NotInitialized", "The payment sheet has not been initialized")
        })?;

        // Never confirm twice while a previous confirmation may still capture
        let mut intent = if prepared.confirmed {
            self.retrieve_intent(&prepared.intent_id, &prepared.client_secret)
                .await?
        } else {
            self.confirm_intent(&prepared).await?
        };
        if prepared.confirmed
            && matches!(
                intent.status.as_str(),
                "requires_payment_method" | "requires_confirmation"
            )
        {
            intent = self.confirm_intent(&prepared).await?;
        }
        let intent = self.wait_while_processing(intent, &prepared).await?;

        match intent.status.as_str() {
            "succeeded" => {
                info!(
                    intent = %intent.id,
                    merchant = %prepared.merchant_display_name,
                    "Payment completed"
                );
                self.set_prepared(None);
                Ok(())
            }
            "processing" => {
                warn!(intent = %intent.id, "Payment still processing");
                self.set_prepared(Some(PreparedIntent {
                    confirmed: true,
                    ..prepared
                }));
                Err(SheetError::new(
                    "Processing",
                    "The payment is still processing. Check again shortly.",
                ))
            }
            "canceled" => Err(SheetError::canceled()),
            "requires_action" => Err(SheetError::new(
                "Failed",
                "The payment requires additional authentication",
            )),
            _ => Err(intent
                .last_payment_error
                .map(|e| {
                    SheetError::new(
                        e.code.unwrap_or_else(|| "Failed".to_string()),
                        e.message.unwrap_or_else(|| "The payment failed".to_string()),
                    )
                })
                .unwrap_or_else(|| {
                    SheetError::new("Failed", format!("Unexpected status `{}`", intent.status))
                })),
        }
    }

    fn provider_name(&self) -> &'static str {
        "stripe"
    }
}

fn network_error(e: reqwest::Error) -> SheetError {
    if e.is_timeout() {
        SheetError::new("Timeout", e.to_string())
    } else {
        SheetError::new("Failed", e.to_string())
    }
}

async fn parse_intent_response(
    response: reqwest::Response,
) -> Result<StripePaymentIntent, SheetError> {
    let status = response.status();
    let body = response.text().await.map_err(network_error)?;

    if !status.is_success() {
        error!("Stripe API error: status={}, body={}", status, body);

        if let Ok(error_response) = serde_json::from_str::<StripeErrorResponse>(&body) {
            let err = error_response.error;
            return Err(SheetError::new(
                err.code.unwrap_or_else(|| "Failed".to_string()),
                err.message.unwrap_or_else(|| format!("HTTP {}", status)),
            ));
        }

        return Err(SheetError::new("Failed", format!("HTTP {}: {}", status, body)));
    }

    serde_json::from_str(&body).map_err(|e| {
        SheetError::new("Failed", format!("Failed to parse Stripe response: {}", e))
    })
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    status: String,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    last_payment_error: Option<StripeError>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &str = "pi_3Mtw_secret_YrKJ";

    fn params() -> SheetParams {
        SheetParams {
            merchant_display_name: "Example, Inc.".to_string(),
            customer_id: "cus_y".to_string(),
            customer_ephemeral_key_secret: "ek_test_x".to_string(),
            payment_intent_client_secret: SECRET.to_string(),
            allows_delayed_payment_methods: false,
        }
    }

    fn sheet(server: &MockServer) -> StripePaymentSheet {
        StripePaymentSheet::new(StripeConfig::new("pk_test_abc").with_api_base_url(server.uri()))
            .unwrap()
    }

    async fn mount_intent(server: &MockServer, status: &str) {
        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_3Mtw"))
            .and(query_param("client_secret", SECRET))
            .and(header("Authorization", "Bearer pk_test_abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_3Mtw",
                "status": status,
                "amount": 120000,
                "currency": "eur"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_initialize_and_present() {
        let server = MockServer::start().await;
        mount_intent(&server, "requires_payment_method").await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents/pi_3Mtw/confirm"))
            .and(body_string_contains("payment_method=pm_card_visa"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "pi_3Mtw",
                "status": "succeeded",
                "amount": 120000,
                "currency": "eur"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sheet = sheet(&server);
        sheet.initialize(params()).await.unwrap();
        assert!(sheet.is_ready());

        sheet.present().await.unwrap();
        assert!(!sheet.is_ready());
    }

    #[tokio::test]
    async fn test_present_before_initialize() {
        let server = MockServer::start().await;
        let err = sheet(&server).present().await.unwrap_err();
        assert_eq!(err.code, "NotInitialized");
    }

    #[tokio::test]
    async fn test_card_declined() {
        let server = MockServer::start().await;
        mount_intent(&server, "requires_payment_method").await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents/pi_3Mtw/confirm"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": {
                    "type": "card_error",
                    "code": "card_declined",
                    "message": "Your card was declined."
                }
            })))
            .mount(&server)
            .await;

        let sheet = sheet(&server);
        sheet.initialize(params()).await.unwrap();
        let err = sheet.present().await.unwrap_err();

        assert_eq!(err.code, "card_declined");
        assert_eq!(err.message, "Your card was declined.");
        // Still prepared, so the user can try again
        assert!(sheet.is_ready());
    }

    #[tokio::test]
    async fn test_canceled_intent() {
        let server = MockServer::start().await;
        mount_intent(&server, "canceled").await;

        let err = sheet(&server).initialize(params()).await.unwrap_err();
        assert_eq!(err, SheetError::canceled());
    }

    #[tokio::test]
    async fn test_initialize_rejects_bad_secret() {
        let server = MockServer::start().await;
        let mut bad = params();
        bad.payment_intent_client_secret = "pi_3Mtw".to_string();

        let err = sheet(&server).initialize(bad).await.unwrap_err();
        assert_eq!(err.code, "Failed");
    }

    #[tokio::test]
    async fn test_initialize_rejects_succeeded_intent() {
        let server = MockServer::start().await;
        mount_intent(&server, "succeeded").await;

        let err = sheet(&server).initialize(params()).await.unwrap_err();
        assert!(err.message.contains("succeeded"));
    }

    fn patient_sheet(server: &MockServer) -> StripePaymentSheet {
        StripePaymentSheet::new(
            StripeConfig::new("pk_test_abc")
                .with_api_base_url(server.uri())
                .with_processing_checks(2, Duration::from_millis(10)),
        )
        .unwrap()
    }

    fn intent_body(status: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_3Mtw",
            "status": status,
            "amount": 120000,
            "currency": "eur"
        }))
    }

    /// Retrieval answers `requires_payment_method` once (initialize), then `later`
    async fn mount_retrievals(server: &MockServer, later: &str) {
        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_3Mtw"))
            .respond_with(intent_body("requires_payment_method"))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/payment_intents/pi_3Mtw"))
            .respond_with(intent_body(later))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_processing_settles_to_succeeded() {
        let server = MockServer::start().await;
        mount_retrievals(&server, "succeeded").await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents/pi_3Mtw/confirm"))
            .respond_with(intent_body("processing"))
            .expect(1)
            .mount(&server)
            .await;

        let sheet = patient_sheet(&server);
        sheet.initialize(params()).await.unwrap();
        sheet.present().await.unwrap();
        assert!(!sheet.is_ready());
    }

    #[tokio::test]
    async fn test_processing_is_not_success() {
        let server = MockServer::start().await;
        mount_retrievals(&server, "processing").await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents/pi_3Mtw/confirm"))
            .respond_with(intent_body("processing"))
            .expect(1)
            .mount(&server)
            .await;

        let sheet = patient_sheet(&server);
        sheet.initialize(params()).await.unwrap();

        let err = sheet.present().await.unwrap_err();
        assert_eq!(err.code, "Processing");
        assert!(err.clone().into_present_error().is_retryable());
        assert!(sheet.is_ready());

        // Presenting again only re-checks the intent
        let err = sheet.present().await.unwrap_err();
        assert_eq!(err.code, "Processing");
    }
}
