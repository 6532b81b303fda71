//! # Stripe Configuration
//!
//! Client-side Stripe settings. Only the publishable key is ever held here;
//! secret keys stay on the backend.

use shop_core::CheckoutError;
use std::env;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_API_VERSION: &str = "2024-12-18.acacia";
const DEFAULT_PAYMENT_METHOD: &str = "pm_card_visa";

/// Stripe client configuration
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Publishable key (pk_test_... or pk_live_...)
    pub publishable_key: String,

    /// Payment method confirmed when the sheet is presented (pm_...)
    pub payment_method: String,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// API version
    pub api_version: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// Status checks made while a confirmed payment is `processing`
    pub processing_checks: u32,

    /// Delay between those checks
    pub processing_interval: Duration,
}

impl StripeConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `STRIPE_PUBLISHABLE_KEY`
    ///
    /// Optional:
    /// - `STRIPE_PAYMENT_METHOD` (default `pm_card_visa`)
    /// - `STRIPE_API_BASE_URL`
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CheckoutError> {
        let publishable_key = lookup("STRIPE_PUBLISHABLE_KEY").ok_or_else(|| {
            CheckoutError::Configuration("STRIPE_PUBLISHABLE_KEY not set".to_string())
        })?;

        let payment_method = lookup("STRIPE_PAYMENT_METHOD")
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string());

        let config = Self::new(publishable_key).with_payment_method(payment_method);
        let config = match lookup("STRIPE_API_BASE_URL") {
            Some(url) => config.with_api_base_url(url),
            None => config,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(publishable_key: impl Into<String>) -> Self {
        Self {
            publishable_key: publishable_key.into(),
            payment_method: DEFAULT_PAYMENT_METHOD.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(30),
            processing_checks: 5,
            processing_interval: Duration::from_secs(2),
        }
    }

    /// Check key formats
    pub fn validate(&self) -> Result<(), CheckoutError> {
        if self.publishable_key.starts_with("sk_") || self.publishable_key.starts_with("rk_") {
            return Err(CheckoutError::Configuration(
                "STRIPE_PUBLISHABLE_KEY holds a secret key; use the pk_ key".to_string(),
            ));
        }

        if !self.publishable_key.starts_with("pk_test_")
            && !self.publishable_key.starts_with("pk_live_")
        {
            return Err(CheckoutError::Configuration(
                "STRIPE_PUBLISHABLE_KEY must start with pk_test_ or pk_live_".to_string(),
            ));
        }

        if !self.payment_method.starts_with("pm_") {
            return Err(CheckoutError::Configuration(
                "STRIPE_PAYMENT_METHOD must start with pm_".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if using test keys
    pub fn is_test_mode(&self) -> bool {
        self.publishable_key.starts_with("pk_test_")
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.publishable_key)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Builder: set payment method
    pub fn with_payment_method(mut self, payment_method: impl Into<String>) -> Self {
        self.payment_method = payment_method.into();
        self
    }

    /// Builder: set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder: how long to wait for a `processing` payment to settle
    pub fn with_processing_checks(mut self, checks: u32, interval: Duration) -> Self {
        self.processing_checks = checks;
        self.processing_interval = interval;
        self
    }
}
