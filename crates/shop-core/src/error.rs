//! # Checkout Error Types
//!
//! Typed error handling for the leafcart storefront.
//! Every failure on the checkout path ends up as a `CheckoutError`, and every
//! `CheckoutError` can be rendered as a user-facing [`Notice`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for catalog, cart and checkout operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Product not found in catalog
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: u64 },

    /// Two catalog entries share an id
    #[error("Duplicate product id in catalog: {product_id}")]
    DuplicateProduct { product_id: u64 },

    /// Cart quantities must be positive
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: u64, quantity: u32 },

    /// Cart total does not fit in minor units
    #[error("Amount overflow converting {amount} to minor units")]
    AmountOverflow { amount: u64 },

    /// HTTP call failed or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Backend refused to issue a payment session
    #[error("Payment session rejected (HTTP {status}): {detail}")]
    SessionRejected { status: u16, detail: String },

    /// Backend answered, but not with the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Client secret does not contain a payment intent id
    #[error("Invalid payment intent: {0}")]
    InvalidPaymentIntent(String),

    /// Payment sheet refused the session
    #[error("Payment sheet initialization failed [{code}]: {message}")]
    ProviderInit { code: String, message: String },

    /// Payment sheet reported an error while presented
    #[error("Payment failed [{code}]: {message}")]
    ProviderPresent { code: String, message: String },

    /// Backend refused to confirm the order
    #[error("Order confirmation rejected (HTTP {status}): {detail}")]
    ConfirmationRejected { status: u16, detail: String },
}

impl CheckoutError {
    /// Returns true if retrying the failed step can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::Network(_)
                | CheckoutError::MalformedResponse(_)
                | CheckoutError::ProviderInit { .. }
                | CheckoutError::ProviderPresent { .. }
        ) || matches!(
            self,
            CheckoutError::SessionRejected { status, .. }
                | CheckoutError::ConfirmationRejected { status, .. } if *status >= 500
        )
    }

    /// Short machine-readable code, shown in alert titles
    pub fn code(&self) -> &str {
        match self {
            CheckoutError::Configuration(_) => "Configuration",
            CheckoutError::ProductNotFound { .. } => "ProductNotFound",
            CheckoutError::DuplicateProduct { .. } => "DuplicateProduct",
            CheckoutError::InvalidQuantity { .. } => "InvalidQuantity",
            CheckoutError::AmountOverflow { .. } => "AmountOverflow",
            CheckoutError::Network(_) => "Network",
            CheckoutError::SessionRejected { .. } => "SessionRejected",
            CheckoutError::MalformedResponse(_) => "MalformedResponse",
            CheckoutError::InvalidPaymentIntent(_) => "InvalidPaymentIntent",
            CheckoutError::ProviderInit { code, .. } => code,
            CheckoutError::ProviderPresent { code, .. } => code,
            CheckoutError::ConfirmationRejected { .. } => "ConfirmationRejected",
        }
    }

    /// User-facing alert for this error
    pub fn notice(&self) -> Notice {
        let guidance = if self.is_retryable() {
            " Please try again."
        } else {
            ""
        };
        let message = match self {
            CheckoutError::ProviderInit { message, .. }
            | CheckoutError::ProviderPresent { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Notice::new(
            format!("Error code: {}", self.code()),
            format!("{}{}", message, guidance),
        )
    }
}

/// A blocking, user-visible notification (alert title + body)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }

    /// The alert shown once the backend confirms the order
    pub fn order_confirmed() -> Self {
        Self::new("Success", "Your order is confirmed!")
    }
}

/// Result type alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;
