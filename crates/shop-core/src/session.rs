//! # Payment Session Types
//!
//! Request-scoped values exchanged with the payments backend and the payment
//! sheet. None of these are persisted.

use crate::error::{CheckoutError, CheckoutResult};
use crate::product::MinorAmount;
use serde::{Deserialize, Serialize};

/// Prefix of canonical payment intent ids
pub const PAYMENT_INTENT_PREFIX: &str = "pi_";

/// Body of `POST /payments/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub amount: MinorAmount,
    pub customer_id: u64,
}

/// Payment session issued by the backend for one checkout attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Payment intent client secret (`pi_..._secret_...`)
    #[serde(rename = "paymentIntent")]
    pub payment_intent: String,

    /// Ephemeral key scoping the customer's saved payment data
    #[serde(rename = "ephemeralKey")]
    pub ephemeral_key: String,

    /// Provider customer id (`cus_...`)
    pub customer: String,

    /// Publishable key echoed by some backends
    #[serde(
        rename = "publishableKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub publishable_key: Option<String>,
}

impl PaymentSession {
    pub fn new(
        payment_intent: impl Into<String>,
        ephemeral_key: impl Into<String>,
        customer: impl Into<String>,
    ) -> Self {
        Self {
            payment_intent: payment_intent.into(),
            ephemeral_key: ephemeral_key.into(),
            customer: customer.into(),
            publishable_key: None,
        }
    }

    /// Reject sessions with empty fields
    pub fn validate(&self) -> CheckoutResult<()> {
        for (field, value) in [
            ("paymentIntent", &self.payment_intent),
            ("ephemeralKey", &self.ephemeral_key),
            ("customer", &self.customer),
        ] {
            if value.trim().is_empty() {
                return Err(CheckoutError::MalformedResponse(format!(
                    "payment session field `{}` is empty",
                    field
                )));
            }
        }
        Ok(())
    }

    /// Canonical payment intent id for this session
    pub fn payment_intent_id(&self) -> CheckoutResult<String> {
        derive_payment_intent_id(&self.payment_intent)
    }
}

/// Canonical payment intent id from a provider-issued identifier.
///
/// Takes the segment between the first and second `_` and re-prefixes it
/// with `pi_`, so both `pi_ABC123` and `pi_ABC123_secret_XYZ` map to
/// `pi_ABC123`.
pub fn derive_payment_intent_id(issued: &str) -> CheckoutResult<String> {
    match issued.split('_').nth(1) {
        Some(segment) if !segment.is_empty() => {
            Ok(format!("{}{}", PAYMENT_INTENT_PREFIX, segment))
        }
        _ => Err(CheckoutError::InvalidPaymentIntent(issued.to_string())),
    }
}

/// Inputs of the payment sheet's initialization call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetParams {
    pub merchant_display_name: String,
    pub customer_id: String,
    pub customer_ephemeral_key_secret: String,
    pub payment_intent_client_secret: String,
    pub allows_delayed_payment_methods: bool,
}

impl SheetParams {
    pub fn from_session(merchant_display_name: impl Into<String>, session: &PaymentSession) -> Self {
        Self {
            merchant_display_name: merchant_display_name.into(),
            customer_id: session.customer.clone(),
            customer_ephemeral_key_secret: session.ephemeral_key.clone(),
            payment_intent_client_secret: session.payment_intent.clone(),
            allows_delayed_payment_methods: false,
        }
    }
}

/// Body of `POST /payments/check/{payment_intent_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmOrderRequest {
    pub items_id: Vec<u64>,
    pub customer_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_payment_intent_id() {
        assert_eq!(derive_payment_intent_id("pi_ABC123").unwrap(), "pi_ABC123");
        assert_eq!(
            derive_payment_intent_id("pi_3MtwBw_secret_YrKJUKribcBjcG8HVhfZluoGH").unwrap(),
            "pi_3MtwBw"
        );
        assert!(derive_payment_intent_id("nounderscore").is_err());
        assert!(derive_payment_intent_id("pi_").is_err());
    }

    #[test]
    fn test_session_wire_format() {
        let session: PaymentSession = serde_json::from_str(
            r#"{"paymentIntent":"pi_ABC123","ephemeralKey":"ek_x","customer":"cus_y"}"#,
        )
        .unwrap();

        assert_eq!(session, PaymentSession::new("pi_ABC123", "ek_x", "cus_y"));
        assert_eq!(session.payment_intent_id().unwrap(), "pi_ABC123");
    }

    #[test]
    fn test_empty_session_field_is_malformed() {
        let session = PaymentSession::new("pi_ABC123", "", "cus_y");
        assert!(matches!(
            session.validate(),
            Err(CheckoutError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_sheet_params_disallow_delayed_methods() {
        let session = PaymentSession::new("pi_1_secret_2", "ek_x", "cus_y");
        let params = SheetParams::from_session("Example, Inc.", &session);

        assert_eq!(params.customer_id, "cus_y");
        assert_eq!(params.payment_intent_client_secret, "pi_1_secret_2");
        assert!(!params.allows_delayed_payment_methods);
    }
}
