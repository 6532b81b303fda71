//! # Checkout Collaborators
//!
//! Traits for the two external parties the checkout talks to, plus the
//! channel used to show alerts to the user.
//!
//! ```text
//! ┌──────────────┐  create_session / confirm_order  ┌────────────────────┐
//! │              │ ───────────────────────────────▶ │ PaymentsBackend     │
//! │CheckoutDriver│                                  └────────────────────┘
//! │              │  initialize / present            ┌────────────────────┐
//! │              │ ───────────────────────────────▶ │ PaymentSheet        │
//! └──────┬───────┘                                  └────────────────────┘
//!        │ notify                                   ┌────────────────────┐
//!        └────────────────────────────────────────▶ │ Notifier            │
//!                                                   └────────────────────┘
//! ```

use crate::error::{CheckoutError, CheckoutResult, Notice};
use crate::product::MinorAmount;
use crate::session::{PaymentSession, SheetParams};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Error reported by the payment sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetError {
    pub code: String,
    pub message: String,
}

impl SheetError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The user dismissed the sheet
    pub fn canceled() -> Self {
        Self::new("Canceled", "The payment flow has been canceled")
    }

    pub fn into_init_error(self) -> CheckoutError {
        CheckoutError::ProviderInit {
            code: self.code,
            message: self.message,
        }
    }

    pub fn into_present_error(self) -> CheckoutError {
        CheckoutError::ProviderPresent {
            code: self.code,
            message: self.message,
        }
    }
}

impl std::fmt::Display for SheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Remote service issuing payment sessions and confirming orders
#[async_trait]
pub trait PaymentsBackend: Send + Sync {
    /// Request a payment session for `amount` minor units.
    async fn create_session(
        &self,
        amount: MinorAmount,
        customer_id: u64,
    ) -> CheckoutResult<PaymentSession>;

    /// Ask the backend to confirm the order paid by `payment_intent_id`.
    ///
    /// Implementations must treat `payment_intent_id` as the idempotency key
    /// of the call so a retry after a partial failure cannot fulfil twice.
    async fn confirm_order(
        &self,
        payment_intent_id: &str,
        items_id: &[u64],
        customer_id: u64,
    ) -> CheckoutResult<()>;
}

/// Provider-hosted payment entry UI
#[async_trait]
pub trait PaymentSheet: Send + Sync {
    /// Prepare the sheet for a session.
    async fn initialize(&self, params: SheetParams) -> Result<(), SheetError>;

    /// Show the sheet and wait until the user completes or cancels it.
    async fn present(&self) -> Result<(), SheetError>;

    /// Provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Blocking user-visible notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Notifier that logs alerts through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, notice: &Notice) {
        tracing::info!(title = %notice.title, "{}", notice.message);
    }
}

/// Notifier that keeps every alert, for inspection
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice.clone());
        }
    }
}

/// Both notifiers receive every alert
impl<A: Notifier, B: Notifier> Notifier for (A, B) {
    fn notify(&self, notice: &Notice) {
        self.0.notify(notice);
        self.1.notify(notice);
    }
}

/// Type alias for a shared backend (dynamic dispatch)
pub type BoxedPaymentsBackend = Arc<dyn PaymentsBackend>;

/// Type alias for a shared payment sheet (dynamic dispatch)
pub type BoxedPaymentSheet = Arc<dyn PaymentSheet>;
