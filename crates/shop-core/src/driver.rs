//! # Checkout Driver
//!
//! Runs the checkout state machine against real collaborators. The driver
//! owns the current [`CheckoutState`], executes every [`Command`] a
//! transition emits and feeds the outcome back as the next event, until the
//! machine is waiting on the user again.

use crate::cart::Cart;
use crate::checkout::{CheckoutEvent, CheckoutState, Command};
use crate::product::Currency;
use crate::session::SheetParams;
use crate::strategy::{BoxedPaymentSheet, BoxedPaymentsBackend, Notifier};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Per-merchant checkout settings
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Name shown on the payment sheet
    pub merchant_display_name: String,
    /// Backend customer the order is charged to
    pub customer_id: u64,
}

impl CheckoutConfig {
    pub fn new(merchant_display_name: impl Into<String>, customer_id: u64) -> Self {
        Self {
            merchant_display_name: merchant_display_name.into(),
            customer_id,
        }
    }
}

/// Drives one checkout screen
pub struct CheckoutDriver {
    backend: BoxedPaymentsBackend,
    sheet: BoxedPaymentSheet,
    notifier: Arc<dyn Notifier>,
    config: CheckoutConfig,
    state: CheckoutState,
    attempt_id: Uuid,
    started_at: DateTime<Utc>,
}

impl CheckoutDriver {
    pub fn new(
        backend: BoxedPaymentsBackend,
        sheet: BoxedPaymentSheet,
        notifier: Arc<dyn Notifier>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            backend,
            sheet,
            notifier,
            config,
            state: CheckoutState::Idle,
            attempt_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }

    pub fn state(&self) -> &CheckoutState {
        &self.state
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    /// Screen activation: snapshot the cart and prepare the payment sheet.
    /// Ignored while a checkout is already in progress.
    pub async fn activate(&mut self, cart: &Cart, currency: Currency) -> &CheckoutState {
        if self.state != CheckoutState::Idle {
            debug!(state = self.state.name(), "Checkout already active");
            return &self.state;
        }

        self.attempt_id = Uuid::new_v4();
        self.started_at = Utc::now();

        let event = match cart.total_price() {
            Ok(cart_total) => {
                info!(
                    attempt = %self.attempt_id,
                    items = cart.item_count(),
                    total = cart_total,
                    "Starting checkout"
                );
                CheckoutEvent::Activated {
                    cart_total,
                    currency,
                    items_id: cart.purchased_item_ids(),
                }
            }
            Err(e) => CheckoutEvent::CartRejected(e),
        };
        self.dispatch(event).await
    }

    /// User tapped the pay button
    pub async fn pay(&mut self) -> &CheckoutState {
        self.dispatch(CheckoutEvent::PayPressed).await
    }

    /// User asked to retry after a failure
    pub async fn retry(&mut self) -> &CheckoutState {
        self.dispatch(CheckoutEvent::Retry).await
    }

    /// User left the result screen
    pub async fn dismiss(&mut self) -> &CheckoutState {
        self.dispatch(CheckoutEvent::Dismiss).await
    }

    /// Apply an event and run commands until the machine settles
    #[instrument(skip(self, event), fields(attempt = %self.attempt_id))]
    pub async fn dispatch(&mut self, event: CheckoutEvent) -> &CheckoutState {
        let mut events = VecDeque::from([event]);

        while let Some(event) = events.pop_front() {
            let from = self.state.name();
            let state = std::mem::take(&mut self.state);
            let transition = state.apply(event);
            self.state = transition.state;

            if transition.ignored {
                debug!(state = from, "Event ignored");
                continue;
            }
            debug!("Checkout {} -> {}", from, self.state.name());

            for command in transition.commands {
                if let Some(next) = self.run(command).await {
                    events.push_back(next);
                }
            }
        }

        match &self.state {
            CheckoutState::Confirmed { payment_intent_id } => info!(
                payment_intent = %payment_intent_id,
                elapsed_ms = (Utc::now() - self.started_at).num_milliseconds(),
                "Order confirmed"
            ),
            CheckoutState::Failed { error, .. } => warn!("Checkout failed: {}", error),
            _ => {}
        }

        &self.state
    }

    async fn run(&self, command: Command) -> Option<CheckoutEvent> {
        match command {
            Command::CreateSession { amount } => {
                debug!(%amount, "Requesting payment session");
                Some(
                    match self
                        .backend
                        .create_session(amount, self.config.customer_id)
                        .await
                    {
                        Ok(session) => CheckoutEvent::SessionCreated(session),
                        Err(e) => CheckoutEvent::SessionFailed(e),
                    },
                )
            }
            Command::InitializeSheet { session } => {
                let params = SheetParams::from_session(&self.config.merchant_display_name, &session);
                debug!(provider = self.sheet.provider_name(), "Initializing payment sheet");
                Some(match self.sheet.initialize(params).await {
                    Ok(()) => CheckoutEvent::SheetInitialized,
                    Err(e) => CheckoutEvent::SheetInitFailed(e),
                })
            }
            Command::PresentSheet => Some(match self.sheet.present().await {
                Ok(()) => CheckoutEvent::SheetCompleted,
                Err(e) => CheckoutEvent::SheetFailed(e),
            }),
            Command::ConfirmOrder {
                payment_intent_id,
                items_id,
            } => {
                debug!(items = items_id.len(), "Confirming order");
                Some(
                    match self
                        .backend
                        .confirm_order(&payment_intent_id, &items_id, self.config.customer_id)
                        .await
                    {
                        Ok(()) => CheckoutEvent::OrderConfirmed,
                        Err(e) => CheckoutEvent::ConfirmationFailed(e),
                    },
                )
            }
            Command::Notify(notice) => {
                self.notifier.notify(&notice);
                None
            }
        }
    }
}
