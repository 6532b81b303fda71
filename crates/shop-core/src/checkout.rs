//! # Checkout State Machine
//!
//! The payment confirmation sequence as an explicit value and a pure
//! transition function. Nothing in this module performs I/O: each
//! transition yields the next state plus the [`Command`]s a driver must
//! execute, and the driver feeds the outcomes back in as events.
//!
//! The [`PendingOrder`] fixed at activation travels with every state up to
//! the confirmation, so the charged amount and the confirmed items always
//! come from the same cart.
//!
//! ```text
//!  Idle ──Activated──▶ Initializing ──SessionCreated──▶ Initializing(session)
//!                          │                               │
//!                          │ SessionFailed / SheetInitFailed│ SheetInitialized
//!                          ▼                               ▼
//!                       Failed ◀──ConfirmationFailed──  ReadyToPay ◀─┐
//!                          │                               │ PayPressed│ SheetFailed
//!                          │ Retry                         ▼          │
//!                          └────────────────────────▶  Confirming ────┘
//!                                                          │ SheetCompleted, OrderConfirmed
//!                                                          ▼
//!                                                      Confirmed
//! ```

use crate::error::{CheckoutError, Notice};
use crate::product::{Currency, MinorAmount};
use crate::session::PaymentSession;
use crate::strategy::SheetError;
use serde::Serialize;

/// The order being paid for: amount charged and unit ids confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingOrder {
    pub amount: MinorAmount,
    pub items_id: Vec<u64>,
}

/// Where a `Confirming` checkout currently waits
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ConfirmStage {
    /// Payment sheet is on screen
    Presenting,
    /// Payment captured, backend confirmation in flight
    ConfirmingOrder { payment_intent_id: String },
}

/// What a `Retry` does from a failed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Recovery {
    /// Nothing was charged; start over with a new session
    Restart { order: PendingOrder },
    /// Payment was captured; re-send only the order confirmation
    RetryConfirmation {
        session: PaymentSession,
        order: PendingOrder,
        payment_intent_id: String,
    },
    /// Retrying cannot help
    None,
}

/// Checkout screen state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckoutState {
    #[default]
    Idle,
    Initializing {
        order: PendingOrder,
        session: Option<PaymentSession>,
    },
    ReadyToPay {
        session: PaymentSession,
        order: PendingOrder,
    },
    Confirming {
        session: PaymentSession,
        order: PendingOrder,
        stage: ConfirmStage,
    },
    Confirmed {
        payment_intent_id: String,
    },
    Failed {
        #[serde(serialize_with = "serialize_error")]
        error: CheckoutError,
        recovery: Recovery,
    },
}

fn serialize_error<S: serde::Serializer>(err: &CheckoutError, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&err.to_string())
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutEvent {
    /// Screen shown with an aggregated cart total (whole units) and the
    /// purchased unit ids of the same cart
    Activated {
        cart_total: u64,
        currency: Currency,
        items_id: Vec<u64>,
    },
    /// Screen shown with a cart whose total cannot be computed
    CartRejected(CheckoutError),
    SessionCreated(PaymentSession),
    SessionFailed(CheckoutError),
    SheetInitialized,
    SheetInitFailed(SheetError),
    /// User tapped the pay button
    PayPressed,
    SheetCompleted,
    SheetFailed(SheetError),
    OrderConfirmed,
    ConfirmationFailed(CheckoutError),
    /// User asked to retry after a failure
    Retry,
    /// User left the result screen
    Dismiss,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateSession {
        amount: MinorAmount,
    },
    InitializeSheet {
        session: PaymentSession,
    },
    PresentSheet,
    ConfirmOrder {
        payment_intent_id: String,
        items_id: Vec<u64>,
    },
    Notify(Notice),
}

/// Result of applying one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: CheckoutState,
    pub commands: Vec<Command>,
    /// The event was not valid in the previous state
    pub ignored: bool,
}

impl Transition {
    fn to(state: CheckoutState, commands: Vec<Command>) -> Self {
        Self {
            state,
            commands,
            ignored: false,
        }
    }

    fn fail(error: CheckoutError, recovery: Recovery) -> Self {
        let notice = error.notice();
        Self::to(
            CheckoutState::Failed { error, recovery },
            vec![Command::Notify(notice)],
        )
    }

    fn ignore(state: CheckoutState) -> Self {
        Self {
            state,
            commands: Vec::new(),
            ignored: true,
        }
    }

    fn initialize(order: PendingOrder) -> Self {
        let amount = order.amount;
        Self::to(
            CheckoutState::Initializing {
                order,
                session: None,
            },
            vec![Command::CreateSession { amount }],
        )
    }

    fn confirm(session: PaymentSession, order: PendingOrder, payment_intent_id: String) -> Self {
        let command = Command::ConfirmOrder {
            payment_intent_id: payment_intent_id.clone(),
            items_id: order.items_id.clone(),
        };
        Self::to(
            CheckoutState::Confirming {
                session,
                order,
                stage: ConfirmStage::ConfirmingOrder { payment_intent_id },
            },
            vec![command],
        )
    }
}

impl CheckoutState {
    /// Apply an event, returning the next state and the commands to run
    pub fn apply(self, event: CheckoutEvent) -> Transition {
        use CheckoutEvent as E;
        use CheckoutState as S;

        match (self, event) {
            (
                S::Idle,
                E::Activated {
                    cart_total,
                    currency,
                    items_id,
                },
            ) => match currency.to_minor_units(cart_total) {
                Ok(amount) => Transition::initialize(PendingOrder { amount, items_id }),
                Err(error) => Transition::fail(error, Recovery::None),
            },

            (S::Idle, E::CartRejected(error)) => Transition::fail(error, Recovery::None),

            (
                S::Initializing {
                    order,
                    session: None,
                },
                E::SessionCreated(session),
            ) => match session.validate() {
                Ok(()) => Transition::to(
                    S::Initializing {
                        order,
                        session: Some(session.clone()),
                    },
                    vec![Command::InitializeSheet { session }],
                ),
                Err(error) => Transition::fail(error, Recovery::Restart { order }),
            },

            (
                S::Initializing {
                    order,
                    session: None,
                },
                E::SessionFailed(error),
            ) => Transition::fail(error, Recovery::Restart { order }),

            (
                S::Initializing {
                    order,
                    session: Some(session),
                },
                E::SheetInitialized,
            ) => Transition::to(S::ReadyToPay { session, order }, Vec::new()),

            (
                S::Initializing {
                    order,
                    session: Some(_),
                },
                E::SheetInitFailed(err),
            ) => Transition::fail(err.into_init_error(), Recovery::Restart { order }),

            (S::ReadyToPay { session, order }, E::PayPressed) => Transition::to(
                S::Confirming {
                    session,
                    order,
                    stage: ConfirmStage::Presenting,
                },
                vec![Command::PresentSheet],
            ),

            (
                S::Confirming {
                    session,
                    order,
                    stage: ConfirmStage::Presenting,
                },
                E::SheetFailed(err),
            ) => {
                let notice = err.into_present_error().notice();
                Transition::to(
                    S::ReadyToPay { session, order },
                    vec![Command::Notify(notice)],
                )
            }

            (
                S::Confirming {
                    session,
                    order,
                    stage: ConfirmStage::Presenting,
                },
                E::SheetCompleted,
            ) => match session.payment_intent_id() {
                Ok(payment_intent_id) => Transition::confirm(session, order, payment_intent_id),
                // Paid, but we cannot name the intent to the backend
                Err(error) => Transition::fail(error, Recovery::None),
            },

            (
                S::Confirming {
                    stage: ConfirmStage::ConfirmingOrder { payment_intent_id },
                    ..
                },
                E::OrderConfirmed,
            ) => Transition::to(
                S::Confirmed { payment_intent_id },
                vec![Command::Notify(Notice::order_confirmed())],
            ),

            (
                S::Confirming {
                    session,
                    order,
                    stage: ConfirmStage::ConfirmingOrder { payment_intent_id },
                },
                E::ConfirmationFailed(error),
            ) => {
                let recovery = if error.is_retryable() {
                    Recovery::RetryConfirmation {
                        session,
                        order,
                        payment_intent_id,
                    }
                } else {
                    Recovery::None
                };
                Transition::fail(error, recovery)
            }

            (
                S::Failed {
                    recovery: Recovery::Restart { order },
                    ..
                },
                E::Retry,
            ) => Transition::initialize(order),

            (
                S::Failed {
                    recovery:
                        Recovery::RetryConfirmation {
                            session,
                            order,
                            payment_intent_id,
                        },
                    ..
                },
                E::Retry,
            ) => Transition::confirm(session, order, payment_intent_id),

            (S::Failed { .. } | S::Confirmed { .. }, E::Dismiss) => {
                Transition::to(S::Idle, Vec::new())
            }

            (state, _) => Transition::ignore(state),
        }
    }

    /// Whether the pay action is enabled
    pub fn can_pay(&self) -> bool {
        matches!(self, CheckoutState::ReadyToPay { .. })
    }

    /// Whether a `Retry` event would do anything
    pub fn can_retry(&self) -> bool {
        matches!(
            self,
            CheckoutState::Failed {
                recovery: Recovery::Restart { .. } | Recovery::RetryConfirmation { .. },
                ..
            }
        )
    }

    /// Whether the checkout reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutState::Confirmed { .. } | CheckoutState::Failed { .. }
        )
    }

    /// The order fixed at activation, while one is in progress
    pub fn order(&self) -> Option<&PendingOrder> {
        match self {
            CheckoutState::Initializing { order, .. }
            | CheckoutState::ReadyToPay { order, .. }
            | CheckoutState::Confirming { order, .. }
            | CheckoutState::Failed {
                recovery:
                    Recovery::Restart { order } | Recovery::RetryConfirmation { order, .. },
                ..
            } => Some(order),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&CheckoutError> {
        match self {
            CheckoutState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// State name (for logging)
    pub fn name(&self) -> &'static str {
        match self {
            CheckoutState::Idle => "idle",
            CheckoutState::Initializing { .. } => "initializing",
            CheckoutState::ReadyToPay { .. } => "ready_to_pay",
            CheckoutState::Confirming { .. } => "confirming",
            CheckoutState::Confirmed { .. } => "confirmed",
            CheckoutState::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEMS: [u64; 3] = [1, 3, 3];

    fn session() -> PaymentSession {
        PaymentSession::new("pi_ABC123", "ek_x", "cus_y")
    }

    fn order() -> PendingOrder {
        PendingOrder {
            amount: Currency::EUR.to_minor_units(604).unwrap(),
            items_id: ITEMS.to_vec(),
        }
    }

    fn ready() -> CheckoutState {
        CheckoutState::ReadyToPay {
            session: session(),
            order: order(),
        }
    }

    fn activated(total: u64) -> Transition {
        CheckoutState::Idle.apply(CheckoutEvent::Activated {
            cart_total: total,
            currency: Currency::EUR,
            items_id: ITEMS.to_vec(),
        })
    }

    fn confirm_command() -> Command {
        Command::ConfirmOrder {
            payment_intent_id: "pi_ABC123".to_string(),
            items_id: ITEMS.to_vec(),
        }
    }

    #[test]
    fn test_activation_converts_total_once() {
        for total in [0_u64, 1, 999, 123_456] {
            let t = activated(total);
            let expected = Currency::EUR.to_minor_units(total).unwrap();

            assert_eq!(expected.value(), total * 100);
            assert_eq!(t.commands, vec![Command::CreateSession { amount: expected }]);
            assert_eq!(t.state.order().map(|o| o.amount), Some(expected));
            assert!(!t.state.can_pay());
        }
    }

    #[test]
    fn test_happy_path() {
        let t = activated(604);
        let t = t.state.apply(CheckoutEvent::SessionCreated(session()));
        assert_eq!(
            t.commands,
            vec![Command::InitializeSheet { session: session() }]
        );

        let t = t.state.apply(CheckoutEvent::SheetInitialized);
        assert_eq!(t.state, ready());
        assert!(t.state.can_pay());

        let t = t.state.apply(CheckoutEvent::PayPressed);
        assert_eq!(t.commands, vec![Command::PresentSheet]);
        assert!(!t.state.can_pay());

        let t = t.state.apply(CheckoutEvent::SheetCompleted);
        assert_eq!(t.commands, vec![confirm_command()]);

        let t = t.state.apply(CheckoutEvent::OrderConfirmed);
        assert_eq!(
            t.state,
            CheckoutState::Confirmed {
                payment_intent_id: "pi_ABC123".to_string()
            }
        );
        assert!(t.state.is_terminal());
        assert_eq!(t.state.order(), None);
        assert_eq!(t.commands, vec![Command::Notify(Notice::order_confirmed())]);
    }

    #[test]
    fn test_second_activation_keeps_first_order() {
        let t = ready().apply(CheckoutEvent::Activated {
            cart_total: 10,
            currency: Currency::EUR,
            items_id: vec![2; 5],
        });

        assert!(t.ignored);
        assert_eq!(t.state, ready());

        let t = t
            .state
            .apply(CheckoutEvent::PayPressed)
            .state
            .apply(CheckoutEvent::SheetCompleted);
        assert_eq!(t.commands, vec![confirm_command()]);
    }

    #[test]
    fn test_dismiss_while_ready_keeps_order() {
        let t = ready().apply(CheckoutEvent::Dismiss);
        assert!(t.ignored);
        assert_eq!(t.state.order(), Some(&order()));
        assert!(!t.state.is_terminal());
    }

    #[test]
    fn test_cart_rejected_fails() {
        let t = CheckoutState::Idle.apply(CheckoutEvent::CartRejected(
            CheckoutError::AmountOverflow { amount: u64::MAX },
        ));

        assert!(t.state.is_terminal());
        assert!(!t.state.can_retry());
        assert!(matches!(t.commands.as_slice(), [Command::Notify(_)]));

        // Only meaningful on a fresh screen
        assert!(ready().apply(CheckoutEvent::CartRejected(
            CheckoutError::Network("x".into())
        ))
        .ignored);
    }

    #[test]
    fn test_session_failure_is_reported() {
        let t = activated(12);
        let t = t
            .state
            .apply(CheckoutEvent::SessionFailed(CheckoutError::Network(
                "connection refused".into(),
            )));

        assert!(!t.state.can_pay());
        assert!(t.state.can_retry());
        assert!(matches!(
            t.state.error(),
            Some(CheckoutError::Network(_))
        ));
        assert!(matches!(t.commands.as_slice(), [Command::Notify(_)]));
    }

    #[test]
    fn test_sheet_init_failure_is_reported() {
        let t = activated(3)
            .state
            .apply(CheckoutEvent::SessionCreated(session()))
            .state
            .apply(CheckoutEvent::SheetInitFailed(SheetError::new(
                "Failed",
                "invalid ephemeral key",
            )));

        assert!(matches!(
            t.state,
            CheckoutState::Failed {
                error: CheckoutError::ProviderInit { .. },
                recovery: Recovery::Restart { .. },
            }
        ));
        assert_eq!(t.commands.len(), 1);
    }

    #[test]
    fn test_canceled_sheet_returns_to_ready() {
        let t = ready()
            .apply(CheckoutEvent::PayPressed)
            .state
            .apply(CheckoutEvent::SheetFailed(SheetError::canceled()));

        assert_eq!(t.state, ready());
        assert!(t.state.can_pay());
        match t.commands.as_slice() {
            [Command::Notify(notice)] => {
                assert!(notice.title.contains("Canceled"));
                assert!(notice.message.contains("The payment flow has been canceled"));
            }
            other => panic!("unexpected commands: {:?}", other),
        }
    }

    #[test]
    fn test_confirmation_server_error_never_reports_success() {
        let t = ready()
            .apply(CheckoutEvent::PayPressed)
            .state
            .apply(CheckoutEvent::SheetCompleted)
            .state
            .apply(CheckoutEvent::ConfirmationFailed(
                CheckoutError::ConfirmationRejected {
                    status: 500,
                    detail: "Internal Server Error".into(),
                },
            ));

        assert_eq!(t.state.name(), "failed");
        assert!(!t
            .commands
            .contains(&Command::Notify(Notice::order_confirmed())));

        // Retry only re-sends the confirmation, with the same items
        let t = t.state.apply(CheckoutEvent::Retry);
        assert_eq!(t.commands, vec![confirm_command()]);
    }

    #[test]
    fn test_rejected_confirmation_is_not_retryable() {
        let t = CheckoutState::Confirming {
            session: session(),
            order: order(),
            stage: ConfirmStage::ConfirmingOrder {
                payment_intent_id: "pi_ABC123".into(),
            },
        }
        .apply(CheckoutEvent::ConfirmationFailed(
            CheckoutError::ConfirmationRejected {
                status: 404,
                detail: "Payment not found or already checked.".into(),
            },
        ));

        assert!(!t.state.can_retry());
        assert!(t.state.apply(CheckoutEvent::Retry).ignored);
    }

    #[test]
    fn test_retry_after_session_failure_restarts() {
        let t = activated(5)
            .state
            .apply(CheckoutEvent::SessionFailed(CheckoutError::MalformedResponse(
                "missing field".into(),
            )))
            .state
            .apply(CheckoutEvent::Retry);

        let amount = Currency::EUR.to_minor_units(5).unwrap();
        assert_eq!(t.commands, vec![Command::CreateSession { amount }]);
        assert_eq!(t.state.order().map(|o| o.items_id.as_slice()), Some(&ITEMS[..]));
    }

    #[test]
    fn test_amount_overflow_fails() {
        let t = activated(u64::MAX);
        assert!(matches!(
            t.state,
            CheckoutState::Failed {
                error: CheckoutError::AmountOverflow { .. },
                recovery: Recovery::None,
            }
        ));
    }

    #[test]
    fn test_out_of_order_events_are_ignored() {
        let t = CheckoutState::Idle.apply(CheckoutEvent::PayPressed);
        assert!(t.ignored);
        assert_eq!(t.state, CheckoutState::Idle);

        let t = ready().apply(CheckoutEvent::OrderConfirmed);
        assert!(t.ignored);
        assert_eq!(t.state, ready());
    }

    #[test]
    fn test_dismiss_resets() {
        let t = CheckoutState::Confirmed {
            payment_intent_id: "pi_1".into(),
        }
        .apply(CheckoutEvent::Dismiss);
        assert_eq!(t.state, CheckoutState::Idle);
        assert!(!t.state.is_terminal());
    }
}
