//! # shop-core
//!
//! Core types and traits for the leafcart storefront.
//!
//! This crate provides:
//! - `Product` and `Catalog` for the read-only product catalog
//! - `Cart` and `CartLine` with item-count and total-price aggregates
//! - `CheckoutState`, the payment confirmation state machine
//! - `PaymentsBackend`, `PaymentSheet` and `Notifier` collaborator traits
//! - `CheckoutDriver`, which runs the state machine against collaborators
//! - `CheckoutError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{Cart, Catalog, CheckoutConfig, CheckoutDriver, LoggingNotifier};
//!
//! let catalog = Catalog::sample();
//! let mut cart = Cart::new();
//! cart.add(catalog.require(1)?, 2)?;
//!
//! let mut checkout = CheckoutDriver::new(
//!     backend,
//!     sheet,
//!     Arc::new(LoggingNotifier),
//!     CheckoutConfig::new("Example, Inc.", 1),
//! );
//!
//! // Fetch a payment session and prepare the sheet
//! checkout.activate(&cart, catalog.currency()).await;
//!
//! // User taps "Checkout"
//! if checkout.state().can_pay() {
//!     checkout.pay().await;
//! }
//! ```

pub mod cart;
pub mod checkout;
pub mod driver;
pub mod error;
pub mod product;
pub mod session;
pub mod strategy;

// Re-exports for convenience
pub use cart::{Cart, CartLine, CartRow};
pub use checkout::{
    CheckoutEvent, CheckoutState, Command, ConfirmStage, PendingOrder, Recovery, Transition,
};
pub use driver::{CheckoutConfig, CheckoutDriver};
pub use error::{CheckoutError, CheckoutResult, Notice};
pub use product::{Catalog, Currency, MinorAmount, Product};
pub use session::{
    derive_payment_intent_id, ConfirmOrderRequest, CreateSessionRequest, PaymentSession,
    SheetParams,
};
pub use strategy::{
    BoxedPaymentSheet, BoxedPaymentsBackend, LoggingNotifier, Notifier, PaymentSheet,
    PaymentsBackend, RecordingNotifier, SheetError,
};
