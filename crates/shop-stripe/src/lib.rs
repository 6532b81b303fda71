//! # shop-stripe
//!
//! Stripe payment sheet for leafcart-rs.
//!
//! `StripePaymentSheet` implements `shop_core::PaymentSheet` on top of
//! Stripe's client-side PaymentIntent API, authenticated with the
//! publishable key and the client secret the backend issued:
//!
//! 1. `initialize` retrieves the PaymentIntent and checks it can still be paid
//! 2. `present` confirms it with the configured payment method
//!
//! Errors come back as `SheetError { code, message }`, using Stripe's error
//! code (`card_declined`, ...) when there is one and `Canceled` for
//! cancelled intents.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_stripe::StripePaymentSheet;
//! use shop_core::PaymentSheet;
//!
//! // Publishable key from STRIPE_PUBLISHABLE_KEY
//! let sheet = StripePaymentSheet::from_env()?;
//!
//! sheet.initialize(SheetParams::from_session("Example, Inc.", &session)).await?;
//! sheet.present().await?;
//! ```

pub mod config;
pub mod sheet;

// Re-exports
pub use config::StripeConfig;
pub use sheet::StripePaymentSheet;
