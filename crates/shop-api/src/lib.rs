//! # shop-api
//!
//! Backend client and application wiring for leafcart-rs.
//!
//! This crate provides:
//! - `BackendClient`, the reqwest client for the payments backend
//! - `AppConfig` / `AppState`, environment configuration and collaborators
//! - the `storefront` command line
//!
//! ## Backend Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/payments/` | Create payment session |
//! | POST | `/payments/check/{payment_intent_id}` | Confirm order |
//! | GET | `/payments/{customer_id}` | Payment history |
//! | GET | `/items/{id}` | Backend item record |
//! | POST | `/customers/` | Register customer |

pub mod cli;
pub mod client;
pub mod state;

pub use client::{BackendClient, CustomerRecord, ItemRecord, PaymentRecord};
pub use state::{AppConfig, AppState};
