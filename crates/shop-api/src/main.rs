//! # Leafcart RS
//!
//! Plant storefront on the command line.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export SHOP_BACKEND_URL=http://127.0.0.1:8000
//! export SHOP_CUSTOMER_ID=1
//! export STRIPE_PUBLISHABLE_KEY=pk_test_...
//!
//! # Pay for two basil plants
//! storefront checkout --item 1:2
//! ```

use clap::Parser;
use shop_api::cli::{self, Cli, Command};
use shop_api::state::AppState;
use shop_core::{LoggingNotifier, RecordingNotifier};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Cli::parse();
    let state = AppState::new()?;

    info!("Backend: {}", state.backend.base_url());
    info!("Products loaded: {}", state.catalog.len());

    match args.command {
        Command::Catalog => {
            println!("{}", cli::render_catalog(&state.catalog));
        }
        Command::Cart { items } => {
            let cart = cli::build_cart(&state.catalog, &items)?;
            println!("{}", cli::render_cart(&cart, state.catalog.currency())?);
        }
        Command::Checkout { items, retries } => {
            let cart = cli::build_cart(&state.catalog, &items)?;
            println!("{}\n", cli::render_cart(&cart, state.catalog.currency())?);

            let notices = RecordingNotifier::new();
            let mut checkout = state.checkout(Arc::new((LoggingNotifier, notices.clone())));
            let outcome = cli::run_checkout(
                &mut checkout,
                &notices,
                &cart,
                state.catalog.currency(),
                retries,
            )
            .await?;
            println!("{}", outcome);
        }
        Command::History => {
            let payments = state.backend.payment_history(state.config.customer_id).await?;
            for payment in &payments {
                let items: Vec<_> = payment
                    .purchased_items
                    .iter()
                    .filter_map(|p| p.item.as_ref().map(|i| i.name.as_str()))
                    .collect();
                println!(
                    "{}  {}  {}",
                    payment.id,
                    if payment.is_checked { "confirmed" } else { "pending" },
                    items.join(", ")
                );
            }
            info!("{} payments", payments.len());
        }
        Command::RegisterCustomer => {
            let customer = state.backend.register_customer().await?;
            println!("Customer {} ({})", customer.id, customer.stripe_id);
        }
    }

    Ok(())
}
