//! # Command Line
//!
//! Argument parsing and text rendering for the `storefront` binary.

use clap::{Parser, Subcommand};
use shop_core::{
    Cart, CartRow, Catalog, CheckoutDriver, CheckoutResult, CheckoutState, Currency,
    RecordingNotifier,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "storefront", version, about = "Plant storefront: catalog, cart and checkout")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the product catalog
    Catalog,
    /// Show a cart built from `--item ID:QTY` pairs
    Cart {
        #[arg(long = "item", value_parser = parse_item, required = true)]
        items: Vec<(u64, u32)>,
    },
    /// Pay for a cart through the payment sheet and confirm the order
    Checkout {
        #[arg(long = "item", value_parser = parse_item, required = true)]
        items: Vec<(u64, u32)>,
        /// Extra attempts after a declined payment or a retryable failure
        #[arg(long, default_value_t = 1)]
        retries: u32,
    },
    /// Show the customer's payments recorded by the backend
    History,
    /// Register a new customer with the backend
    RegisterCustomer,
}

/// Parse `ID:QTY` (or a bare `ID`, quantity 1)
pub fn parse_item(s: &str) -> Result<(u64, u32), String> {
    let (id, qty) = match s.split_once(':') {
        Some((id, qty)) => (id, qty),
        None => (s, "1"),
    };

    let id = id
        .trim()
        .parse()
        .map_err(|_| format!("invalid product id `{}`", id))?;
    let qty = qty
        .trim()
        .parse()
        .map_err(|_| format!("invalid quantity `{}`", qty))?;
    Ok((id, qty))
}

/// Build a cart from parsed `--item` pairs
pub fn build_cart(catalog: &Catalog, items: &[(u64, u32)]) -> CheckoutResult<Cart> {
    let mut cart = Cart::new();
    for &(id, qty) in items {
        cart.add(catalog.require(id)?, qty)?;
    }
    Ok(cart)
}

fn money(currency: Currency, amount: u64) -> String {
    format!("{} {}", currency.symbol(), amount)
}

pub fn render_catalog(catalog: &Catalog) -> String {
    catalog
        .list()
        .iter()
        .map(|p| {
            format!(
                "{:>3}  {:<12} {:>10}  {}",
                p.id,
                p.name,
                money(catalog.currency(), p.price),
                p.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_cart(cart: &Cart, currency: Currency) -> CheckoutResult<String> {
    Ok(cart
        .rows()?
        .into_iter()
        .map(|row| match row {
            CartRow::Line { label, total, .. } => {
                format!("{:<20} {:>10}", label, money(currency, total))
            }
            CartRow::Summary { total } => {
                format!("{:<20} {:>10}", "Total", money(currency, total))
            }
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn render_outcome(state: &CheckoutState) -> String {
    match state {
        CheckoutState::Confirmed { payment_intent_id } => {
            format!("Order confirmed ({})", payment_intent_id)
        }
        CheckoutState::Failed { error, .. } => format!("Checkout failed: {}", error),
        CheckoutState::ReadyToPay { .. } => "Payment not completed".to_string(),
        other => format!("Checkout stopped in state `{}`", other.name()),
    }
}

/// Pay for `cart`, spending up to `retries` extra attempts on declined
/// payments and retryable failures. Errors unless the order is confirmed.
pub async fn run_checkout(
    checkout: &mut CheckoutDriver,
    notices: &RecordingNotifier,
    cart: &Cart,
    currency: Currency,
    retries: u32,
) -> anyhow::Result<String> {
    checkout.activate(cart, currency).await;

    let mut attempts = 0;
    loop {
        if checkout.state().can_pay() {
            checkout.pay().await;
        }

        let state = checkout.state();
        let settled = state.is_terminal() && !state.can_retry();
        let can_retry = state.can_retry();
        if settled || attempts >= retries {
            break;
        }

        attempts += 1;
        info!("Retrying checkout ({}/{})", attempts, retries);
        if can_retry {
            checkout.retry().await;
        }
    }

    let outcome = render_outcome(checkout.state());
    match checkout.state() {
        CheckoutState::Confirmed { .. } => Ok(outcome),
        CheckoutState::Failed { error, .. } => {
            anyhow::bail!("checkout {} failed: {}", checkout.attempt_id(), error)
        }
        _ => match notices.notices().last() {
            Some(notice) => anyhow::bail!(
                "checkout {}: {}. {}",
                checkout.attempt_id(),
                notice.title,
                notice.message
            ),
            None => anyhow::bail!("checkout {}: {}", checkout.attempt_id(), outcome),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item() {
        assert_eq!(parse_item("1:2"), Ok((1, 2)));
        assert_eq!(parse_item("3"), Ok((3, 1)));
        assert!(parse_item("basil:2").is_err());
        assert!(parse_item("1:-1").is_err());
    }

    #[test]
    fn test_cli_parses_checkout() {
        let cli = Cli::parse_from(["storefront", "checkout", "--item", "1:2", "--item", "3"]);
        match cli.command {
            Command::Checkout { items, retries } => {
                assert_eq!(items, vec![(1, 2), (3, 1)]);
                assert_eq!(retries, 1);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_build_cart_unknown_product() {
        let catalog = Catalog::sample();
        assert!(build_cart(&catalog, &[(1, 1), (99, 1)]).is_err());
        assert!(build_cart(&catalog, &[(1, 0)]).is_err());
    }

    #[test]
    fn test_render_cart() {
        let catalog = Catalog::sample();
        let cart = build_cart(&catalog, &[(1, 2), (3, 1)]).unwrap();
        let text = render_cart(&cart, catalog.currency()).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("basil x 2"));
        assert!(lines[0].ends_with("€ 1200"));
        assert!(lines[2].starts_with("Total"));
        assert!(lines[2].ends_with("€ 1202"));
    }

    #[test]
    fn test_render_catalog() {
        let text = render_catalog(&Catalog::sample());
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("calathea"));
    }
}
