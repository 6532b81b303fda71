//! # Application State
//!
//! Configuration and shared collaborators for the storefront binary.
//! Everything is read from the environment once and validated up front.

use crate::client::BackendClient;
use shop_core::{Catalog, CheckoutConfig, CheckoutDriver, CheckoutError, Notifier};
use shop_stripe::{StripeConfig, StripePaymentSheet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Payments backend base URL
    pub backend_url: String,
    /// Backend customer id the orders are placed for
    pub customer_id: u64,
    /// Merchant name shown on the payment sheet
    pub merchant_name: String,
    /// Timeout applied to every HTTP call
    pub http_timeout: Duration,
    /// Product catalog file
    pub catalog_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CheckoutError> {
        let backend_url = lookup("SHOP_BACKEND_URL").ok_or_else(|| {
            CheckoutError::Configuration("SHOP_BACKEND_URL not set".to_string())
        })?;
        if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
            return Err(CheckoutError::Configuration(format!(
                "SHOP_BACKEND_URL must be an http(s) URL, got {}",
                backend_url
            )));
        }

        let customer_id = lookup("SHOP_CUSTOMER_ID")
            .ok_or_else(|| CheckoutError::Configuration("SHOP_CUSTOMER_ID not set".to_string()))?
            .parse()
            .map_err(|_| {
                CheckoutError::Configuration("SHOP_CUSTOMER_ID must be an integer".to_string())
            })?;

        let http_timeout = match lookup("SHOP_HTTP_TIMEOUT_SECS") {
            Some(secs) => match secs.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(CheckoutError::Configuration(
                        "SHOP_HTTP_TIMEOUT_SECS must be a positive integer".to_string(),
                    ))
                }
            },
            None => Duration::from_secs(30),
        };

        Ok(Self {
            backend_url,
            customer_id,
            merchant_name: lookup("SHOP_MERCHANT_NAME")
                .unwrap_or_else(|| "Example, Inc.".to_string()),
            http_timeout,
            catalog_path: lookup("SHOP_CATALOG").map(PathBuf::from),
        })
    }

    /// Checkout settings derived from this config
    pub fn checkout_config(&self) -> CheckoutConfig {
        CheckoutConfig::new(&self.merchant_name, self.customer_id)
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Product catalog
    pub catalog: Arc<Catalog>,
    /// Payments backend client
    pub backend: Arc<BackendClient>,
    /// Payment sheet
    pub sheet: Arc<StripePaymentSheet>,
}

impl AppState {
    /// Create a new AppState from the environment
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let stripe_config = StripeConfig::from_env()?.with_timeout(config.http_timeout);
        let sheet = StripePaymentSheet::new(stripe_config)?;

        let backend = BackendClient::new(&config.backend_url, config.http_timeout)?;
        let catalog = load_product_catalog(config.catalog_path.as_deref())?;

        Ok(Self {
            config,
            catalog: Arc::new(catalog),
            backend: Arc::new(backend),
            sheet: Arc::new(sheet),
        })
    }

    /// A checkout driver wired to this state's collaborators
    pub fn checkout(&self, notifier: Arc<dyn Notifier>) -> CheckoutDriver {
        CheckoutDriver::new(
            self.backend.clone(),
            self.sheet.clone(),
            notifier,
            self.config.checkout_config(),
        )
    }
}

/// Load product catalog from config file
fn load_product_catalog(explicit: Option<&std::path::Path>) -> anyhow::Result<Catalog> {
    if let Some(path) = explicit {
        let catalog = Catalog::load(path)?;
        tracing::info!("Loaded {} products from {}", catalog.len(), path.display());
        return Ok(catalog);
    }

    // Try to load from config/products.toml
    let config_paths = [
        "config/products.toml",
        "../config/products.toml",
        "../../config/products.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let catalog = Catalog::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            tracing::info!("Loaded {} products from {}", catalog.len(), path);
            return Ok(catalog);
        }
    }

    tracing::warn!("No product catalog found, using sample catalog");
    Ok(Catalog::sample())
}
