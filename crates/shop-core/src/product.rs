//! # Product Types
//!
//! Product catalog types for leafcart.
//! Products are loaded from `config/products.toml` and shared by reference
//! with the cart; the catalog itself is read-only once built.

use crate::error::{CheckoutError, CheckoutResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::JPY => "jpy",
        }
    }

    /// Returns the number of decimal places for this currency
    /// (JPY has 0 decimals, most others have 2)
    pub fn decimal_places(&self) -> u8 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Display symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::EUR => "€",
            Currency::GBP => "£",
            Currency::JPY => "¥",
        }
    }

    /// Convert a whole-unit amount into the provider's minor units.
    ///
    /// This is the only place the major → minor scaling happens.
    pub fn to_minor_units(&self, amount: u64) -> CheckoutResult<MinorAmount> {
        10_u64
            .checked_pow(u32::from(self.decimal_places()))
            .and_then(|factor| amount.checked_mul(factor))
            .map(MinorAmount)
            .ok_or(CheckoutError::AmountOverflow { amount })
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::EUR
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// Amount in the payment provider's smallest currency unit (cents for EUR)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinorAmount(u64);

impl MinorAmount {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for MinorAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A product in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique, stable product identifier
    pub id: u64,

    /// Display name
    pub name: String,

    /// Unit price in whole currency units
    pub price: u64,

    /// Image asset reference (e.g. "assets/products/basil.jpg")
    #[serde(default)]
    pub image: String,

    /// Short description
    #[serde(default)]
    pub description: String,
}

impl Product {
    pub fn new(id: u64, name: impl Into<String>, price: u64) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            image: String::new(),
            description: String::new(),
        }
    }

    /// Builder: set description
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Builder: set image asset
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    currency: Currency,
    #[serde(default)]
    products: Vec<Product>,
}

/// Read-only product catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    currency: Currency,
    products: Vec<Arc<Product>>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids
    pub fn new(currency: Currency, products: Vec<Product>) -> CheckoutResult<Self> {
        let mut seen = HashSet::new();
        for product in &products {
            if !seen.insert(product.id) {
                return Err(CheckoutError::DuplicateProduct {
                    product_id: product.id,
                });
            }
        }

        Ok(Self {
            currency,
            products: products.into_iter().map(Arc::new).collect(),
        })
    }

    /// All products, in load order
    pub fn list(&self) -> &[Arc<Product>] {
        &self.products
    }

    /// Find a product by ID
    pub fn get(&self, id: u64) -> Option<Arc<Product>> {
        self.products.iter().find(|p| p.id == id).cloned()
    }

    /// Like [`Catalog::get`], but a miss is an error
    pub fn require(&self, id: u64) -> CheckoutResult<Arc<Product>> {
        self.get(id)
            .ok_or(CheckoutError::ProductNotFound { product_id: id })
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> CheckoutResult<Self> {
        let file: CatalogFile = toml::from_str(toml_str)
            .map_err(|e| CheckoutError::Configuration(format!("Invalid catalog: {}", e)))?;
        Self::new(file.currency, file.products)
    }

    /// Load catalog from a TOML file
    pub fn load(path: impl AsRef<Path>) -> CheckoutResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CheckoutError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// The demo plant catalog
    pub fn sample() -> Self {
        Self {
            currency: Currency::EUR,
            products: vec![
                Product::new(1, "basil", 600)
                    .with_image("assets/products/basil.jpg")
                    .with_description("basil tres coll"),
                Product::new(2, "cactus", 600)
                    .with_image("assets/products/cactus.jpg")
                    .with_description("cactus a rose"),
                Product::new(3, "calathea", 2)
                    .with_image("assets/products/calathea.jpg")
                    .with_description("calathea soleil."),
            ]
            .into_iter()
            .map(Arc::new)
            .collect(),
        }
    }
}
