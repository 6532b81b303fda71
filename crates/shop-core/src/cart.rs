//! # Cart
//!
//! Shopping cart for leafcart. Lines hold a shared reference to the catalog
//! product rather than a copy, and there is never more than one line per
//! product.

use crate::error::{CheckoutError, CheckoutResult};
use crate::product::Product;
use serde::Serialize;
use std::sync::Arc;

/// A line in the cart
#[derive(Debug, Clone)]
pub struct CartLine {
    product: Arc<Product>,
    quantity: u32,
}

impl CartLine {
    pub fn product(&self) -> &Arc<Product> {
        &self.product
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Calculate the total price for this line
    pub fn total(&self) -> CheckoutResult<u64> {
        self.product
            .price
            .checked_mul(u64::from(self.quantity))
            .ok_or(CheckoutError::AmountOverflow {
                amount: self.product.price,
            })
    }
}

/// One row of the cart screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartRow {
    /// "basil x 2" with its line total
    Line {
        product_id: u64,
        label: String,
        total: u64,
    },
    /// Trailing totals row
    Summary { total: u64 },
}

/// The user's selected lines, in the order they were first added
#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Add `quantity` of a product, merging into its existing line
    pub fn add(&mut self, product: Arc<Product>, quantity: u32) -> CheckoutResult<()> {
        if quantity == 0 {
            return Err(CheckoutError::InvalidQuantity {
                product_id: product.id,
                quantity,
            });
        }

        match self.lines.iter_mut().find(|l| l.product.id == product.id) {
            Some(line) => {
                line.quantity = line.quantity.checked_add(quantity).ok_or(
                    CheckoutError::InvalidQuantity {
                        product_id: product.id,
                        quantity,
                    },
                )?;
            }
            None => self.lines.push(CartLine { product, quantity }),
        }
        Ok(())
    }

    /// Set a line's quantity; zero removes the line
    pub fn set_quantity(&mut self, product_id: u64, quantity: u32) -> CheckoutResult<()> {
        if quantity == 0 {
            self.remove(product_id);
            return Ok(());
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product.id == product_id)
            .ok_or(CheckoutError::ProductNotFound { product_id })?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove a product's line, returning it if present
    pub fn remove(&mut self, product_id: u64) -> Option<CartLine> {
        let index = self.lines.iter().position(|l| l.product.id == product_id)?;
        Some(self.lines.remove(index))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: u64) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product.id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of quantities across all lines
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of line totals, in the product price unit
    pub fn total_price(&self) -> CheckoutResult<u64> {
        self.lines.iter().try_fold(0_u64, |sum, line| {
            let total = line.total()?;
            sum.checked_add(total)
                .ok_or(CheckoutError::AmountOverflow { amount: total })
        })
    }

    /// Product ids as the backend counts them: one entry per unit purchased
    pub fn purchased_item_ids(&self) -> Vec<u64> {
        self.lines
            .iter()
            .flat_map(|l| std::iter::repeat(l.product.id).take(l.quantity as usize))
            .collect()
    }

    /// Cart screen rows: one per line, then the summary
    pub fn rows(&self) -> CheckoutResult<Vec<CartRow>> {
        let mut rows = self
            .lines
            .iter()
            .map(|l| {
                Ok(CartRow::Line {
                    product_id: l.product.id,
                    label: format!("{} x {}", l.product.name, l.quantity),
                    total: l.total()?,
                })
            })
            .collect::<CheckoutResult<Vec<_>>>()?;
        rows.push(CartRow::Summary {
            total: self.total_price()?,
        });
        Ok(rows)
    }
}
