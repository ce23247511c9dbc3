//! Cart totals.
//!
//! Derived on every read from the current items; nothing here is cached.

use serde::{Deserialize, Serialize};

use crate::cart::LineItem;
use crate::error::CartError;
use crate::money::{Currency, Money};

/// Summary figures shown alongside the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    /// Sum of line quantities.
    pub item_count: i64,
    /// Number of distinct lines.
    pub line_count: usize,
    /// Sum of `unit_price * quantity` over all lines.
    pub total: Money,
}

/// Sum of `unit_price * quantity` over `items`, in integer minor units.
///
/// Every line must be priced in `currency`.
pub fn compute_total(items: &[LineItem], currency: Currency) -> Result<Money, CartError> {
    items.iter().try_fold(Money::zero(currency), |acc, item| {
        if item.unit_price.currency != currency {
            return Err(CartError::CurrencyMismatch {
                expected: currency.code().to_string(),
                got: item.unit_price.currency.code().to_string(),
            });
        }
        acc.checked_add(&item.line_total()?)
            .ok_or(CartError::Overflow)
    })
}

/// Total plus item and line counts.
pub fn compute_totals(items: &[LineItem], currency: Currency) -> Result<CartTotals, CartError> {
    let item_count = items
        .iter()
        .try_fold(0i64, |acc, item| acc.checked_add(item.quantity))
        .ok_or(CartError::Overflow)?;
    Ok(CartTotals {
        item_count,
        line_count: items.len(),
        total: compute_total(items, currency)?,
    })
}
