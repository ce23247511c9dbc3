//! Cart error types.

use thiserror::Error;

use crate::collab::CatalogError;

/// Errors returned by cart operations.
///
/// Only input problems reach the caller. Remote confirmation failures are
/// absorbed by the store and surfaced as notifications instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Quantity was zero or negative where a positive one is required.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Quantity text could not be read as a number.
    #[error("Invalid quantity input: {0:?}")]
    InvalidQuantityInput(String),

    /// Quantity exceeds maximum allowed.
    #[error("Quantity {0} exceeds maximum allowed ({1})")]
    QuantityExceedsLimit(i64, i64),

    /// Unit price below zero.
    #[error("Invalid price for {product_id}: {amount_cents}")]
    InvalidPrice {
        product_id: String,
        amount_cents: i64,
    },

    /// Product price is in a different currency than the cart.
    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: String, got: String },

    /// Arithmetic overflow.
    #[error("Arithmetic overflow in money calculation")]
    Overflow,

    /// A user-input mutation arrived while a confirmation is outstanding.
    #[error("Cart is busy confirming a previous change")]
    Busy,

    /// Product lookup failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl CartError {
    /// True for errors caused by what the caller passed in.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidQuantity(_)
                | Self::InvalidQuantityInput(_)
                | Self::QuantityExceedsLimit(..)
                | Self::InvalidPrice { .. }
                | Self::CurrencyMismatch { .. }
        )
    }
}
