//! The cart value: owner plus ordered line items.

use serde::{Deserialize, Serialize};

use crate::cart::{compute_totals, CartTotals, LineItem};
use crate::error::CartError;
use crate::ids::{ProductId, SessionId, UserId};
use crate::money::{Currency, Money};

/// Who a cart belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CartOwner {
    /// No session established yet.
    #[default]
    Anonymous,
    /// Guest browsing session.
    Guest(SessionId),
    /// Signed-in user.
    User(UserId),
}

/// A shopping cart.
///
/// Lines are unique by product and keep insertion order. Only
/// [`CartStore`](crate::cart::CartStore) mutates a cart; everyone else works
/// with clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Owner of the cart.
    pub owner: CartOwner,
    /// Currency of every line.
    pub currency: Currency,
    items: Vec<LineItem>,
}

impl Cart {
    /// Create an empty cart.
    pub fn new(owner: CartOwner, currency: Currency) -> Self {
        Self {
            owner,
            currency,
            items: Vec::new(),
        }
    }

    /// Lines in insertion order.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Get a line by product.
    pub fn get(&self, product_id: &ProductId) -> Option<&LineItem> {
        self.items.iter().find(|i| &i.product_id == product_id)
    }

    pub(crate) fn get_mut(&mut self, product_id: &ProductId) -> Option<&mut LineItem> {
        self.items.iter_mut().find(|i| &i.product_id == product_id)
    }

    pub(crate) fn position(&self, product_id: &ProductId) -> Option<usize> {
        self.items.iter().position(|i| &i.product_id == product_id)
    }

    pub(crate) fn push(&mut self, item: LineItem) {
        debug_assert!(item.quantity >= 1);
        debug_assert!(self.get(&item.product_id).is_none());
        self.items.push(item);
    }

    /// Put a line back at `index` (clamped), replacing any line for the
    /// same product.
    pub(crate) fn restore(&mut self, index: usize, item: LineItem) {
        if let Some(existing) = self.get_mut(&item.product_id) {
            *existing = item;
            return;
        }
        let index = index.min(self.items.len());
        self.items.insert(index, item);
    }

    /// Remove a line. Returns whether one was present.
    pub(crate) fn remove(&mut self, product_id: &ProductId) -> bool {
        let len_before = self.items.len();
        self.items.retain(|i| &i.product_id != product_id);
        self.items.len() < len_before
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    /// Sum of quantities.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current total, derived from the lines.
    pub fn total(&self) -> Result<Money, CartError> {
        Ok(self.totals()?.total)
    }

    pub fn totals(&self) -> Result<CartTotals, CartError> {
        compute_totals(&self.items, self.currency)
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::new(CartOwner::Anonymous, Currency::USD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: u64, quantity: i64) -> LineItem {
        LineItem {
            product_id: ProductId::from(id),
            title: format!("Product {id}"),
            image: None,
            unit_price: Money::new(100, Currency::USD),
            quantity,
        }
    }

    #[test]
    fn test_cart_creation() {
        let cart = Cart::new(CartOwner::Guest(SessionId::new("sess-1")), Currency::USD);
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.total().unwrap(), Money::zero(Currency::USD));
    }

    #[test]
    fn test_restore_keeps_position() {
        let mut cart = Cart::default();
        cart.push(line(1, 1));
        cart.push(line(2, 1));
        cart.push(line(3, 1));

        assert!(cart.remove(&ProductId::from(2u64)));
        cart.restore(1, line(2, 4));

        let ids: Vec<&str> = cart.items().iter().map(|i| i.product_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(cart.item_count(), 6);
    }

    #[test]
    fn test_restore_clamps_index() {
        let mut cart = Cart::default();
        cart.restore(10, line(1, 2));
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn test_remove_absent_is_false() {
        let mut cart = Cart::default();
        assert!(!cart.remove(&ProductId::from(99u64)));
    }

    #[test]
    fn test_owner_serialization() {
        let json = serde_json::to_string(&CartOwner::User(UserId::new("u-1"))).unwrap();
        assert_eq!(json, r#"{"kind":"user","id":"u-1"}"#);
    }
}
