//! Shopping cart module.
//!
//! Contains the cart value, its line items, totals, and the store that owns
//! the session's cart.

mod cart;
mod item;
mod store;
mod totals;

pub use cart::{Cart, CartOwner};
pub use item::{parse_quantity_input, LineItem, Product, QuantityStepper};
pub use store::{CartSnapshot, CartStore};
pub use totals::{compute_total, compute_totals, CartTotals};
