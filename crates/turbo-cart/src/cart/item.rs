//! Products entering the cart and the line items they become.

use serde::{Deserialize, Serialize};

use crate::collab::{CatalogError, CatalogRecord};
use crate::error::CartError;
use crate::ids::ProductId;
use crate::money::{Currency, Money};

/// A product as the cart sees it: validated, priced, read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog identifier.
    pub id: ProductId,
    /// Display title.
    pub title: String,
    /// Primary image URL.
    pub image: Option<String>,
    /// Image shown on hover.
    pub hover_image: Option<String>,
    /// Price a buyer pays per unit.
    pub unit_price: Money,
    /// Undiscounted price, present when `unit_price` is a discount.
    pub compare_at_price: Option<Money>,
    /// Advertised discount percentage.
    pub offer_percentage: Option<u8>,
}

impl Product {
    /// Create a product with a plain price.
    pub fn new(
        id: impl Into<ProductId>,
        title: impl Into<String>,
        unit_price: Money,
    ) -> Result<Self, CartError> {
        let id = id.into();
        if unit_price.is_negative() {
            return Err(CartError::InvalidPrice {
                product_id: id.to_string(),
                amount_cents: unit_price.amount_cents,
            });
        }
        Ok(Self {
            id,
            title: title.into(),
            image: None,
            hover_image: None,
            unit_price,
            compare_at_price: None,
            offer_percentage: None,
        })
    }

    /// Set the primary image.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Validate a catalog record.
    ///
    /// The discount price, when present, becomes the unit price and the
    /// list price is kept as the compare-at price.
    pub fn from_record(record: CatalogRecord, currency: Currency) -> Result<Self, CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidRecord {
            id: record.id.to_string(),
            reason: reason.to_string(),
        };

        let title = match record.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return Err(invalid("missing title")),
        };
        let price = record.price.ok_or_else(|| invalid("missing price"))?;
        if price < 0 {
            return Err(invalid("negative price"));
        }

        let (unit_price, compare_at_price) = match record.discount_price {
            Some(discount) if discount < 0 => return Err(invalid("negative discount price")),
            Some(discount) if discount > price => {
                return Err(invalid("discount price above list price"))
            }
            Some(discount) => (
                Money::new(discount, currency),
                Some(Money::new(price, currency)),
            ),
            None => (Money::new(price, currency), None),
        };

        if record.offer_percentage.is_some_and(|p| p > 100) {
            return Err(invalid("offer percentage above 100"));
        }

        Ok(Self {
            id: record.id,
            title,
            image: record.image,
            hover_image: record.hover_image,
            unit_price,
            compare_at_price,
            offer_percentage: record.offer_percentage,
        })
    }

    /// Amount saved per unit against the compare-at price.
    pub fn savings(&self) -> Option<Money> {
        self.compare_at_price.map(|list| {
            Money::new(
                list.amount_cents - self.unit_price.amount_cents,
                self.unit_price.currency,
            )
        })
    }
}

/// One product entry in the cart.
///
/// Display fields and the unit price are snapshots taken when the product
/// was first added; later catalog changes do not reach them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product this line is for.
    pub product_id: ProductId,
    /// Title at add time.
    pub title: String,
    /// Image at add time.
    pub image: Option<String>,
    /// Unit price at add time.
    pub unit_price: Money,
    /// Always at least 1.
    pub quantity: i64,
}

impl LineItem {
    /// Snapshot a product into a new line.
    pub(crate) fn from_product(product: &Product, quantity: i64) -> Self {
        Self {
            product_id: product.id.clone(),
            title: product.title.clone(),
            image: product.image.clone(),
            unit_price: product.unit_price,
            quantity,
        }
    }

    /// `unit_price * quantity`.
    pub fn line_total(&self) -> Result<Money, CartError> {
        self.unit_price
            .checked_mul(self.quantity)
            .ok_or(CartError::Overflow)
    }
}

/// Read a quantity typed into a form field.
pub fn parse_quantity_input(text: &str) -> Result<i64, CartError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CartError::InvalidQuantityInput(text.to_string()));
    }
    let quantity: i64 = trimmed
        .parse()
        .map_err(|_| CartError::InvalidQuantityInput(text.to_string()))?;
    if quantity <= 0 {
        return Err(CartError::InvalidQuantity(quantity));
    }
    Ok(quantity)
}

/// Quantity picker shown next to an add-to-cart button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityStepper {
    value: i64,
    max: i64,
}

impl QuantityStepper {
    pub fn new(max: i64) -> Self {
        Self {
            value: 1,
            max: max.max(1),
        }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn increment(&mut self) {
        if self.value < self.max {
            self.value += 1;
        }
    }

    /// Never goes below 1.
    pub fn decrement(&mut self) {
        if self.value > 1 {
            self.value -= 1;
        }
    }

    /// Replace the value from field text. Invalid text leaves it unchanged.
    pub fn set_input(&mut self, text: &str) -> Result<i64, CartError> {
        let quantity = parse_quantity_input(text)?;
        if quantity > self.max {
            return Err(CartError::QuantityExceedsLimit(quantity, self.max));
        }
        self.value = quantity;
        Ok(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(price: Option<i64>, discount: Option<i64>) -> CatalogRecord {
        CatalogRecord {
            id: ProductId::from(1u64),
            title: Some("Linen Shirt".into()),
            image: None,
            hover_image: None,
            price,
            discount_price: discount,
            offer_percentage: None,
            desc: None,
        }
    }

    #[test]
    fn test_product_rejects_negative_price() {
        let err = Product::new(1u64, "Broken", Money::new(-1, Currency::USD)).unwrap_err();
        assert!(matches!(err, CartError::InvalidPrice { .. }));
    }

    #[test]
    fn test_record_discount_becomes_unit_price() {
        let product = Product::from_record(record(Some(1500), Some(1200)), Currency::USD).unwrap();
        assert_eq!(product.unit_price.amount_cents, 1200);
        assert_eq!(product.compare_at_price.map(|m| m.amount_cents), Some(1500));
        assert_eq!(product.savings().map(|m| m.amount_cents), Some(300));
    }

    #[test]
    fn test_record_validation() {
        assert!(Product::from_record(record(None, None), Currency::USD).is_err());
        assert!(Product::from_record(record(Some(-5), None), Currency::USD).is_err());
        assert!(Product::from_record(record(Some(100), Some(200)), Currency::USD).is_err());

        let mut untitled = record(Some(100), None);
        untitled.title = Some("   ".into());
        assert!(Product::from_record(untitled, Currency::USD).is_err());
    }

    #[test]
    fn test_line_total() {
        let product = Product::new(1u64, "Shirt", Money::new(500, Currency::USD)).unwrap();
        let line = LineItem::from_product(&product, 5);
        assert_eq!(line.line_total().unwrap().amount_cents, 2500);
    }

    #[test]
    fn test_parse_quantity_input() {
        assert_eq!(parse_quantity_input(" 3 "), Ok(3));
        assert_eq!(
            parse_quantity_input(""),
            Err(CartError::InvalidQuantityInput(String::new()))
        );
        assert!(matches!(
            parse_quantity_input("two"),
            Err(CartError::InvalidQuantityInput(_))
        ));
        assert_eq!(parse_quantity_input("0"), Err(CartError::InvalidQuantity(0)));
        assert_eq!(parse_quantity_input("-4"), Err(CartError::InvalidQuantity(-4)));
    }

    #[test]
    fn test_stepper_bounds() {
        let mut stepper = QuantityStepper::new(3);
        stepper.decrement();
        assert_eq!(stepper.value(), 1);

        stepper.increment();
        stepper.increment();
        stepper.increment();
        assert_eq!(stepper.value(), 3);

        assert!(stepper.set_input("abc").is_err());
        assert_eq!(stepper.value(), 3);
        assert!(stepper.set_input("9").is_err());
        assert_eq!(stepper.set_input("2"), Ok(2));
    }
}
