use std::collections::BTreeMap;

use serde_json::{json, Value};

use super::errors::DomainError;
use super::order::OrderItem;

/// One color variant of a product; the unit of inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductColor {
    pub color_name: String,
    pub color_hex: String,
    pub stock: i32,
}

impl ProductColor {
    pub fn matches(&self, name: &str) -> bool {
        same_color(&self.color_name, name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub is_deleted: bool,
    pub colors: Vec<ProductColor>,
    pub total_stock: i32,
}

pub fn same_color(left: &str, right: &str) -> bool {
    left.trim().to_lowercase() == right.trim().to_lowercase()
}

/// Sum of all color stocks. Fails when the sum does not fit the stored column.
pub fn total_stock(colors: &[ProductColor]) -> Result<i32, DomainError> {
    let sum: i64 = colors.iter().map(|c| i64::from(c.stock)).sum();
    i32::try_from(sum).map_err(|_| DomainError::Internal(format!("total stock {sum} out of range")))
}

/// Reads a stored color array. Stock is floored and clamped at zero; anything
/// that is not a number counts as zero.
pub fn colors_from_json(value: &Value) -> Vec<ProductColor> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .map(|c| ProductColor {
            color_name: text(&c["colorName"]),
            color_hex: text(&c["colorHex"]),
            stock: stock_level(&c["stock"]),
        })
        .collect()
}

pub fn colors_to_json(colors: &[ProductColor]) -> Value {
    Value::Array(
        colors
            .iter()
            .map(|c| {
                json!({
                    "colorName": c.color_name,
                    "colorHex": c.color_hex,
                    "stock": c.stock,
                })
            })
            .collect(),
    )
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn stock_level(value: &Value) -> i32 {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(n) if n.is_finite() => n.floor().clamp(0.0, f64::from(i32::MAX)) as i32,
        _ => 0,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorDecrement {
    pub color: String,
    pub quantity: i64,
}

/// Everything one order takes from a single product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDecrement {
    /// Name used in customer-facing errors, taken from the first matching line.
    pub display_name: String,
    pub colors: Vec<ColorDecrement>,
}

impl ProductDecrement {
    /// Checks the product against this decrement and returns the colors as they
    /// would be after it. The input is never modified, so a failure leaves no trace.
    pub fn reserve(&self, product: Option<&Product>) -> Result<Vec<ProductColor>, DomainError> {
        let product = product.ok_or_else(|| DomainError::ProductNotFound(self.display_name.clone()))?;
        if product.is_deleted {
            return Err(DomainError::ProductUnavailable(self.display_name.clone()));
        }

        let mut colors = product.colors.clone();
        for wanted in &self.colors {
            let color = colors
                .iter_mut()
                .find(|c| c.matches(&wanted.color))
                .ok_or_else(|| DomainError::ColorNotFound(self.display_name.clone()))?;
            if i64::from(color.stock) < wanted.quantity {
                return Err(DomainError::InsufficientStock {
                    product: self.display_name.clone(),
                    color: wanted.color.clone(),
                });
            }
            // quantity <= stock <= i32::MAX here
            color.stock -= wanted.quantity as i32;
        }
        Ok(colors)
    }
}

/// Required decrements grouped by product id and then by color, with duplicate
/// lines for the same product and color summed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockPlan {
    products: BTreeMap<String, ProductDecrement>,
}

impl StockPlan {
    pub fn from_items(items: &[OrderItem]) -> Self {
        let mut products: BTreeMap<String, ProductDecrement> = BTreeMap::new();
        for item in items {
            let entry = products
                .entry(item.product_id.clone())
                .or_insert_with(|| ProductDecrement {
                    display_name: item.name.clone(),
                    colors: Vec::new(),
                });
            match entry.colors.iter_mut().find(|c| same_color(&c.color, &item.color)) {
                Some(existing) => existing.quantity += i64::from(item.quantity),
                None => entry.colors.push(ColorDecrement {
                    color: item.color.clone(),
                    quantity: i64::from(item.quantity),
                }),
            }
        }
        Self { products }
    }

    /// Product ids in ascending order, which is also the order rows get locked in.
    pub fn product_ids(&self) -> Vec<String> {
        self.products.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProductDecrement)> {
        self.products.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
