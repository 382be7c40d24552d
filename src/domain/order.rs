use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use super::errors::DomainError;

/// Serializes money as a plain JSON number for consumers that expect numeric cells.
pub mod money {
    use bigdecimal::{BigDecimal, ToPrimitive};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.to_f64().unwrap_or(0.0))
    }
}

/// The caller as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub full_name: String,
    pub phone_pk: String,
    pub province: String,
    pub city: String,
    pub tehsil: String,
    pub district: String,
    pub house_address: String,
    pub shop_name: String,
}

/// Snapshot of one purchased line. Never changes after the order is created.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub slug: String,
    pub image: String,
    pub color: String,
    pub quantity: i32,
    #[serde(serialize_with = "money::serialize")]
    pub unit_price: BigDecimal,
    #[serde(serialize_with = "money::serialize")]
    pub delivery_fee: BigDecimal,
    #[serde(serialize_with = "money::serialize")]
    pub line_total: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    #[serde(serialize_with = "money::serialize")]
    pub subtotal: BigDecimal,
    #[serde(serialize_with = "money::serialize")]
    pub delivery_total: BigDecimal,
    #[serde(serialize_with = "money::serialize")]
    pub grand_total: BigDecimal,
}

impl Pricing {
    /// Delivery fees are charged once per line, not per unit.
    pub fn from_items(items: &[OrderItem]) -> Self {
        let subtotal: BigDecimal = items
            .iter()
            .map(|i| i.unit_price.clone() * BigDecimal::from(i.quantity))
            .sum();
        let delivery_total: BigDecimal = items.iter().map(|i| i.delivery_fee.clone()).sum();
        let grand_total = subtotal.clone() + delivery_total.clone();
        Self {
            subtotal,
            delivery_total,
            grand_total,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::Internal(format!("unknown order status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStatus {
    Archived,
    Delayed,
}

impl ArchiveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveStatus::Archived => "archived",
            ArchiveStatus::Delayed => "delayed",
        }
    }
}

impl FromStr for ArchiveStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "archived" => Ok(ArchiveStatus::Archived),
            "delayed" => Ok(ArchiveStatus::Delayed),
            other => Err(DomainError::Internal(format!("unknown archive status '{other}'"))),
        }
    }
}

/// What the archival side-channel learned about an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived { sheet_id: String, sheet_url: String },
    Delayed,
}

impl ArchiveOutcome {
    pub fn status(&self) -> ArchiveStatus {
        match self {
            ArchiveOutcome::Archived { .. } => ArchiveStatus::Archived,
            ArchiveOutcome::Delayed => ArchiveStatus::Delayed,
        }
    }
}

/// A fully priced order, ready to be written together with its stock decrements.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub order_number: String,
    pub uid: String,
    pub email: String,
    pub customer: CustomerDetails,
    pub items: Vec<OrderItem>,
    pub pricing: Pricing,
}

#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: Uuid,
    pub order_number: String,
    pub uid: String,
    pub email: String,
    pub customer: CustomerDetails,
    pub items: Vec<OrderItem>,
    pub pricing: Pricing,
    pub status: OrderStatus,
    pub archive_status: Option<ArchiveStatus>,
    pub order_sheet_id: Option<String>,
    pub order_sheet_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    pub order_id: Uuid,
    pub order_number: String,
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub items: Vec<OrderView>,
    pub total: i64,
}

/// Human-facing order number: `ALM-<last 8 digits of epoch millis>-<100..=999>`.
///
/// Collisions are possible and are not checked against existing orders.
pub fn generate_order_number() -> String {
    let stamp = Utc::now().timestamp_millis().rem_euclid(100_000_000);
    let suffix: u16 = rand::thread_rng().gen_range(100..1000);
    format!("ALM-{stamp:08}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn item(unit_price: &str, quantity: i32, delivery_fee: &str) -> OrderItem {
        let unit_price = BigDecimal::from_str(unit_price).unwrap();
        OrderItem {
            product_id: "p1".to_string(),
            name: "Kettle".to_string(),
            slug: "kettle".to_string(),
            image: String::new(),
            color: "Black".to_string(),
            quantity,
            line_total: unit_price.clone() * BigDecimal::from(quantity),
            unit_price,
            delivery_fee: BigDecimal::from_str(delivery_fee).unwrap(),
        }
    }

    #[test]
    fn pricing_sums_lines_and_delivery_fees() {
        let items = vec![item("1500", 2, "200"), item("99.50", 3, "150")];
        let pricing = Pricing::from_items(&items);

        assert_eq!(pricing.subtotal, BigDecimal::from_str("3298.50").unwrap());
        assert_eq!(pricing.delivery_total, BigDecimal::from(350));
        assert_eq!(
            pricing.grand_total,
            pricing.subtotal.clone() + pricing.delivery_total.clone()
        );
    }

    #[test]
    fn pricing_of_no_items_is_zero() {
        let pricing = Pricing::from_items(&[]);
        assert_eq!(pricing.grand_total, BigDecimal::from(0));
    }

    #[test]
    fn order_number_has_expected_shape() {
        let re = Regex::new(r"^ALM-\d{8}-\d{3}$").unwrap();
        for _ in 0..50 {
            let number = generate_order_number();
            assert!(re.is_match(&number), "unexpected order number {number}");
        }
    }

    #[test]
    fn statuses_round_trip_through_their_names() {
        for status in [OrderStatus::Pending, OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert_eq!(OrderStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(OrderStatus::from_str("shipped").is_err());
        assert_eq!(ArchiveStatus::from_str("delayed").unwrap(), ArchiveStatus::Delayed);
    }

    #[test]
    fn money_serializes_as_numbers() {
        let json = serde_json::to_value(item("250.5", 2, "0")).unwrap();
        assert_eq!(json["unitPrice"], serde_json::json!(250.5));
        assert_eq!(json["lineTotal"], serde_json::json!(501.0));
        assert_eq!(json["productId"], "p1");
    }
}
