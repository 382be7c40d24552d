//! Turns an untrusted checkout body into priced order lines and clean
//! customer details. Nothing here touches storage.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::errors::DomainError;
use crate::domain::order::{CustomerDetails, OrderItem};

static PHONE_PK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((\+92)|(0))3[0-9]{9}$").expect("phone pattern is valid"));

const UNKNOWN_PRODUCT: &str = "Unknown Product";

// ── Request DTOs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshotInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub image: Option<String>,
}

/// One cart line the customer selected for checkout. Prices come from the
/// client cart and are only sanitised, not trusted for anything but display
/// and totals.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSelection {
    pub product_id: Option<String>,
    pub color_name: Option<String>,
    #[schema(value_type = Option<i32>)]
    pub quantity: Option<Value>,
    pub product_name: Option<String>,
    pub product_slug: Option<String>,
    pub product_image: Option<String>,
    #[schema(value_type = Option<f64>)]
    pub unit_price: Option<Value>,
    #[schema(value_type = Option<f64>)]
    pub delivery_fee: Option<Value>,
    pub product_snapshot: Option<ProductSnapshotInput>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetailsInput {
    pub full_name: Option<String>,
    pub phone_pk: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub tehsil: Option<String>,
    pub district: Option<String>,
    pub house_address: Option<String>,
    pub shop_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub selected_items: Option<Vec<CheckoutSelection>>,
    pub customer_details: Option<CustomerDetailsInput>,
}

/// The validated result: lines with `line_total` filled in, and trimmed details.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub items: Vec<OrderItem>,
    pub customer: CustomerDetails,
}

// ── Normalization ────────────────────────────────────────────────────────────

pub fn is_valid_pakistani_phone(value: &str) -> bool {
    PHONE_PK.is_match(value.trim())
}

pub fn normalize_checkout(request: CheckoutRequest) -> Result<OrderDraft, DomainError> {
    let selected = request.selected_items.unwrap_or_default();
    if selected.is_empty() {
        return Err(invalid("Select at least one item before checkout."));
    }
    let details = request
        .customer_details
        .ok_or_else(|| invalid("Customer details are required."))?;

    let customer = normalize_customer(details)?;
    let items = selected
        .iter()
        .enumerate()
        .map(|(index, selection)| normalize_item(index, selection))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(OrderDraft { items, customer })
}

fn normalize_customer(details: CustomerDetailsInput) -> Result<CustomerDetails, DomainError> {
    let full_name = required(details.full_name, "Full name")?;
    let phone_pk = required(details.phone_pk, "Phone number")?;
    if !is_valid_pakistani_phone(&phone_pk) {
        return Err(invalid("Enter a valid Pakistani phone number."));
    }
    Ok(CustomerDetails {
        full_name,
        phone_pk,
        province: required(details.province, "Province")?,
        city: required(details.city, "City")?,
        tehsil: required(details.tehsil, "Tehsil")?,
        district: required(details.district, "District")?,
        house_address: required(details.house_address, "House address")?,
        shop_name: trimmed(details.shop_name.as_deref()).unwrap_or_default(),
    })
}

fn normalize_item(index: usize, selection: &CheckoutSelection) -> Result<OrderItem, DomainError> {
    let product_id = trimmed(selection.product_id.as_deref());
    let color = trimmed(selection.color_name.as_deref());
    let (Some(product_id), Some(color)) = (product_id, color) else {
        return Err(invalid(format!(
            "Selected item #{} is missing product or color.",
            index + 1
        )));
    };

    let snapshot = selection.product_snapshot.clone().unwrap_or_default();
    let name = trimmed(selection.product_name.as_deref())
        .or_else(|| trimmed(snapshot.name.as_deref()))
        .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string());
    let slug = trimmed(selection.product_slug.as_deref())
        .or_else(|| trimmed(snapshot.slug.as_deref()))
        .unwrap_or_default();
    let image = trimmed(selection.product_image.as_deref())
        .or_else(|| trimmed(snapshot.image.as_deref()))
        .unwrap_or_default();

    let quantity = coerce_quantity(selection.quantity.as_ref());
    let unit_price = coerce_money(selection.unit_price.as_ref());
    let delivery_fee = coerce_money(selection.delivery_fee.as_ref());
    let line_total = unit_price.clone() * BigDecimal::from(quantity);

    Ok(OrderItem {
        product_id,
        name,
        slug,
        image,
        color,
        quantity,
        unit_price,
        delivery_fee,
        line_total,
    })
}

/// Integer >= 1. Zero, garbage and negatives become 1; fractions are floored.
pub fn coerce_quantity(value: Option<&Value>) -> i32 {
    let parsed = value.and_then(as_number).filter(|n| n.is_finite() && *n != 0.0);
    match parsed {
        Some(n) => n.floor().clamp(1.0, f64::from(i32::MAX)) as i32,
        None => 1,
    }
}

/// Non-negative amount. Garbage, negatives and values outside the `f64`
/// range become 0.
pub fn coerce_money(value: Option<&Value>) -> BigDecimal {
    match value.and_then(as_number) {
        Some(n) if n.is_finite() && n > 0.0 => {
            BigDecimal::from_str(&n.to_string()).unwrap_or_else(|_| BigDecimal::from(0))
        }
        _ => BigDecimal::from(0),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn required(value: Option<String>, label: &str) -> Result<String, DomainError> {
    trimmed(value.as_deref()).ok_or_else(|| invalid(format!("{label} is required.")))
}

fn invalid(message: impl Into<String>) -> DomainError {
    DomainError::InvalidInput(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> CheckoutRequest {
        serde_json::from_value(body).expect("request should deserialize")
    }

    fn customer() -> Value {
        json!({
            "fullName": "  Ayesha Khan ",
            "phonePk": "03001234567",
            "province": "Punjab",
            "city": "Lahore",
            "tehsil": "Model Town",
            "district": "Lahore",
            "houseAddress": " House 12, Street 4 "
        })
    }

    fn message(err: DomainError) -> String {
        match err {
            DomainError::InvalidInput(msg) => msg,
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn phone_pattern_accepts_local_and_international_forms() {
        assert!(is_valid_pakistani_phone("03001234567"));
        assert!(is_valid_pakistani_phone("+923001234567"));
        assert!(is_valid_pakistani_phone(" 03451234567 "));
        assert!(!is_valid_pakistani_phone("123456"));
        assert!(!is_valid_pakistani_phone("04001234567"));
        assert!(!is_valid_pakistani_phone("0300123456"));
        assert!(!is_valid_pakistani_phone("9203001234567"));
    }

    #[test]
    fn rejects_invalid_phone() {
        let mut details = customer();
        details["phonePk"] = json!("123456");
        let err = normalize_checkout(request(json!({
            "selectedItems": [{"productId": "p1", "colorName": "Black", "quantity": 1}],
            "customerDetails": details
        })))
        .unwrap_err();

        assert_eq!(message(err), "Enter a valid Pakistani phone number.");
    }

    #[test]
    fn rejects_empty_selection_and_missing_details() {
        let err = normalize_checkout(request(json!({ "customerDetails": customer() }))).unwrap_err();
        assert_eq!(message(err), "Select at least one item before checkout.");

        let err = normalize_checkout(request(json!({
            "selectedItems": [{"productId": "p1", "colorName": "Black"}]
        })))
        .unwrap_err();
        assert_eq!(message(err), "Customer details are required.");
    }

    #[test]
    fn reports_first_blank_customer_field() {
        let mut details = customer();
        details["tehsil"] = json!("   ");
        details["district"] = json!("");
        let err = normalize_checkout(request(json!({
            "selectedItems": [{"productId": "p1", "colorName": "Black"}],
            "customerDetails": details
        })))
        .unwrap_err();

        assert_eq!(message(err), "Tehsil is required.");
    }

    #[test]
    fn rejects_line_without_product_or_color() {
        let err = normalize_checkout(request(json!({
            "selectedItems": [
                {"productId": "p1", "colorName": "Black"},
                {"productId": "p2", "colorName": "  "}
            ],
            "customerDetails": customer()
        })))
        .unwrap_err();

        assert_eq!(message(err), "Selected item #2 is missing product or color.");
    }

    #[test]
    fn normalizes_lines_and_details() {
        let draft = normalize_checkout(request(json!({
            "selectedItems": [
                {
                    "productId": " p1 ",
                    "colorName": " Black ",
                    "quantity": 2.9,
                    "unitPrice": 1499.5,
                    "deliveryFee": "200",
                    "productSnapshot": {"name": "Steel Kettle", "slug": "steel-kettle", "image": "k.jpg"}
                },
                {
                    "productId": "p2",
                    "colorName": "Red",
                    "quantity": -3,
                    "productName": "Mug",
                    "unitPrice": -10,
                    "deliveryFee": "abc"
                }
            ],
            "customerDetails": customer()
        })))
        .unwrap();

        let first = &draft.items[0];
        assert_eq!(first.product_id, "p1");
        assert_eq!(first.color, "Black");
        assert_eq!(first.quantity, 2);
        assert_eq!(first.name, "Steel Kettle");
        assert_eq!(first.slug, "steel-kettle");
        assert_eq!(first.image, "k.jpg");
        assert_eq!(first.unit_price, BigDecimal::from_str("1499.5").unwrap());
        assert_eq!(first.delivery_fee, BigDecimal::from(200));
        assert_eq!(first.line_total, BigDecimal::from(2999));

        let second = &draft.items[1];
        assert_eq!(second.quantity, 1);
        assert_eq!(second.name, "Mug");
        assert_eq!(second.unit_price, BigDecimal::from(0));
        assert_eq!(second.delivery_fee, BigDecimal::from(0));
        assert_eq!(second.line_total, BigDecimal::from(0));

        assert_eq!(draft.customer.full_name, "Ayesha Khan");
        assert_eq!(draft.customer.house_address, "House 12, Street 4");
        assert_eq!(draft.customer.shop_name, "");
    }

    #[test]
    fn name_falls_back_to_unknown_product() {
        let draft = normalize_checkout(request(json!({
            "selectedItems": [{"productId": "p1", "colorName": "Black", "productName": " "}],
            "customerDetails": customer()
        })))
        .unwrap();

        assert_eq!(draft.items[0].name, "Unknown Product");
        assert_eq!(draft.items[0].quantity, 1);
    }

    #[test]
    fn quantity_coercion() {
        assert_eq!(coerce_quantity(None), 1);
        assert_eq!(coerce_quantity(Some(&json!(0))), 1);
        assert_eq!(coerce_quantity(Some(&json!(0.5))), 1);
        assert_eq!(coerce_quantity(Some(&json!("4"))), 4);
        assert_eq!(coerce_quantity(Some(&json!("lots"))), 1);
        assert_eq!(coerce_quantity(Some(&json!(null))), 1);
        assert_eq!(coerce_quantity(Some(&json!(7))), 7);
    }

    #[test]
    fn money_outside_f64_range_becomes_zero() {
        let zero = BigDecimal::from(0);
        assert_eq!(coerce_money(Some(&json!("1e400"))), zero);
        assert_eq!(coerce_money(Some(&json!("1e10000000"))), zero);
        assert_eq!(coerce_money(Some(&json!("-1e400"))), zero);
        assert_eq!(coerce_money(Some(&json!("NaN"))), zero);
        assert_eq!(coerce_money(Some(&json!("inf"))), zero);
        assert_eq!(coerce_money(Some(&json!(" 12.75 "))), BigDecimal::from_str("12.75").unwrap());
        assert_eq!(coerce_money(Some(&json!(1e3))), BigDecimal::from(1000));
    }

    #[test]
    fn huge_price_strings_price_the_order_at_zero() {
        let draft = normalize_checkout(request(json!({
            "selectedItems": [{
                "productId": "p1",
                "colorName": "Black",
                "quantity": 3,
                "unitPrice": "1e10000000",
                "deliveryFee": "1e400"
            }],
            "customerDetails": customer()
        })))
        .unwrap();

        let pricing = crate::domain::order::Pricing::from_items(&draft.items);
        assert_eq!(draft.items[0].line_total, BigDecimal::from(0));
        assert_eq!(pricing.grand_total, BigDecimal::from(0));
    }
}
