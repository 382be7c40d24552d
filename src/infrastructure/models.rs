use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{
    ArchiveStatus, CustomerDetails, NewOrder, OrderItem, OrderStatus, OrderView, Pricing,
};
use crate::domain::product::{colors_from_json, Product};
use crate::schema::{order_items, orders, products};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub colors: Value,
    pub total_stock: i32,
    pub is_deleted: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            colors: colors_from_json(&row.colors),
            id: row.id,
            name: row.name,
            is_deleted: row.is_deleted,
            total_stock: row.total_stock,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub uid: String,
    pub email: String,
    pub full_name: String,
    pub phone_pk: String,
    pub province: String,
    pub city: String,
    pub tehsil: String,
    pub district: String,
    pub house_address: String,
    pub shop_name: String,
    pub subtotal: BigDecimal,
    pub delivery_total: BigDecimal,
    pub grand_total: BigDecimal,
    pub status: String,
    pub archive_status: Option<String>,
    pub order_sheet_id: Option<String>,
    pub order_sheet_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    pub fn into_view(self, items: Vec<OrderItemRow>) -> Result<OrderView, DomainError> {
        let mut items = items;
        items.sort_by_key(|i| i.position);
        Ok(OrderView {
            status: OrderStatus::from_str(&self.status)?,
            archive_status: self.archive_status.as_deref().map(ArchiveStatus::from_str).transpose()?,
            id: self.id,
            order_number: self.order_number,
            uid: self.uid,
            email: self.email,
            customer: CustomerDetails {
                full_name: self.full_name,
                phone_pk: self.phone_pk,
                province: self.province,
                city: self.city,
                tehsil: self.tehsil,
                district: self.district,
                house_address: self.house_address,
                shop_name: self.shop_name,
            },
            items: items.into_iter().map(OrderItem::from).collect(),
            pricing: Pricing {
                subtotal: self.subtotal,
                delivery_total: self.delivery_total,
                grand_total: self.grand_total,
            },
            order_sheet_id: self.order_sheet_id,
            order_sheet_url: self.order_sheet_url,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub uid: String,
    pub email: String,
    pub full_name: String,
    pub phone_pk: String,
    pub province: String,
    pub city: String,
    pub tehsil: String,
    pub district: String,
    pub house_address: String,
    pub shop_name: String,
    pub subtotal: BigDecimal,
    pub delivery_total: BigDecimal,
    pub grand_total: BigDecimal,
    pub status: String,
}

impl From<&NewOrder> for NewOrderRow {
    fn from(order: &NewOrder) -> Self {
        let c = &order.customer;
        NewOrderRow {
            id: order.id,
            order_number: order.order_number.clone(),
            uid: order.uid.clone(),
            email: order.email.clone(),
            full_name: c.full_name.clone(),
            phone_pk: c.phone_pk.clone(),
            province: c.province.clone(),
            city: c.city.clone(),
            tehsil: c.tehsil.clone(),
            district: c.district.clone(),
            house_address: c.house_address.clone(),
            shop_name: c.shop_name.clone(),
            subtotal: order.pricing.subtotal.clone(),
            delivery_total: order.pricing.delivery_total.clone(),
            grand_total: order.pricing.grand_total.clone(),
            status: OrderStatus::Pending.as_str().to_string(),
        }
    }
}

#[derive(
    Debug, Clone, Queryable, Selectable, Identifiable, Associations,
)]
#[diesel(table_name = order_items)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub position: i32,
    pub product_id: String,
    pub name: String,
    pub slug: String,
    pub image: String,
    pub color: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub line_total: BigDecimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            product_id: row.product_id,
            name: row.name,
            slug: row.slug,
            image: row.image,
            color: row.color,
            quantity: row.quantity,
            unit_price: row.unit_price,
            delivery_fee: row.delivery_fee,
            line_total: row.line_total,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_items)]
pub struct NewOrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub position: i32,
    pub product_id: String,
    pub name: String,
    pub slug: String,
    pub image: String,
    pub color: String,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub line_total: BigDecimal,
}

impl NewOrderItemRow {
    pub fn for_order(order: &NewOrder) -> Vec<Self> {
        order
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| NewOrderItemRow {
                id: Uuid::new_v4(),
                order_id: order.id,
                position: position as i32,
                product_id: item.product_id.clone(),
                name: item.name.clone(),
                slug: item.slug.clone(),
                image: item.image.clone(),
                color: item.color.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price.clone(),
                delivery_fee: item.delivery_fee.clone(),
                line_total: item.line_total.clone(),
            })
            .collect()
    }
}
