use actix_web::{web, HttpRequest, HttpResponse};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::checkout::{normalize_checkout, CheckoutRequest};
use crate::domain::order::{CustomerDetails, OrderItem, OrderView, Pricing};
use crate::errors::AppError;
use crate::AppState;

use super::auth::bearer_token;

pub const ORDER_PLACED: &str = "Order placed successfully.";

// ── Response DTOs ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetailsResponse {
    pub full_name: String,
    pub phone_pk: String,
    pub province: String,
    pub city: String,
    pub tehsil: String,
    pub district: String,
    pub house_address: String,
    pub shop_name: String,
}

/// Amounts are decimal strings, e.g. "1999.99".
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: String,
    pub name: String,
    pub slug: String,
    pub image: String,
    pub color: String,
    pub quantity: i32,
    pub unit_price: String,
    pub delivery_fee: String,
    pub line_total: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingResponse {
    pub subtotal: String,
    pub delivery_total: String,
    pub grand_total: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub email: String,
    pub status: String,
    /// `archived`, `delayed`, or absent while archival is still in flight.
    pub archive_status: Option<String>,
    pub customer_details: CustomerDetailsResponse,
    pub items: Vec<OrderItemResponse>,
    pub pricing: PricingResponse,
    pub created_at: String,
}

fn money(value: &BigDecimal) -> String {
    value.to_string()
}

impl From<CustomerDetails> for CustomerDetailsResponse {
    fn from(c: CustomerDetails) -> Self {
        Self {
            full_name: c.full_name,
            phone_pk: c.phone_pk,
            province: c.province,
            city: c.city,
            tehsil: c.tehsil,
            district: c.district,
            house_address: c.house_address,
            shop_name: c.shop_name,
        }
    }
}

impl From<OrderItem> for OrderItemResponse {
    fn from(i: OrderItem) -> Self {
        Self {
            unit_price: money(&i.unit_price),
            delivery_fee: money(&i.delivery_fee),
            line_total: money(&i.line_total),
            product_id: i.product_id,
            name: i.name,
            slug: i.slug,
            image: i.image,
            color: i.color,
            quantity: i.quantity,
        }
    }
}

impl From<Pricing> for PricingResponse {
    fn from(p: Pricing) -> Self {
        Self {
            subtotal: money(&p.subtotal),
            delivery_total: money(&p.delivery_total),
            grand_total: money(&p.grand_total),
        }
    }
}

impl From<OrderView> for OrderResponse {
    fn from(o: OrderView) -> Self {
        Self {
            id: o.id,
            order_number: o.order_number,
            email: o.email,
            status: o.status.to_string(),
            archive_status: o.archive_status.map(|s| s.as_str().to_string()),
            customer_details: o.customer.into(),
            items: o.items.into_iter().map(Into::into).collect(),
            pricing: o.pricing.into(),
            created_at: o.created_at.to_rfc3339(),
        }
    }
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders/place
///
/// Verifies the caller, validates the cart, then decrements stock and writes
/// the order in one transaction. The order is archived externally afterwards;
/// the response never waits for that.
#[utoipa::path(
    post,
    path = "/orders/place",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Order placed", body = PlaceOrderResponse),
        (status = 400, description = "Invalid cart or stock problem", body = ErrorResponse),
        (status = 401, description = "Missing or rejected token", body = ErrorResponse),
        (status = 500, description = "Unexpected failure", body = ErrorResponse),
        (status = 503, description = "Store or identity service unavailable", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
pub async fn place_order(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let identity = state.identity.verify(&token).await?;

    let request: CheckoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CheckoutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?
    };
    let draft = normalize_checkout(request)?;

    let orders = state.orders.clone();
    let placement = web::block(move || orders.place_order(&identity, draft)).await??;

    if let Some(archival) = &state.archival {
        archival.dispatch(placement.archive_payload);
    }

    Ok(HttpResponse::Ok().json(PlaceOrderResponse {
        order_id: placement.placed.order_id,
        order_number: placement.placed.order_number,
        message: ORDER_PLACED.to_string(),
    }))
}

/// GET /orders/{id}
///
/// Returns one of the caller's orders with its items. Orders belonging to
/// someone else are reported as not found.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 401, description = "Missing or rejected token", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
pub async fn get_order(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let identity = state.identity.verify(&token).await?;
    let order_id = path.into_inner();

    let orders = state.orders.clone();
    let order = web::block(move || orders.get_order(&identity.uid, order_id)).await??;

    match order {
        Some(order) => Ok(HttpResponse::Ok().json(OrderResponse::from(order))),
        None => Err(AppError::NotFound),
    }
}

/// GET /orders
///
/// Returns the caller's orders, newest first.
/// Use `page` (1-based) and `limit` to control pagination.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Paginated list of the caller's orders", body = ListOrdersResponse),
        (status = 401, description = "Missing or rejected token", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req)?;
    let identity = state.identity.verify(&token).await?;

    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);

    let orders = state.orders.clone();
    let result = web::block(move || orders.list_orders(&identity.uid, page, limit)).await??;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: result.items.into_iter().map(OrderResponse::from).collect(),
        total: result.total,
        page,
        limit,
    }))
}
