use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::application::checkout::{
    CheckoutRequest, CheckoutSelection, CustomerDetailsInput, ProductSnapshotInput,
};
use crate::handlers::orders::{
    CustomerDetailsResponse, ErrorResponse, ListOrdersResponse, OrderItemResponse, OrderResponse,
    PlaceOrderResponse, PricingResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::orders::place_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::list_orders,
    ),
    components(schemas(
        CheckoutRequest,
        CheckoutSelection,
        CustomerDetailsInput,
        ProductSnapshotInput,
        PlaceOrderResponse,
        ErrorResponse,
        OrderResponse,
        OrderItemResponse,
        PricingResponse,
        CustomerDetailsResponse,
        ListOrdersResponse,
    )),
    modifiers(&BearerAuth),
    tags((name = "orders", description = "Cash-on-delivery order placement"))
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
