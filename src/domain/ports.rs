use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::errors::{ArchiveError, DomainError};
use super::order::{
    ArchiveOutcome, CustomerDetails, Identity, ListResult, NewOrder, OrderItem, OrderView, Pricing,
};
use super::product::StockPlan;

pub trait OrderRepository: Send + Sync + 'static {
    /// Applies every decrement in `plan` and writes `order`, all or nothing.
    fn place(&self, order: &NewOrder, plan: &StockPlan) -> Result<DateTime<Utc>, DomainError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError>;
    fn list_for_user(&self, uid: &str, page: i64, limit: i64) -> Result<ListResult, DomainError>;
    /// Merges the archival result into the order. A `Delayed` outcome never
    /// replaces an `Archived` one.
    fn record_archive_outcome(&self, id: Uuid, outcome: &ArchiveOutcome) -> Result<(), DomainError>;
    /// Oldest orders created before `created_before` that were never archived.
    fn find_unarchived(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OrderView>, DomainError>;
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Resolves a bearer token to the caller's identity. Bad tokens yield
    /// `DomainError::Unauthenticated`.
    async fn verify(&self, token: &str) -> Result<Identity, DomainError>;
}

/// Identifies this storefront to the archival endpoint.
pub const ARCHIVE_SOURCE: &str = "almarky-web";

/// Body sent to the archival endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivePayload {
    pub source: &'static str,
    pub order_id: Uuid,
    pub order_number: String,
    pub uid: String,
    pub email: String,
    pub customer_details: CustomerDetails,
    pub items: Vec<OrderItem>,
    pub pricing: Pricing,
    pub created_at: DateTime<Utc>,
}

impl ArchivePayload {
    pub fn from_new_order(order: &NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            source: ARCHIVE_SOURCE,
            order_id: order.id,
            order_number: order.order_number.clone(),
            uid: order.uid.clone(),
            email: order.email.clone(),
            customer_details: order.customer.clone(),
            items: order.items.clone(),
            pricing: order.pricing.clone(),
            created_at,
        }
    }

    pub fn from_view(order: &OrderView) -> Self {
        Self {
            source: ARCHIVE_SOURCE,
            order_id: order.id,
            order_number: order.order_number.clone(),
            uid: order.uid.clone(),
            email: order.email.clone(),
            customer_details: order.customer.clone(),
            items: order.items.clone(),
            pricing: order.pricing.clone(),
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveReceipt {
    pub sheet_id: String,
    pub sheet_url: String,
    /// Whether the master ledger row was appended as well.
    pub master_logged: bool,
}

#[async_trait]
pub trait OrderArchiver: Send + Sync + 'static {
    async fn archive(&self, payload: &ArchivePayload) -> Result<ArchiveReceipt, ArchiveError>;
}
