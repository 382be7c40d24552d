use std::sync::Arc;

use log::{info, warn};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{
    generate_order_number, Identity, ListResult, NewOrder, OrderView, PlacedOrder, Pricing,
};
use crate::domain::ports::{ArchivePayload, OrderRepository};
use crate::domain::product::StockPlan;

use super::checkout::OrderDraft;

/// The result of a committed placement: what the caller gets back, and what
/// the archival side-channel needs afterwards.
#[derive(Debug, Clone)]
pub struct Placement {
    pub placed: PlacedOrder,
    pub archive_payload: ArchivePayload,
}

#[derive(Clone)]
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
}

impl OrderService {
    pub fn new(repo: Arc<dyn OrderRepository>) -> Self {
        Self { repo }
    }

    /// Prices the draft, then decrements stock and writes the order in one
    /// transaction. Blocking; call from a blocking context.
    pub fn place_order(&self, identity: &Identity, draft: OrderDraft) -> Result<Placement, DomainError> {
        let pricing = Pricing::from_items(&draft.items);
        let plan = StockPlan::from_items(&draft.items);
        if plan.is_empty() {
            return Err(DomainError::InvalidInput(
                "Select at least one item before checkout.".to_string(),
            ));
        }

        let order = NewOrder {
            id: Uuid::new_v4(),
            order_number: generate_order_number(),
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            customer: draft.customer,
            items: draft.items,
            pricing,
        };

        match self.repo.place(&order, &plan) {
            Ok(created_at) => {
                info!(
                    "Placed order {} ({}) for {} with {} line(s)",
                    order.order_number,
                    order.id,
                    order.uid,
                    order.items.len()
                );
                Ok(Placement {
                    placed: PlacedOrder {
                        order_id: order.id,
                        order_number: order.order_number.clone(),
                    },
                    archive_payload: ArchivePayload::from_new_order(&order, created_at),
                })
            }
            Err(e) => {
                if e.is_stock_conflict() {
                    info!("Order for {} rejected: {}", order.uid, e);
                } else {
                    warn!("Order for {} failed: {}", order.uid, e);
                }
                Err(e)
            }
        }
    }

    /// An order is only visible to the customer who placed it.
    pub fn get_order(&self, uid: &str, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        Ok(self.repo.find_by_id(id)?.filter(|order| order.uid == uid))
    }

    pub fn list_orders(&self, uid: &str, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        self.repo.list_for_user(uid, page, limit)
    }
}
