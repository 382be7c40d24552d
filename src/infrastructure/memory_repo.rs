//! A mutex-guarded repository used by unit and handler tests. The whole of
//! `place` runs under one lock, which gives it the same all-or-nothing
//! behaviour as the Postgres transaction.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{
    ArchiveOutcome, ArchiveStatus, ListResult, NewOrder, OrderStatus, OrderView,
};
use crate::domain::ports::OrderRepository;
use crate::domain::product::{total_stock, Product, ProductColor, StockPlan};

#[derive(Default)]
struct State {
    products: HashMap<String, Product>,
    orders: Vec<OrderView>,
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    state: Mutex<State>,
}

impl InMemoryOrderRepository {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("repository lock poisoned")
    }

    pub fn add_product(&self, id: &str, name: &str, colors: &[(&str, i32)], is_deleted: bool) {
        let colors: Vec<ProductColor> = colors
            .iter()
            .map(|(color, stock)| ProductColor {
                color_name: color.to_string(),
                color_hex: "#000000".to_string(),
                stock: *stock,
            })
            .collect();
        let product = Product {
            id: id.to_string(),
            name: name.to_string(),
            is_deleted,
            total_stock: total_stock(&colors).expect("seeded stock fits i32"),
            colors,
        };
        self.state().products.insert(id.to_string(), product);
    }

    pub fn product(&self, id: &str) -> Option<Product> {
        self.state().products.get(id).cloned()
    }

    pub fn order_count(&self) -> usize {
        self.state().orders.len()
    }

    /// Moves an order's creation time, for exercising age-based queries.
    pub fn backdate(&self, id: Uuid, created_at: DateTime<Utc>) {
        if let Some(order) = self.state().orders.iter_mut().find(|o| o.id == id) {
            order.created_at = created_at;
        }
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn place(&self, order: &NewOrder, plan: &StockPlan) -> Result<DateTime<Utc>, DomainError> {
        let mut state = self.state();

        let mut updates = Vec::new();
        for (product_id, decrement) in plan.iter() {
            let colors = decrement.reserve(state.products.get(product_id))?;
            let total = total_stock(&colors)?;
            updates.push((product_id.clone(), colors, total));
        }
        for (product_id, colors, total) in updates {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.total_stock = total;
                product.colors = colors;
            }
        }

        let created_at = Utc::now();
        state.orders.push(OrderView {
            id: order.id,
            order_number: order.order_number.clone(),
            uid: order.uid.clone(),
            email: order.email.clone(),
            customer: order.customer.clone(),
            items: order.items.clone(),
            pricing: order.pricing.clone(),
            status: OrderStatus::Pending,
            archive_status: None,
            order_sheet_id: None,
            order_sheet_url: None,
            created_at,
        });
        Ok(created_at)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        Ok(self.state().orders.iter().find(|o| o.id == id).cloned())
    }

    fn list_for_user(&self, uid: &str, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        let state = self.state();
        let mut mine: Vec<OrderView> = state.orders.iter().filter(|o| o.uid == uid).cloned().collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = mine.len() as i64;
        let offset = usize::try_from(page.saturating_sub(1).saturating_mul(limit)).unwrap_or(0);
        Ok(ListResult {
            items: mine.into_iter().skip(offset).take(limit as usize).collect(),
            total,
        })
    }

    fn record_archive_outcome(&self, id: Uuid, outcome: &ArchiveOutcome) -> Result<(), DomainError> {
        let mut state = self.state();
        let Some(order) = state.orders.iter_mut().find(|o| o.id == id) else {
            return Ok(());
        };
        match outcome {
            ArchiveOutcome::Archived { sheet_id, sheet_url } => {
                order.archive_status = Some(outcome.status());
                order.order_sheet_id = Some(sheet_id.clone());
                order.order_sheet_url = Some(sheet_url.clone());
            }
            ArchiveOutcome::Delayed => {
                if order.archive_status != Some(ArchiveStatus::Archived) {
                    order.archive_status = Some(outcome.status());
                }
            }
        }
        Ok(())
    }

    fn find_unarchived(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OrderView>, DomainError> {
        let state = self.state();
        let mut pending: Vec<OrderView> = state
            .orders
            .iter()
            .filter(|o| o.archive_status.is_none() && o.created_at < created_before)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }
}
