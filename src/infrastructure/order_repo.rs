use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use diesel::dsl;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use log::{debug, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{ArchiveOutcome, ArchiveStatus, ListResult, NewOrder, OrderView};
use crate::domain::ports::OrderRepository;
use crate::domain::product::{colors_to_json, total_stock, Product, StockPlan};
use crate::schema::{order_items, orders, products};

use super::models::{NewOrderItemRow, NewOrderRow, OrderItemRow, OrderRow, ProductRow};
use super::retry::RetryPolicy;

const CONFLICT_BACKOFF: Duration = Duration::from_millis(25);
/// Postgres reports both `lock_timeout` (55P03) and `statement_timeout` (57014)
/// with this message prefix.
const STATEMENT_CANCELLED: &str = "canceling statement due to";

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::SerializationFailure, info) => {
                DomainError::Conflict(info.message().to_string())
            }
            diesel::result::Error::DatabaseError(_, info)
                if info.message().starts_with(STATEMENT_CANCELLED) =>
            {
                DomainError::Unavailable(info.message().to_string())
            }
            other => DomainError::Internal(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Unavailable(format!("database connection: {e}"))
    }
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct DieselOrderRepository {
    pool: DbPool,
    conflict_retry: RetryPolicy<DomainError>,
    tx_timeout: Duration,
}

impl DieselOrderRepository {
    /// `max_attempts` bounds how often a placement is re-run after a
    /// serialization conflict. `tx_timeout` caps every lock wait and statement
    /// inside one placement attempt.
    pub fn new(pool: DbPool, max_attempts: u32, tx_timeout: Duration) -> Self {
        Self {
            pool,
            tx_timeout,
            conflict_retry: RetryPolicy::new(max_attempts, CONFLICT_BACKOFF, |e| {
                matches!(e, DomainError::Conflict(_))
            }),
        }
    }

    fn place_once(
        conn: &mut PgConnection,
        order: &NewOrder,
        plan: &StockPlan,
        tx_timeout: Duration,
    ) -> Result<DateTime<Utc>, DomainError> {
        let timeout_ms = tx_timeout.as_millis().max(1);
        conn.build_transaction()
            .serializable()
            .run::<_, DomainError, _>(|conn| {
                diesel::sql_query(format!("SET LOCAL lock_timeout = {timeout_ms}")).execute(conn)?;
                diesel::sql_query(format!("SET LOCAL statement_timeout = {timeout_ms}"))
                    .execute(conn)?;

                // 1. Lock every product the order touches, in id order
                let locked: HashMap<String, Product> = products::table
                    .filter(products::id.eq_any(plan.product_ids()))
                    .select(ProductRow::as_select())
                    .order(products::id.asc())
                    .for_update()
                    .load::<ProductRow>(conn)?
                    .into_iter()
                    .map(|row| (row.id.clone(), Product::from(row)))
                    .collect();

                // 2. Validate all decrements before writing any of them
                let mut updates = Vec::new();
                for (product_id, decrement) in plan.iter() {
                    let colors = decrement.reserve(locked.get(product_id))?;
                    let total = total_stock(&colors)?;
                    updates.push((product_id, colors, total));
                }

                for (product_id, colors, total) in updates {
                    diesel::update(products::table.find(product_id))
                        .set((
                            products::colors.eq(colors_to_json(&colors)),
                            products::total_stock.eq(total),
                            products::updated_at.eq(dsl::now),
                        ))
                        .execute(conn)?;
                }

                // 3. Write the order and its items
                let created_at = diesel::insert_into(orders::table)
                    .values(&NewOrderRow::from(order))
                    .returning(orders::created_at)
                    .get_result::<DateTime<Utc>>(conn)?;

                diesel::insert_into(order_items::table)
                    .values(&NewOrderItemRow::for_order(order))
                    .execute(conn)?;

                Ok(created_at)
            })
    }

    fn attach_items(
        conn: &mut PgConnection,
        rows: Vec<OrderRow>,
    ) -> Result<Vec<OrderView>, DomainError> {
        let items: Vec<OrderItemRow> = OrderItemRow::belonging_to(&rows)
            .select(OrderItemRow::as_select())
            .order(order_items::position.asc())
            .load(conn)?;
        let grouped = items.grouped_by(&rows);
        rows.into_iter()
            .zip(grouped)
            .map(|(order, items)| order.into_view(items))
            .collect()
    }
}

impl OrderRepository for DieselOrderRepository {
    fn place(&self, order: &NewOrder, plan: &StockPlan) -> Result<DateTime<Utc>, DomainError> {
        self.conflict_retry
            .run_blocking("place order", |attempt| {
                if attempt > 1 {
                    debug!("Re-running placement of {} (attempt {attempt})", order.order_number);
                }
                let mut conn = self.pool.get()?;
                Self::place_once(&mut conn, order, plan, self.tx_timeout)
            })
            .map_err(|e| match e {
                DomainError::Conflict(detail) => {
                    warn!(
                        "Giving up on {} after {} conflicting attempts",
                        order.order_number, self.conflict_retry.max_attempts
                    );
                    DomainError::Unavailable(format!("order transaction kept conflicting: {detail}"))
                }
                other => other,
            })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let order = orders::table
            .find(id)
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()?;

        let Some(order) = order else {
            return Ok(None);
        };

        let items = OrderItemRow::belonging_to(&order)
            .select(OrderItemRow::as_select())
            .order(order_items::position.asc())
            .load(&mut conn)?;

        order.into_view(items).map(Some)
    }

    fn list_for_user(&self, uid: &str, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        let mut conn = self.pool.get()?;

        let offset = page.saturating_sub(1).max(0).saturating_mul(limit);
        conn.transaction::<_, DomainError, _>(|conn| {
            let total: i64 = orders::table
                .filter(orders::uid.eq(uid))
                .count()
                .get_result(conn)?;

            let rows = orders::table
                .filter(orders::uid.eq(uid))
                .select(OrderRow::as_select())
                .order((orders::created_at.desc(), orders::id.asc()))
                .limit(limit)
                .offset(offset)
                .load(conn)?;

            Ok(ListResult {
                items: Self::attach_items(conn, rows)?,
                total,
            })
        })
    }

    fn record_archive_outcome(&self, id: Uuid, outcome: &ArchiveOutcome) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        match outcome {
            ArchiveOutcome::Archived { sheet_id, sheet_url } => {
                diesel::update(orders::table.find(id))
                    .set((
                        orders::archive_status.eq(outcome.status().as_str()),
                        orders::order_sheet_id.eq(sheet_id),
                        orders::order_sheet_url.eq(sheet_url),
                        orders::updated_at.eq(dsl::now),
                    ))
                    .execute(&mut conn)?;
            }
            ArchiveOutcome::Delayed => {
                diesel::update(
                    orders::table.find(id).filter(
                        orders::archive_status
                            .is_null()
                            .or(orders::archive_status.ne(ArchiveStatus::Archived.as_str())),
                    ),
                )
                .set((
                    orders::archive_status.eq(outcome.status().as_str()),
                    orders::updated_at.eq(dsl::now),
                ))
                .execute(&mut conn)?;
            }
        }
        Ok(())
    }

    fn find_unarchived(
        &self,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OrderView>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = orders::table
            .filter(orders::archive_status.is_null())
            .filter(orders::created_at.lt(created_before))
            .select(OrderRow::as_select())
            .order(orders::created_at.asc())
            .limit(limit)
            .load(&mut conn)?;

        Self::attach_items(&mut conn, rows)
    }
}
