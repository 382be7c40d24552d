//! Copies committed orders to the external archive. Nothing here can fail an
//! order: every error ends as a `delayed` mark on the stored order.

use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use chrono::Utc;
use log::{error, info, warn};
use uuid::Uuid;

use crate::config::SweepConfig;
use crate::domain::errors::DomainError;
use crate::domain::order::ArchiveOutcome;
use crate::domain::ports::{ArchivePayload, OrderArchiver, OrderRepository};

pub struct ArchivalSideChannel {
    archiver: Arc<dyn OrderArchiver>,
    repo: Arc<dyn OrderRepository>,
}

impl ArchivalSideChannel {
    pub fn new(archiver: Arc<dyn OrderArchiver>, repo: Arc<dyn OrderRepository>) -> Self {
        Self { archiver, repo }
    }

    /// Archives in a detached task; the caller does not wait for the outcome.
    pub fn dispatch(self: &Arc<Self>, payload: ArchivePayload) {
        let channel = Arc::clone(self);
        actix_web::rt::spawn(async move {
            channel.archive(payload).await;
        });
    }

    /// Sends one order to the archive and records the result on the order.
    pub async fn archive(&self, payload: ArchivePayload) -> ArchiveOutcome {
        let outcome = match self.archiver.archive(&payload).await {
            Ok(receipt) => {
                if !receipt.master_logged {
                    warn!(
                        "Order {} archived to {} but the master ledger row is missing",
                        payload.order_number, receipt.sheet_id
                    );
                } else {
                    info!("Order {} archived to {}", payload.order_number, receipt.sheet_id);
                }
                ArchiveOutcome::Archived {
                    sheet_id: receipt.sheet_id,
                    sheet_url: receipt.sheet_url,
                }
            }
            Err(e) => {
                warn!("Archival of order {} delayed: {e}", payload.order_number);
                ArchiveOutcome::Delayed
            }
        };

        self.record(payload.order_id, outcome.clone()).await;
        outcome
    }

    async fn record(&self, order_id: Uuid, outcome: ArchiveOutcome) {
        let repo = Arc::clone(&self.repo);
        let status = outcome.status();
        match web::block(move || repo.record_archive_outcome(order_id, &outcome)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Could not mark order {order_id} as {}: {e}", status.as_str()),
            Err(e) => error!("Could not mark order {order_id} as {}: {e}", status.as_str()),
        }
    }

    /// Archives up to `batch` orders older than `min_age` that were never
    /// archived. Returns how many of them reached the archive.
    pub async fn sweep_once(&self, min_age: Duration, batch: i64) -> Result<usize, DomainError> {
        let age = chrono::Duration::from_std(min_age)
            .map_err(|e| DomainError::Internal(format!("sweep age out of range: {e}")))?;
        let cutoff = Utc::now()
            .checked_sub_signed(age)
            .ok_or_else(|| DomainError::Internal("sweep cutoff out of range".to_string()))?;

        let repo = Arc::clone(&self.repo);
        let pending = web::block(move || repo.find_unarchived(cutoff, batch))
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))??;

        let mut archived = 0;
        for order in &pending {
            let outcome = self.archive(ArchivePayload::from_view(order)).await;
            if matches!(outcome, ArchiveOutcome::Archived { .. }) {
                archived += 1;
            }
        }
        if !pending.is_empty() {
            info!("Archive sweep: {archived}/{} order(s) archived", pending.len());
        }
        Ok(archived)
    }
}

/// Periodically re-runs archival for orders whose deferred task never reported back.
pub fn spawn_sweeper(channel: Arc<ArchivalSideChannel>, config: SweepConfig) {
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = channel.sweep_once(config.min_age, config.batch).await {
                error!("Archive sweep failed: {e}");
            }
        }
    });
}
