//! Reconciliation against the authoritative backend ledger
//!
//! Pulls the station summary and full queue listing and replaces the local
//! projections wholesale. This is a full-replace, not a merge: optimistic
//! local entries the backend never acknowledged do not survive a
//! successful sync. The panel serializes this behind in-flight admissions
//! so an entry cannot be lost to a stale read.
//!
//! An unprovisioned station (`NotFound`) clears the queue and surfaces a
//! distinguishable warning; any other failure leaves local state untouched
//! and surfaces a retryable-error notification.

use crate::backend::{StationBackend, StatusFilter};
use crate::errors::{BackendError, Error, Result};
use crate::station::activity::{ActivityFeed, HistoryKind, NotificationKind};
use crate::station::queue::CheckinQueue;
use crate::types::{QueueEntry, StationInfo, StationStats, StationStatus, VotingMode};
use std::sync::{Arc, RwLock};

/// Result of one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Local state was replaced with the backend snapshot
    Replaced { entries: usize },
    /// Backend does not know this station; local queue cleared
    NotProvisioned,
}

/// Periodic / on-demand reconciliation client for one station
pub struct ReconciliationClient {
    station_id: String,
    backend: Arc<dyn StationBackend>,
    queue: Arc<CheckinQueue>,
    feed: Arc<ActivityFeed>,
    info: Arc<RwLock<StationInfo>>,
    stats: Arc<RwLock<StationStats>>,
}

impl ReconciliationClient {
    pub fn new(
        station_id: impl Into<String>,
        backend: Arc<dyn StationBackend>,
        queue: Arc<CheckinQueue>,
        feed: Arc<ActivityFeed>,
        info: Arc<RwLock<StationInfo>>,
        stats: Arc<RwLock<StationStats>>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            backend,
            queue,
            feed,
            info,
            stats,
        }
    }

    /// Reconcile local state with the backend's authoritative snapshot
    ///
    /// Idempotent; may be invoked repeatedly with no side effects beyond
    /// replacing the snapshot.
    pub async fn sync(&self) -> Result<SyncOutcome> {
        match self.fetch_and_replace().await {
            Ok(entries) => {
                self.feed.log("Queue reconciled from backend");
                self.feed.history(
                    HistoryKind::Sync,
                    None,
                    None,
                    format!("Reconciled {entries} entries from backend"),
                );
                tracing::info!(
                    "🔁 Reconciliation complete: station={}, entries={}",
                    self.station_id,
                    entries
                );
                Ok(SyncOutcome::Replaced { entries })
            }
            Err(Error::Backend(BackendError::NotFound)) => {
                self.queue.clear()?;
                tracing::warn!(
                    "⚠️  Station not provisioned on backend: station={}",
                    self.station_id
                );
                self.feed.notify(
                    NotificationKind::Warning,
                    "Station not provisioned",
                    "The backend does not know this station yet. Local queue cleared.",
                );
                Ok(SyncOutcome::NotProvisioned)
            }
            Err(err) => {
                tracing::warn!(
                    "📡 Reconciliation failed, local state kept: station={}, error={}",
                    self.station_id,
                    err
                );
                self.feed.notify(
                    NotificationKind::Warning,
                    "Sync failed",
                    "Could not reach the election backend. Local state kept; will retry.",
                );
                Err(err)
            }
        }
    }

    async fn fetch_and_replace(&self) -> Result<usize> {
        let summary = self.backend.summary(&self.station_id).await?;
        let rows = self
            .backend
            .checkins(&self.station_id, StatusFilter::All)
            .await?;

        // Both fetches succeeded; only now touch local state.
        {
            let mut info = self
                .info
                .write()
                .map_err(|_| Error::internal("Station info lock poisoned"))?;
            info.code = summary.code.clone();
            info.name = summary.name.clone();
            if !summary.location.is_empty() {
                info.location = summary.location.clone();
            }
            info.opens_at = summary.opens_at.clone();
            info.closes_at = summary.closes_at.clone();
            info.status = StationStatus::from_wire(&summary.status);
            info.capacity = summary.capacity;
            info.registered_voters = summary.stats.registered;
        }
        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| Error::internal("Station stats lock poisoned"))?;
            *stats = summary.stats;
        }

        // Preserve locally known mode/token for rows we already track;
        // the backend does not echo them.
        let previous = self.queue.snapshot();
        let entries: Vec<QueueEntry> = rows
            .into_iter()
            .map(|row| {
                let known = previous.iter().find(|entry| entry.id == row.checkin_id);
                let mode = known.map(|entry| entry.mode).unwrap_or(VotingMode::Station);
                let token = known
                    .map(|entry| entry.token_used.clone())
                    .unwrap_or_default();
                let mut entry = row.into_entry(mode, &token);
                if let Some(known) = known {
                    entry.note = known.note.clone();
                }
                entry
            })
            .collect();

        let count = entries.len();
        self.queue.replace_all(entries)?;
        Ok(count)
    }
}
