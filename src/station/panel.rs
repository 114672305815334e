//! Station panel actor
//!
//! One `StationPanel` instance owns all mutable state for one polling
//! station: the queue, the rotating admission token, the event channels
//! and the backend projections. Nothing here is a global; every
//! collaborator is constructor-injected and the panel is the only writer.
//!
//! Concurrency discipline:
//! - A single-writer gate serializes `admit`, `approve`/`reject`,
//!   `transition`, `remove` and `sync`, so a reconciliation can never
//!   replace the queue while an admission is still in flight
//! - Token rotation never takes the gate; a slow backend cannot stall
//!   the countdown

use crate::backend::StationBackend;
use crate::config::PanelConfig;
use crate::errors::Result;
use crate::station::activity::{
    ActivityFeed, ActivityLogEntry, HistoryKind, HistoryRecord, Notification,
};
use crate::station::admission::AdmissionHandler;
use crate::station::queue::{CheckinQueue, QueueStats, TransitionOptions};
use crate::station::sync::{ReconciliationClient, SyncOutcome};
use crate::station::token::{AdmissionToken, RotationTrigger, TokenRotator};
use crate::types::{
    AdmissionRequest, QueueEntry, QueueStatus, StationInfo, StationStats, StationStatus,
    VotingMode,
};
use std::sync::{Arc, RwLock};

/// Single-station panel owning the check-in subsystem state
pub struct StationPanel {
    station_id: String,
    config: PanelConfig,
    backend: Arc<dyn StationBackend>,
    feed: Arc<ActivityFeed>,
    rotator: Arc<TokenRotator>,
    queue: Arc<CheckinQueue>,
    admission: AdmissionHandler,
    reconciliation: ReconciliationClient,
    info: Arc<RwLock<StationInfo>>,
    stats: Arc<RwLock<StationStats>>,
    mode: RwLock<VotingMode>,
    /// Single-writer gate ordering queue mutations and reconciliation
    writer: tokio::sync::Mutex<()>,
}

impl StationPanel {
    /// Create a panel for one provisioned station
    pub fn new(
        seed: StationInfo,
        config: PanelConfig,
        backend: Arc<dyn StationBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let station_id = seed.code.clone();
        let feed = Arc::new(ActivityFeed::new(
            config.log_retention,
            config.history_retention,
            config.notification_ttl_secs,
        ));
        let rotator = Arc::new(TokenRotator::new(
            &station_id,
            config.rotation_interval_secs,
            feed.clone(),
        )?);
        let queue = Arc::new(CheckinQueue::new(config.queue_capacity, feed.clone()));
        let info = Arc::new(RwLock::new(seed));
        let stats = Arc::new(RwLock::new(StationStats::default()));

        let admission = AdmissionHandler::new(
            station_id.clone(),
            backend.clone(),
            rotator.clone(),
            queue.clone(),
            feed.clone(),
        );
        let reconciliation = ReconciliationClient::new(
            station_id.clone(),
            backend.clone(),
            queue.clone(),
            feed.clone(),
            info.clone(),
            stats.clone(),
        );

        tracing::info!("🏫 Station panel ready: station={}", station_id);

        Ok(Self {
            station_id,
            config,
            backend,
            feed,
            rotator,
            queue,
            admission,
            reconciliation,
            info,
            stats,
            mode: RwLock::new(VotingMode::Station),
            writer: tokio::sync::Mutex::new(()),
        })
    }

    /// Create a panel for testing against the given backend
    pub fn for_testing(station_id: &str, backend: Arc<dyn StationBackend>) -> Result<Self> {
        let seed = StationInfo {
            code: station_id.to_string(),
            name: format!("{station_id} Test Station"),
            location: "Test Hall".to_string(),
            opens_at: Some("08:00".to_string()),
            closes_at: Some("16:00".to_string()),
            status: StationStatus::Active,
            capacity: 500,
            registered_voters: 0,
        };
        Self::new(seed, PanelConfig::for_testing(), backend)
    }

    // --- Read surface exposed to the surrounding UI ---

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    /// Current station identity and operating state
    pub fn station_info(&self) -> StationInfo {
        self.info
            .read()
            .map(|info| info.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Aggregate counters from the last reconciled summary
    pub fn station_stats(&self) -> StationStats {
        self.stats
            .read()
            .map(|stats| *stats)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    /// Live queue snapshot, newest first
    pub fn queue(&self) -> Vec<QueueEntry> {
        self.queue.snapshot()
    }

    /// Queue occupancy counters
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// The station's current admission token
    pub fn current_token(&self) -> Result<AdmissionToken> {
        self.rotator.current()
    }

    /// Seconds until the current token rotates
    pub fn token_remaining_secs(&self) -> u64 {
        self.rotator.remaining_secs()
    }

    /// Latest non-expired notification, if any
    pub fn notification(&self) -> Option<Notification> {
        self.feed.latest_notification()
    }

    /// Dismiss the current notification early
    pub fn dismiss_notification(&self) {
        self.feed.dismiss_notification();
    }

    /// Activity log lines, newest first
    pub fn logs(&self) -> Vec<ActivityLogEntry> {
        self.feed.logs()
    }

    /// History records, newest first
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.feed.history_records()
    }

    /// Current panel voting mode
    pub fn mode(&self) -> VotingMode {
        self.mode
            .read()
            .map(|mode| *mode)
            .unwrap_or(VotingMode::Station)
    }

    // --- Imperative operations ---

    /// Admit a voter via scanned token or manual code
    pub async fn admit(&self, request: AdmissionRequest) -> Result<QueueEntry> {
        let _gate = self.writer.lock().await;
        self.admission.admit(&request, self.mode()).await
    }

    /// Advance a queue entry through its lifecycle
    pub async fn transition(
        &self,
        entry_id: &str,
        new_status: QueueStatus,
        options: TransitionOptions,
    ) -> Result<QueueEntry> {
        let _gate = self.writer.lock().await;
        self.queue.transition(entry_id, new_status, options)
    }

    /// Operator removal of a queue entry (unrecoverable)
    pub async fn remove(&self, entry_id: &str) -> Result<QueueEntry> {
        let _gate = self.writer.lock().await;
        self.queue.remove(entry_id)
    }

    /// Approve a check-in on the backend, then verify it locally
    pub async fn approve(&self, entry_id: &str) -> Result<QueueEntry> {
        let _gate = self.writer.lock().await;
        self.backend.approve(&self.station_id, entry_id).await?;
        self.queue
            .transition(entry_id, QueueStatus::Verified, TransitionOptions::notified())
    }

    /// Reject a check-in on the backend, then mark it locally
    pub async fn reject(&self, entry_id: &str, reason: Option<&str>) -> Result<QueueEntry> {
        let _gate = self.writer.lock().await;
        self.backend
            .reject(&self.station_id, entry_id, reason)
            .await?;
        let options = match reason {
            Some(reason) => TransitionOptions::with_reason(reason),
            None => TransitionOptions::notified(),
        };
        self.queue
            .transition(entry_id, QueueStatus::Rejected, options)
    }

    /// Rotate the admission token; never blocked by queue mutations
    pub fn rotate(&self, trigger: RotationTrigger) -> Result<AdmissionToken> {
        self.rotator.rotate(trigger)
    }

    /// Reconcile local state against the backend ledger
    pub async fn sync(&self) -> Result<SyncOutcome> {
        let _gate = self.writer.lock().await;
        self.reconciliation.sync().await
    }

    /// Open or close the station administratively
    pub fn set_station_status(&self, status: StationStatus, operator: &str) {
        let name = {
            let Ok(mut info) = self.info.write() else {
                return;
            };
            info.status = status;
            info.name.clone()
        };

        let (kind, label) = match status {
            StationStatus::Active => (HistoryKind::StationOpened, "Station opened"),
            StationStatus::Inactive => (HistoryKind::StationClosed, "Station closed"),
        };
        self.feed.log(format!("{label} by {operator}"));
        self.feed
            .history(kind, None, None, format!("{label} ({name})"));
    }

    /// Switch the panel voting mode
    pub fn set_mode(&self, mode: VotingMode) {
        if let Ok(mut current) = self.mode.write() {
            *current = mode;
        }
        self.feed.log(format!("Panel mode switched to {mode:?}"));
    }

    /// Pause the token countdown (panel hidden / backgrounded)
    pub fn pause_rotation(&self) -> Result<()> {
        self.rotator.pause()
    }

    /// Resume the countdown from its captured remaining time
    pub fn resume_rotation(&self) -> Result<()> {
        self.rotator.resume()
    }

    /// Drive the countdown: rotate automatically once the interval elapses
    pub fn tick(&self) -> Result<bool> {
        if self.rotator.is_due()? {
            self.rotate(RotationTrigger::Auto)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Rotator statistics snapshot
    pub fn rotator_stats(&self) -> Result<crate::station::token::RotatorStats> {
        self.rotator.stats()
    }

    /// Configured reconciliation interval, used by the sync service
    pub fn sync_interval_secs(&self) -> u64 {
        self.config.sync_interval_secs
    }
}

/// Background service driving the token countdown
pub struct RotationTicker {
    panel: Arc<StationPanel>,
    stop_signal: tokio::sync::mpsc::Receiver<()>,
}

impl RotationTicker {
    pub fn new(panel: Arc<StationPanel>, stop_signal: tokio::sync::mpsc::Receiver<()>) -> Self {
        Self { panel, stop_signal }
    }

    /// Tick once per second until stopped
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(1));

        tracing::info!(
            "⏱️  Rotation ticker started: station={}",
            self.panel.station_id()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.panel.tick() {
                        tracing::error!("❌ Rotation tick failed: {}", e);
                    }
                }
                _ = self.stop_signal.recv() => {
                    tracing::info!("🛑 Rotation ticker stopping");
                    break;
                }
            }
        }

        tracing::info!("✅ Rotation ticker stopped");
    }
}

/// Background service for periodic reconciliation
pub struct SyncService {
    panel: Arc<StationPanel>,
    stop_signal: tokio::sync::mpsc::Receiver<()>,
}

impl SyncService {
    pub fn new(panel: Arc<StationPanel>, stop_signal: tokio::sync::mpsc::Receiver<()>) -> Self {
        Self { panel, stop_signal }
    }

    /// Reconcile on the configured interval until stopped
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(
            self.panel.sync_interval_secs(),
        ));

        tracing::info!(
            "🔁 Sync service started: station={}, interval={}s",
            self.panel.station_id(),
            self.panel.sync_interval_secs()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.panel.sync().await {
                        tracing::warn!("📡 Periodic sync failed: {}", e);
                    }
                }
                _ = self.stop_signal.recv() => {
                    tracing::info!("🛑 Sync service stopping");
                    break;
                }
            }
        }

        tracing::info!("✅ Sync service stopped");
    }
}
