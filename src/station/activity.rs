//! Notification and audit emitter
//!
//! Pure side-effect channels for operator observability:
//! - Activity log: fire-and-forget, capped retention, ordered newest-first
//! - History records: append-only audit trail, capped retention
//! - Notification: single slot, newest replaces previous, fixed auto-expiry
//!
//! These channels never influence queue correctness and are safe to drop
//! under load; a poisoned channel lock loses the event, not the queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::RwLock;
use uuid::Uuid;

/// One line in the station activity log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Classification of a history record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    StationOpened,
    StationClosed,
    TokenRotated,
    CheckIn,
    Verification,
    Vote,
    Rejection,
    Removal,
    Sync,
}

/// Append-only record of one station or queue event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: HistoryKind,
    pub voter_id: Option<String>,
    pub voter_name: Option<String>,
    pub detail: String,
}

/// Severity class of an operator notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
}

/// Ephemeral, single-consumer operator notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Queue entry this notification refers to, if any
    pub entry_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl Notification {
    /// Whether the display duration has elapsed
    pub fn is_expired(&self) -> bool {
        let age = Utc::now()
            .signed_duration_since(self.created_at)
            .num_seconds();
        age >= self.ttl_secs as i64
    }
}

/// Capped, newest-first event channels for one station panel
pub struct ActivityFeed {
    log_retention: usize,
    history_retention: usize,
    notification_ttl_secs: u64,
    logs: RwLock<VecDeque<ActivityLogEntry>>,
    history: RwLock<VecDeque<HistoryRecord>>,
    notification: RwLock<Option<Notification>>,
}

impl ActivityFeed {
    /// Create a feed with the given retention bounds
    pub fn new(log_retention: usize, history_retention: usize, notification_ttl_secs: u64) -> Self {
        Self {
            log_retention,
            history_retention,
            notification_ttl_secs,
            logs: RwLock::new(VecDeque::new()),
            history: RwLock::new(VecDeque::new()),
            notification: RwLock::new(None),
        }
    }

    /// Create a feed for testing
    pub fn for_testing() -> Self {
        Self::new(10, 20, 2)
    }

    /// Append a log line (fire-and-forget)
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("📋 {}", message);

        if let Ok(mut logs) = self.logs.write() {
            logs.push_front(ActivityLogEntry {
                id: Uuid::new_v4(),
                timestamp: Utc::now(),
                message,
            });
            logs.truncate(self.log_retention);
        }
    }

    /// Append a history record (fire-and-forget)
    pub fn history(
        &self,
        kind: HistoryKind,
        voter_id: Option<&str>,
        voter_name: Option<&str>,
        detail: impl Into<String>,
    ) {
        if let Ok(mut history) = self.history.write() {
            history.push_front(HistoryRecord {
                id: Uuid::new_v4(),
                timestamp: Utc::now(),
                kind,
                voter_id: voter_id.map(str::to_string),
                voter_name: voter_name.map(str::to_string),
                detail: detail.into(),
            });
            history.truncate(self.history_retention);
        }
    }

    /// Publish a notification, replacing any previous one
    pub fn notify(&self, kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) {
        self.notify_for_entry(kind, title, message, None);
    }

    /// Publish a notification tied to a queue entry
    pub fn notify_for_entry(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        entry_id: Option<&str>,
    ) {
        if let Ok(mut slot) = self.notification.write() {
            *slot = Some(Notification {
                id: Uuid::new_v4(),
                kind,
                title: title.into(),
                message: message.into(),
                entry_id: entry_id.map(str::to_string),
                created_at: Utc::now(),
                ttl_secs: self.notification_ttl_secs,
            });
        }
    }

    /// Current notification, if present and not yet expired
    pub fn latest_notification(&self) -> Option<Notification> {
        let slot = self.notification.read().ok()?;
        slot.as_ref().filter(|n| !n.is_expired()).cloned()
    }

    /// Clear the notification slot early
    pub fn dismiss_notification(&self) {
        if let Ok(mut slot) = self.notification.write() {
            *slot = None;
        }
    }

    /// Activity log lines, newest first
    pub fn logs(&self) -> Vec<ActivityLogEntry> {
        self.logs
            .read()
            .map(|logs| logs.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// History records, newest first
    pub fn history_records(&self) -> Vec<HistoryRecord> {
        self.history
            .read()
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }
}
