//! Check-in queue store and status transition engine
//!
//! Orders admitted-voter entries newest-first and advances them through the
//! closed lifecycle in [`QueueStatus`](crate::types::QueueStatus):
//! 1. Every mutation is an atomic read-modify-write under one lock
//! 2. Non-terminal entries are never evicted; the capacity bound trims
//!    terminal entries only, oldest first
//! 3. Terminal entries are immutable except for audit annotation
//! 4. Removal is operator-only, audited, and unrecoverable

use crate::station::activity::{ActivityFeed, HistoryKind, NotificationKind};
use crate::types::{QueueEntry, QueueStatus};
use crate::{Result, queue_error};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Options for a status transition
#[derive(Debug, Clone, Default)]
pub struct TransitionOptions {
    /// Reason recorded in the audit trail (rejections, cancellations)
    pub reason: Option<String>,
    /// Whether to surface an operator notification for this transition
    pub notify: bool,
}

impl TransitionOptions {
    /// Transition with a notification and no reason
    pub fn notified() -> Self {
        Self {
            reason: None,
            notify: true,
        }
    }

    /// Transition with a notification and a recorded reason
    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            notify: true,
        }
    }
}

/// Queue occupancy counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub total: usize,
    pub active: usize,
    pub terminal: usize,
    pub voted: usize,
}

/// In-memory ordered queue for one station, newest entries first
pub struct CheckinQueue {
    capacity: usize,
    feed: Arc<ActivityFeed>,
    entries: RwLock<Vec<QueueEntry>>,
}

impl CheckinQueue {
    /// Create a queue with the given hard capacity bound
    pub fn new(capacity: usize, feed: Arc<ActivityFeed>) -> Self {
        Self {
            capacity,
            feed,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Create a small queue for testing
    pub fn for_testing() -> Self {
        Self::new(5, Arc::new(ActivityFeed::for_testing()))
    }

    /// Insert a freshly admitted entry, enforcing the capacity policy
    ///
    /// Active voters must never be dropped to make room: an insert that
    /// would push the *active* count past capacity is an integration error
    /// and is refused loudly. Terminal history is trimmed oldest-first
    /// instead.
    pub fn insert(&self, entry: QueueEntry) -> Result<QueueEntry> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| queue_error!("Queue lock poisoned"))?;

        if entry.is_active() {
            let duplicate = entries
                .iter()
                .any(|existing| existing.voter_id == entry.voter_id && existing.is_active());
            if duplicate {
                tracing::error!(
                    "❌ Queue invariant violated: active entry already exists for voter {}",
                    entry.voter_id
                );
                return Err(queue_error!(
                    "Active entry already exists for voter {}",
                    entry.voter_id
                ));
            }

            let active = entries.iter().filter(|e| e.is_active()).count();
            if active >= self.capacity {
                tracing::error!(
                    "❌ Queue capacity {} exhausted by active entries; admission must stop",
                    self.capacity
                );
                return Err(queue_error!(
                    "Queue capacity {} exhausted by active entries",
                    self.capacity
                ));
            }
        }

        entries.insert(0, entry.clone());
        Self::trim_terminal(&mut entries, self.capacity);

        self.feed.log(format!("{} checked in", entry.name));
        self.feed.history(
            HistoryKind::CheckIn,
            Some(&entry.voter_id),
            Some(&entry.name),
            "Admitted into the check-in queue",
        );

        Ok(entry)
    }

    /// Advance an entry through the lifecycle state machine
    ///
    /// Fails when the entry does not exist or the transition table denies
    /// the move. Requesting the terminal state an entry is already in is a
    /// warning-logged no-op returning the unchanged entry.
    pub fn transition(
        &self,
        entry_id: &str,
        new_status: QueueStatus,
        options: TransitionOptions,
    ) -> Result<QueueEntry> {
        let updated = {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| queue_error!("Queue lock poisoned"))?;

            let entry = entries
                .iter_mut()
                .find(|entry| entry.id == entry_id)
                .ok_or_else(|| queue_error!("Queue entry {} not found", entry_id))?;

            if entry.status.is_terminal() {
                if entry.status == new_status {
                    tracing::warn!(
                        "⚠️  Transition no-op: entry {} already {}",
                        entry_id,
                        new_status
                    );
                    return Ok(entry.clone());
                }
                return Err(queue_error!(
                    "Entry {entry_id} is terminal ({}) and cannot become {}",
                    entry.status,
                    new_status
                ));
            }

            if !entry.status.can_transition_to(new_status) {
                return Err(queue_error!(
                    "Transition {} -> {} is not permitted for entry {entry_id}",
                    entry.status,
                    new_status
                ));
            }

            entry.status = new_status;
            if new_status == QueueStatus::Voted {
                entry.voted_at = Some(Utc::now());
            }
            if let Some(reason) = &options.reason {
                entry.note = Some(reason.clone());
            }

            entry.clone()
        };

        self.emit_transition(&updated, options);
        Ok(updated)
    }

    /// Operator-only removal; the entry is not recoverable
    pub fn remove(&self, entry_id: &str) -> Result<QueueEntry> {
        let removed = {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| queue_error!("Queue lock poisoned"))?;

            let position = entries
                .iter()
                .position(|entry| entry.id == entry_id)
                .ok_or_else(|| queue_error!("Queue entry {} not found", entry_id))?;

            entries.remove(position)
        };

        tracing::info!(
            "🗑️  Entry removed by operator: voter={}, entry={}",
            removed.voter_id,
            removed.id
        );
        self.feed
            .log(format!("{} removed from the queue", removed.name));
        self.feed.history(
            HistoryKind::Removal,
            Some(&removed.voter_id),
            Some(&removed.name),
            "Removed from the queue by operator",
        );
        self.feed.notify_for_entry(
            NotificationKind::Warning,
            "Queue entry removed",
            format!("{} was removed from the queue by the operator.", removed.name),
            Some(&removed.id),
        );

        Ok(removed)
    }

    /// Replace the entire collection with an authoritative snapshot
    ///
    /// Used solely by reconciliation. The snapshot is kept verbatim even
    /// above the capacity bound (the backend is truth); the bound is
    /// re-enforced by the next local insert.
    pub fn replace_all(&self, mut snapshot: Vec<QueueEntry>) -> Result<()> {
        snapshot.sort_by(|a, b| b.checked_in_at.cmp(&a.checked_in_at));

        let mut entries = self
            .entries
            .write()
            .map_err(|_| queue_error!("Queue lock poisoned"))?;

        *entries = snapshot;
        if entries.len() > self.capacity {
            tracing::warn!(
                "⚠️  Backend snapshot holds {} entries, above local capacity {}",
                entries.len(),
                self.capacity
            );
        }

        Ok(())
    }

    /// Drop every entry (unprovisioned-station reconciliation)
    pub fn clear(&self) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| queue_error!("Queue lock poisoned"))?;
        entries.clear();
        Ok(())
    }

    /// Entry by id
    pub fn get(&self, entry_id: &str) -> Option<QueueEntry> {
        let entries = self.entries.read().ok()?;
        entries.iter().find(|entry| entry.id == entry_id).cloned()
    }

    /// Active (non-terminal) entry for a voter, if one exists
    pub fn find_active_by_voter(&self, voter_id: &str) -> Option<QueueEntry> {
        let entries = self.entries.read().ok()?;
        entries
            .iter()
            .find(|entry| entry.voter_id == voter_id && entry.is_active())
            .cloned()
    }

    /// Full ordered snapshot, newest first
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Total entry count
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether the queue holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupancy counters
    pub fn stats(&self) -> QueueStats {
        let Ok(entries) = self.entries.read() else {
            return QueueStats::default();
        };

        let total = entries.len();
        let active = entries.iter().filter(|e| e.is_active()).count();
        let voted = entries
            .iter()
            .filter(|e| e.status == QueueStatus::Voted)
            .count();

        QueueStats {
            total,
            active,
            terminal: total - active,
            voted,
        }
    }

    /// Evict oldest terminal entries until the total fits the capacity
    fn trim_terminal(entries: &mut Vec<QueueEntry>, capacity: usize) {
        while entries.len() > capacity {
            let oldest_terminal = entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.status.is_terminal())
                .min_by_key(|(_, entry)| entry.checked_in_at)
                .map(|(index, _)| index);

            match oldest_terminal {
                Some(index) => {
                    let evicted = entries.remove(index);
                    tracing::debug!(
                        "🧹 Evicted terminal entry to respect capacity: voter={}, status={}",
                        evicted.voter_id,
                        evicted.status
                    );
                }
                // Only active entries remain; they are never dropped.
                None => break,
            }
        }
    }

    fn emit_transition(&self, entry: &QueueEntry, options: TransitionOptions) {
        let (kind, log_line, title) = match entry.status {
            QueueStatus::Voted => (
                HistoryKind::Vote,
                format!("{} completed voting", entry.name),
                "Voting completed",
            ),
            QueueStatus::Verified => (
                HistoryKind::Verification,
                format!("{} verified by operator", entry.name),
                "Voter verified",
            ),
            QueueStatus::Rejected => (
                HistoryKind::Rejection,
                format!("{} rejected by operator", entry.name),
                "Check-in rejected",
            ),
            QueueStatus::Cancelled => (
                HistoryKind::Removal,
                format!("{} cancelled", entry.name),
                "Check-in cancelled",
            ),
            _ => (
                HistoryKind::Verification,
                format!("{} status updated", entry.name),
                "Status updated",
            ),
        };

        self.feed.log(log_line.clone());
        self.feed.history(
            kind,
            Some(&entry.voter_id),
            Some(&entry.name),
            options.reason.as_deref().unwrap_or(&log_line),
        );

        if options.notify {
            let notification_kind = if entry.status == QueueStatus::Voted {
                NotificationKind::Success
            } else {
                NotificationKind::Info
            };
            self.feed
                .notify_for_entry(notification_kind, title, log_line, Some(&entry.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VotingMode;

    fn entry(id: &str, voter_id: &str, status: QueueStatus) -> QueueEntry {
        QueueEntry {
            id: id.to_string(),
            voter_id: voter_id.to_string(),
            name: format!("Voter {voter_id}"),
            faculty: "Engineering".to_string(),
            program: "Informatics".to_string(),
            cohort: "2021".to_string(),
            voter_standing: "Active".to_string(),
            mode: VotingMode::Station,
            status,
            token_used: "tps_01_test".to_string(),
            checked_in_at: Utc::now(),
            voted_at: None,
            note: None,
        }
    }

    #[test]
    fn test_insert_and_snapshot_order() {
        let queue = CheckinQueue::for_testing();

        queue.insert(entry("a", "111", QueueStatus::CheckedIn)).unwrap();
        queue.insert(entry("b", "222", QueueStatus::CheckedIn)).unwrap();

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].id, "b"); // newest first
    }

    #[test]
    fn test_duplicate_active_voter_refused() {
        let queue = CheckinQueue::for_testing();

        queue.insert(entry("a", "111", QueueStatus::CheckedIn)).unwrap();
        let err = queue
            .insert(entry("b", "111", QueueStatus::CheckedIn))
            .unwrap_err();
        assert!(matches!(err, crate::Error::Queue { .. }));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_transition_stamps_vote_time() {
        let queue = CheckinQueue::for_testing();
        queue.insert(entry("a", "111", QueueStatus::CheckedIn)).unwrap();

        let updated = queue
            .transition("a", QueueStatus::Voted, TransitionOptions::default())
            .unwrap();

        assert_eq!(updated.status, QueueStatus::Voted);
        assert!(updated.voted_at.is_some());
    }

    #[test]
    fn test_transition_not_found() {
        let queue = CheckinQueue::for_testing();
        let err = queue
            .transition("missing", QueueStatus::Voted, TransitionOptions::default())
            .unwrap_err();
        assert!(matches!(err, crate::Error::Queue { .. }));
    }

    #[test]
    fn test_terminal_matching_is_noop_and_differing_is_error() {
        let queue = CheckinQueue::for_testing();
        queue.insert(entry("a", "111", QueueStatus::CheckedIn)).unwrap();
        queue
            .transition("a", QueueStatus::Voted, TransitionOptions::default())
            .unwrap();

        // Same terminal state: warn-level no-op
        let unchanged = queue
            .transition("a", QueueStatus::Voted, TransitionOptions::default())
            .unwrap();
        assert_eq!(unchanged.status, QueueStatus::Voted);

        // Different state: refused, entry untouched
        let err = queue
            .transition("a", QueueStatus::Rejected, TransitionOptions::default())
            .unwrap_err();
        assert!(matches!(err, crate::Error::Queue { .. }));
        assert_eq!(queue.get("a").unwrap().status, QueueStatus::Voted);
    }

    #[test]
    fn test_capacity_evicts_oldest_terminal_only() {
        let feed = Arc::new(ActivityFeed::for_testing());
        let queue = CheckinQueue::new(3, feed);

        let mut old_voted = entry("t1", "901", QueueStatus::Voted);
        old_voted.checked_in_at = Utc::now() - chrono::Duration::minutes(30);
        let mut newer_voted = entry("t2", "902", QueueStatus::Rejected);
        newer_voted.checked_in_at = Utc::now() - chrono::Duration::minutes(10);

        queue.insert(old_voted).unwrap();
        queue.insert(newer_voted).unwrap();
        queue.insert(entry("a1", "111", QueueStatus::CheckedIn)).unwrap();
        queue.insert(entry("a2", "222", QueueStatus::CheckedIn)).unwrap();

        // Capacity 3: the oldest terminal entry was evicted
        assert_eq!(queue.len(), 3);
        assert!(queue.get("t1").is_none());
        assert!(queue.get("t2").is_some());
        assert!(queue.get("a1").is_some());
        assert!(queue.get("a2").is_some());
    }

    #[test]
    fn test_active_entries_never_evicted() {
        let feed = Arc::new(ActivityFeed::for_testing());
        let queue = CheckinQueue::new(2, feed);

        queue.insert(entry("a1", "111", QueueStatus::CheckedIn)).unwrap();
        queue.insert(entry("a2", "222", QueueStatus::CheckedIn)).unwrap();

        // Active set is at capacity; a further active insert is refused
        let err = queue
            .insert(entry("a3", "333", QueueStatus::CheckedIn))
            .unwrap_err();
        assert!(matches!(err, crate::Error::Queue { .. }));
        assert_eq!(queue.stats().active, 2);
    }

    #[test]
    fn test_remove_is_unrecoverable_and_notifies() {
        let feed = Arc::new(ActivityFeed::new(10, 20, 60));
        let queue = CheckinQueue::new(5, feed.clone());
        queue.insert(entry("a", "111", QueueStatus::CheckedIn)).unwrap();

        let removed = queue.remove("a").unwrap();
        assert_eq!(removed.id, "a");
        assert!(queue.is_empty());

        let notification = feed.latest_notification().unwrap();
        assert_eq!(notification.kind, NotificationKind::Warning);
        assert!(queue.remove("a").is_err());
    }

    #[test]
    fn test_replace_all_is_total() {
        let queue = CheckinQueue::for_testing();
        queue.insert(entry("local", "111", QueueStatus::CheckedIn)).unwrap();

        queue
            .replace_all(vec![entry("remote", "999", QueueStatus::Verified)])
            .unwrap();

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "remote");
    }
}
