//! Admission protocol handler
//!
//! Converts a scanned token or manual code into a queue entry. Validation
//! order is fixed:
//! 1. Resolve the payload to a voter record via the backend
//! 2. Reject voters not assigned to this station
//! 3. Reject voters who have already completed voting
//! 4. Reject voters with an active queue entry at this station
//! 5. Reject stale tokens that no longer match the rotator's current one
//!
//! Every failure is non-fatal to the station: it surfaces one mapped
//! operator notification and leaves the queue unchanged. No entry is
//! created on failure.

use crate::backend::{RemoteCheckin, StationBackend};
use crate::errors::{AdmissionError, Error, Result};
use crate::station::activity::{ActivityFeed, NotificationKind};
use crate::station::queue::CheckinQueue;
use crate::station::token::TokenRotator;
use crate::types::{AdmissionRequest, QueueEntry, VotingMode};
use std::sync::Arc;

/// Station-side admission pipeline
pub struct AdmissionHandler {
    station_id: String,
    backend: Arc<dyn StationBackend>,
    rotator: Arc<TokenRotator>,
    queue: Arc<CheckinQueue>,
    feed: Arc<ActivityFeed>,
}

impl AdmissionHandler {
    /// Create a handler wired to one station's collaborators
    pub fn new(
        station_id: impl Into<String>,
        backend: Arc<dyn StationBackend>,
        rotator: Arc<TokenRotator>,
        queue: Arc<CheckinQueue>,
        feed: Arc<ActivityFeed>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            backend,
            rotator,
            queue,
            feed,
        }
    }

    /// Admit a physically present voter into the check-in queue
    pub async fn admit(
        &self,
        request: &AdmissionRequest,
        mode: VotingMode,
    ) -> Result<QueueEntry> {
        match self.admit_inner(request, mode).await {
            Ok(entry) => {
                self.feed.notify_for_entry(
                    NotificationKind::Success,
                    "Check-in successful",
                    format!("{} admitted into the queue.", entry.name),
                    Some(&entry.id),
                );
                tracing::info!(
                    "✅ Voter admitted: voter={}, entry={}, station={}",
                    entry.voter_id,
                    entry.id,
                    self.station_id
                );
                Ok(entry)
            }
            Err(err) => {
                self.notify_failure(&err);
                Err(err)
            }
        }
    }

    async fn admit_inner(
        &self,
        request: &AdmissionRequest,
        mode: VotingMode,
    ) -> Result<QueueEntry> {
        // (1) Resolve the payload to a voter record
        let remote = self.resolve(request).await?;

        // (2) Voter must be assigned to this station
        if remote.assigned_station != self.station_id {
            return Err(AdmissionError::NotStationVoter.into());
        }

        // (3) Voter must not have voted already
        if remote.has_voted {
            return Err(AdmissionError::AlreadyVoted.into());
        }

        // (4) No active entry may exist for this voter
        if self.queue.find_active_by_voter(&remote.voter_id).is_some() {
            return Err(AdmissionError::CheckinExists.into());
        }

        // (5) A scanned token must be the station's current one
        if let AdmissionRequest::Scan { token } = request {
            let current = self.rotator.current()?;
            if *token != current.value {
                return Err(AdmissionError::TokenMismatch.into());
            }
        }

        let entry = remote.into_entry(mode, request.payload());
        self.queue.insert(entry)
    }

    async fn resolve(&self, request: &AdmissionRequest) -> Result<RemoteCheckin> {
        match request {
            AdmissionRequest::Scan { token } => {
                self.backend.checkin_scan(&self.station_id, token).await
            }
            AdmissionRequest::Manual { code } => {
                self.backend.checkin_manual(&self.station_id, code).await
            }
        }
    }

    /// Surface at most one operator notification per failure
    ///
    /// Invariant violations are logged loudly elsewhere and deliberately
    /// not shown as transient operator failures.
    fn notify_failure(&self, err: &Error) {
        match err {
            Error::Admission(admission) => {
                tracing::warn!(
                    "🚫 Admission rejected: station={}, code={}",
                    self.station_id,
                    admission
                );
                self.feed.notify(
                    NotificationKind::Warning,
                    "Check-in rejected",
                    admission.operator_message(),
                );
            }
            Error::Backend(backend) => {
                tracing::warn!(
                    "📡 Admission blocked by backend: station={}, error={}",
                    self.station_id,
                    backend
                );
                self.feed.notify(
                    NotificationKind::Warning,
                    "Backend unavailable",
                    "Could not reach the election backend. Please try again.",
                );
            }
            other => {
                tracing::error!(
                    "❌ Admission failed on invariant: station={}, error={}",
                    self.station_id,
                    other
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, RosterVoter};
    use crate::types::QueueStatus;

    const STATION: &str = "TPS-01";

    struct Fixture {
        backend: Arc<MemoryBackend>,
        rotator: Arc<TokenRotator>,
        queue: Arc<CheckinQueue>,
        feed: Arc<ActivityFeed>,
        handler: AdmissionHandler,
    }

    fn fixture() -> Fixture {
        let feed = Arc::new(ActivityFeed::new(10, 20, 60));
        let backend = Arc::new(MemoryBackend::for_testing(STATION));
        let rotator = Arc::new(TokenRotator::new(STATION, 30, feed.clone()).unwrap());
        let queue = Arc::new(CheckinQueue::new(5, feed.clone()));
        let handler = AdmissionHandler::new(
            STATION,
            backend.clone() as Arc<dyn StationBackend>,
            rotator.clone(),
            queue.clone(),
            feed.clone(),
        );

        Fixture {
            backend,
            rotator,
            queue,
            feed,
            handler,
        }
    }

    /// Stage a voter who scanned the current station token
    fn stage_current_scan(fx: &Fixture, voter_id: &str, name: &str) -> String {
        fx.backend
            .register_voter(RosterVoter::new(voter_id, name, STATION));
        let token = fx.rotator.current().unwrap().value;
        fx.backend.stage_scan(&token, voter_id);
        token
    }

    #[tokio::test]
    async fn test_successful_scan_admission() {
        let fx = fixture();
        let token = stage_current_scan(&fx, "2110510023", "Roni Saputra");

        let entry = fx
            .handler
            .admit(&AdmissionRequest::Scan { token }, VotingMode::Station)
            .await
            .unwrap();

        assert_eq!(entry.status, QueueStatus::CheckedIn);
        assert_eq!(entry.voter_id, "2110510023");
        assert_eq!(fx.queue.len(), 1);

        let notification = fx.feed.latest_notification().unwrap();
        assert_eq!(notification.kind, NotificationKind::Success);
    }

    #[tokio::test]
    async fn test_duplicate_admission_is_checkin_exists() {
        let fx = fixture();
        let token = stage_current_scan(&fx, "2110510023", "Roni Saputra");

        fx.handler
            .admit(&AdmissionRequest::Scan { token: token.clone() }, VotingMode::Station)
            .await
            .unwrap();

        let err = fx
            .handler
            .admit(&AdmissionRequest::Scan { token }, VotingMode::Station)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Admission(AdmissionError::CheckinExists)
        ));
        assert_eq!(fx.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_token_is_mismatch() {
        let fx = fixture();
        let stale = stage_current_scan(&fx, "2110510023", "Roni Saputra");

        // Rotation invalidates the token the voter scanned
        fx.rotator
            .rotate(crate::station::token::RotationTrigger::Manual)
            .unwrap();

        let err = fx
            .handler
            .admit(&AdmissionRequest::Scan { token: stale }, VotingMode::Station)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Admission(AdmissionError::TokenMismatch)
        ));
        assert!(fx.queue.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_station_voter_rejected() {
        let fx = fixture();
        fx.backend
            .register_voter(RosterVoter::new("555", "Elsewhere", "TPS-99"));
        let token = fx.rotator.current().unwrap().value;
        fx.backend.stage_scan(&token, "555");

        let err = fx
            .handler
            .admit(&AdmissionRequest::Scan { token }, VotingMode::Station)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Admission(AdmissionError::NotStationVoter)
        ));
    }

    #[tokio::test]
    async fn test_already_voted_rejected() {
        let fx = fixture();
        let token = stage_current_scan(&fx, "2110510023", "Roni Saputra");
        fx.backend.mark_voted("2110510023");

        let err = fx
            .handler
            .admit(&AdmissionRequest::Scan { token }, VotingMode::Station)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Admission(AdmissionError::AlreadyVoted)));
        assert!(fx.queue.is_empty());
    }

    #[tokio::test]
    async fn test_manual_code_admission() {
        let fx = fixture();
        fx.backend
            .register_voter(RosterVoter::new("2110510023", "Roni Saputra", STATION));

        let entry = fx
            .handler
            .admit(
                &AdmissionRequest::Manual {
                    code: "2110510023".to_string(),
                },
                VotingMode::Device,
            )
            .await
            .unwrap();

        assert_eq!(entry.mode, VotingMode::Device);
        assert_eq!(entry.status, QueueStatus::CheckedIn);
    }

    #[tokio::test]
    async fn test_unknown_manual_code_is_invalid_token() {
        let fx = fixture();

        let err = fx
            .handler
            .admit(
                &AdmissionRequest::Manual {
                    code: "nobody".to_string(),
                },
                VotingMode::Station,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Admission(AdmissionError::InvalidToken)));

        let notification = fx.feed.latest_notification().unwrap();
        assert_eq!(notification.kind, NotificationKind::Warning);
    }

    #[tokio::test]
    async fn test_backend_outage_is_retryable_and_nonfatal() {
        let fx = fixture();
        let token = stage_current_scan(&fx, "2110510023", "Roni Saputra");
        fx.backend.set_offline(true);

        let err = fx
            .handler
            .admit(&AdmissionRequest::Scan { token: token.clone() }, VotingMode::Station)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
        assert!(fx.queue.is_empty());

        // Station stays operable: the same attempt succeeds once back online
        fx.backend.set_offline(false);
        fx.handler
            .admit(&AdmissionRequest::Scan { token }, VotingMode::Station)
            .await
            .unwrap();
        assert_eq!(fx.queue.len(), 1);
    }
}
