//! Backend collaborator interface
//!
//! The election backend owns the authoritative station/queue ledger; this
//! crate only consults it. All access goes through [`StationBackend`]:
//! - `summary` / `checkins`: authoritative snapshots for reconciliation
//! - `checkin_scan` / `checkin_manual`: admission channel
//! - `approve` / `reject`: operator decisions on existing check-ins
//!
//! Implementations classify every failure before it crosses this boundary:
//! admission codes parse into [`AdmissionError`], connectivity failures into
//! [`BackendError`]. Callers never see raw transport errors.

pub mod http;
pub mod memory;

use crate::errors::Result;
use crate::types::{QueueEntry, QueueStatus, StationStats, VotingMode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use http::HttpBackend;
pub use memory::{MemoryBackend, RosterVoter};

/// Queue listing filter for `GET /stations/{id}/checkins?status=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// All entries regardless of status
    All,
    /// Only entries in the given status
    Only(QueueStatus),
}

impl StatusFilter {
    /// Wire value for the `status` query parameter
    pub fn query_value(&self) -> String {
        match self {
            Self::All => "ALL".to_string(),
            Self::Only(status) => status.to_string(),
        }
    }

    /// Whether an entry passes this filter
    pub fn matches(&self, status: QueueStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => status == *wanted,
        }
    }
}

/// Authoritative station summary returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationSummary {
    pub code: String,
    pub name: String,
    pub location: String,
    /// Raw status vocabulary as reported; parsed via `StationStatus::from_wire`
    pub status: String,
    pub opens_at: Option<String>,
    pub closes_at: Option<String>,
    pub capacity: u32,
    pub stats: StationStats,
    pub last_activity_at: Option<DateTime<Utc>>,
}

/// One check-in row as reported by the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCheckin {
    pub checkin_id: String,
    pub voter_id: String,
    pub name: String,
    #[serde(default)]
    pub faculty: String,
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub cohort: String,
    #[serde(default)]
    pub standing: String,
    /// Raw status vocabulary as reported
    pub status: String,
    /// Which station the backend assigned this voter to
    pub assigned_station: String,
    /// Whether the backend already holds a completed ballot for this voter
    #[serde(default)]
    pub has_voted: bool,
    pub checkin_time: Option<DateTime<Utc>>,
    pub voted_time: Option<DateTime<Utc>>,
}

impl RemoteCheckin {
    /// Convert a backend row into a local queue entry
    ///
    /// Unknown status vocabularies land in `PENDING`; rows without a
    /// check-in id get a locally generated one so the entry stays
    /// addressable until the next reconciliation.
    pub fn into_entry(self, mode: VotingMode, token_used: &str) -> QueueEntry {
        let status = QueueStatus::from_wire(&self.status);
        let id = if self.checkin_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            self.checkin_id
        };

        QueueEntry {
            id,
            voter_id: self.voter_id,
            name: self.name,
            faculty: self.faculty,
            program: self.program,
            cohort: self.cohort,
            voter_standing: self.standing,
            mode,
            status,
            token_used: token_used.to_string(),
            checked_in_at: self.checkin_time.unwrap_or_else(Utc::now),
            voted_at: self.voted_time,
            note: None,
        }
    }
}

/// Backend collaborator consumed by the station panel
///
/// One implementation speaks HTTP to the real election backend
/// ([`HttpBackend`]); a second serves rostered fixtures for tests and
/// demos ([`MemoryBackend`]).
#[async_trait]
pub trait StationBackend: Send + Sync {
    /// `GET /stations/{id}/summary`
    async fn summary(&self, station_id: &str) -> Result<StationSummary>;

    /// `GET /stations/{id}/checkins?status=`
    async fn checkins(&self, station_id: &str, filter: StatusFilter)
    -> Result<Vec<RemoteCheckin>>;

    /// `POST /stations/{id}/checkin/scan` with `{ token }`
    async fn checkin_scan(&self, station_id: &str, token: &str) -> Result<RemoteCheckin>;

    /// `POST /stations/{id}/checkin/manual` with `{ code }`
    async fn checkin_manual(&self, station_id: &str, code: &str) -> Result<RemoteCheckin>;

    /// `POST /stations/{id}/checkins/{checkinId}/approve`
    async fn approve(&self, station_id: &str, checkin_id: &str) -> Result<()>;

    /// `POST /stations/{id}/checkins/{checkinId}/reject` with `{ reason? }`
    async fn reject(&self, station_id: &str, checkin_id: &str, reason: Option<&str>)
    -> Result<()>;
}
