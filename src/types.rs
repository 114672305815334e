//! # Core Types for the Station Panel
//!
//! This module defines the fundamental data structures used throughout the
//! check-in subsystem.
//!
//! ## Type Categories
//!
//! ### Station Identity
//! - [`StationInfo`]: identity and operating state of one polling station
//! - [`StationStats`]: aggregate counters reported by the backend
//!
//! ### Queue Lifecycle
//! - [`QueueStatus`]: closed lifecycle enumeration with an exhaustive
//!   transition table
//! - [`QueueEntry`]: one admitted voter's station-scoped progress record
//! - [`AdmissionRequest`]: scanned-token or manual-code admission payload
//!
//! ## Usage Examples
//!
//! ```rust
//! use tps_panel::types::QueueStatus;
//!
//! // CHECKED_IN may advance to VOTED, but never back out of it
//! assert!(QueueStatus::CheckedIn.can_transition_to(QueueStatus::Voted));
//! assert!(QueueStatus::Voted.is_terminal());
//! assert!(!QueueStatus::Voted.can_transition_to(QueueStatus::Rejected));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Administrative open/closed state of a station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StationStatus {
    /// Station is open and admitting voters
    Active,
    /// Station is closed; no admissions accepted
    Inactive,
}

impl StationStatus {
    /// Parse a backend status string, tolerating mixed vocabularies
    pub fn from_wire(raw: &str) -> Self {
        match raw.to_uppercase().as_str() {
            "ACTIVE" | "AKTIF" | "OPEN" => Self::Active,
            _ => Self::Inactive,
        }
    }
}

/// Identity and operating state of one polling station
///
/// Owned by the station's panel instance; mutated only via administrative
/// updates or the reconciliation client's replace operation. Created when
/// a station is provisioned, never deleted during an election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationInfo {
    /// Short station code (e.g., "TPS-01")
    pub code: String,

    /// Human-readable station name
    pub name: String,

    /// Physical location description
    pub location: String,

    /// Opening time of the station's operating window, if scheduled
    pub opens_at: Option<String>,

    /// Closing time of the station's operating window, if scheduled
    pub closes_at: Option<String>,

    /// Administrative open/closed status
    pub status: StationStatus,

    /// Registered-voter capacity of this station
    pub capacity: u32,

    /// Voters registered to this station
    pub registered_voters: u32,
}

impl StationInfo {
    /// Whether the station is currently admitting voters
    pub fn is_open(&self) -> bool {
        self.status == StationStatus::Active
    }
}

/// Aggregate counters for a station, reported by the backend summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationStats {
    pub registered: u32,
    pub checked_in: u32,
    pub voted: u32,
    pub not_voted: u32,
}

/// How an admitted voter will cast their ballot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingMode {
    /// Voting on a station-provided booth device
    Station,
    /// Voting on the voter's own device while physically present
    Device,
}

/// Lifecycle status of a queue entry
///
/// The transition table is closed and checked exhaustively:
///
/// ```text
/// PENDING ────► CHECKED_IN ────► VERIFIED ────► VOTED      (terminal)
///    │               │               │────────► REJECTED   (terminal)
///    │               │────────────────────────► VOTED / REJECTED
///    └── any non-terminal ────────────────────► CANCELLED  (terminal)
/// ```
///
/// There is no transition out of `VOTED`, `REJECTED`, or `CANCELLED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    /// Known to the backend but not yet admitted at the station
    Pending,
    /// Admitted into the station queue (initial status on admission)
    CheckedIn,
    /// Operator verified the voter's identity documents
    Verified,
    /// Ballot cast; terminal success
    Voted,
    /// Operator rejected the voter; terminal failure
    Rejected,
    /// Entry cancelled by an operator; terminal
    Cancelled,
}

impl QueueStatus {
    /// Whether this status admits no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Voted | Self::Rejected | Self::Cancelled)
    }

    /// Whether this entry still occupies the active portion of the queue
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Exhaustive transition table for the lifecycle state machine
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        match (self, next) {
            // Backend-known voters check in or get resolved directly
            (Self::Pending, Self::CheckedIn)
            | (Self::Pending, Self::Rejected)
            | (Self::Pending, Self::Cancelled) => true,

            // Checked-in voters verify, vote, or get rejected/cancelled
            (Self::CheckedIn, Self::Verified)
            | (Self::CheckedIn, Self::Voted)
            | (Self::CheckedIn, Self::Rejected)
            | (Self::CheckedIn, Self::Cancelled) => true,

            // Verified voters vote or get rejected/cancelled
            (Self::Verified, Self::Voted)
            | (Self::Verified, Self::Rejected)
            | (Self::Verified, Self::Cancelled) => true,

            // Terminal states are immutable; everything else is denied
            _ => false,
        }
    }

    /// Parse a backend status string
    ///
    /// Unknown vocabularies fall back to `Pending`, matching the backend's
    /// own treatment of unrecognized rows.
    pub fn from_wire(raw: &str) -> Self {
        match raw.to_uppercase().as_str() {
            "CHECKED_IN" | "WAITING" => Self::CheckedIn,
            "VERIFIED" => Self::Verified,
            "VOTED" => Self::Voted,
            "REJECTED" => Self::Rejected,
            "CANCELLED" => Self::Cancelled,
            _ => Self::Pending,
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Pending => "PENDING",
            Self::CheckedIn => "CHECKED_IN",
            Self::Verified => "VERIFIED",
            Self::Voted => "VOTED",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(label)
    }
}

/// One admitted voter's progress record at the station
///
/// Created by the admission protocol handler on successful validation,
/// mutated only by the status transition engine, and never physically
/// deleted except by an explicit (logged) operator removal. The voter
/// identifier is unique among entries whose status is not `CANCELLED`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Unique entry identifier (backend check-in id when acknowledged)
    pub id: String,

    /// Voter identifier (NIM/NIDN/NIP-equivalent)
    pub voter_id: String,

    /// Voter's display name
    pub name: String,

    /// Faculty descriptor
    pub faculty: String,

    /// Program / study descriptor
    pub program: String,

    /// Cohort / intake year descriptor
    pub cohort: String,

    /// Registration standing of the voter (e.g., "Active")
    pub voter_standing: String,

    /// How this voter will cast their ballot
    pub mode: VotingMode,

    /// Lifecycle status
    pub status: QueueStatus,

    /// Admission token presented at check-in
    pub token_used: String,

    /// When the voter was admitted
    pub checked_in_at: DateTime<Utc>,

    /// When the voter completed voting (stamped on entering `VOTED`)
    pub voted_at: Option<DateTime<Utc>>,

    /// Audit annotation; the only field mutable after a terminal state
    pub note: Option<String>,
}

impl QueueEntry {
    /// Whether this entry has completed voting
    pub fn has_voted(&self) -> bool {
        self.status == QueueStatus::Voted
    }

    /// Whether this entry still counts against the active-voter class
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Admission payload presented at the station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AdmissionRequest {
    /// Scanned admission token
    Scan { token: String },
    /// Manually entered fallback code
    Manual { code: String },
}

impl AdmissionRequest {
    /// The opaque payload carried by this request
    pub fn payload(&self) -> &str {
        match self {
            Self::Scan { token } => token,
            Self::Manual { code } => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_terminal_states() {
        let all = [
            QueueStatus::Pending,
            QueueStatus::CheckedIn,
            QueueStatus::Verified,
            QueueStatus::Voted,
            QueueStatus::Rejected,
            QueueStatus::Cancelled,
        ];

        for terminal in [
            QueueStatus::Voted,
            QueueStatus::Rejected,
            QueueStatus::Cancelled,
        ] {
            assert!(terminal.is_terminal());
            for next in all {
                assert!(
                    !terminal.can_transition_to(next),
                    "{terminal} must not transition to {next}"
                );
            }
        }
    }

    #[test]
    fn test_transition_table_active_paths() {
        assert!(QueueStatus::CheckedIn.can_transition_to(QueueStatus::Verified));
        assert!(QueueStatus::CheckedIn.can_transition_to(QueueStatus::Voted));
        assert!(QueueStatus::Verified.can_transition_to(QueueStatus::Rejected));
        assert!(QueueStatus::Pending.can_transition_to(QueueStatus::CheckedIn));

        // No skipping backwards
        assert!(!QueueStatus::Verified.can_transition_to(QueueStatus::CheckedIn));
        assert!(!QueueStatus::CheckedIn.can_transition_to(QueueStatus::Pending));
    }

    #[test]
    fn test_status_wire_parsing() {
        assert_eq!(QueueStatus::from_wire("voted"), QueueStatus::Voted);
        assert_eq!(QueueStatus::from_wire("WAITING"), QueueStatus::CheckedIn);
        assert_eq!(QueueStatus::from_wire("garbage"), QueueStatus::Pending);
    }

    #[test]
    fn test_station_status_wire_parsing() {
        assert_eq!(StationStatus::from_wire("active"), StationStatus::Active);
        assert_eq!(StationStatus::from_wire("Aktif"), StationStatus::Active);
        assert_eq!(StationStatus::from_wire("closed"), StationStatus::Inactive);
    }
}
