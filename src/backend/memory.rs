//! In-memory backend for tests and demos
//!
//! Serves a small rostered ledger with the same contract as the HTTP
//! backend: staged scan payloads resolve to voters, check-ins are recorded
//! server-side, and fault injection simulates an unreachable or
//! unprovisioned backend.

use crate::backend::{RemoteCheckin, StationBackend, StationSummary, StatusFilter};
use crate::errors::{AdmissionError, BackendError, Error, Result};
use crate::types::{QueueStatus, StationStats};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

/// One voter on the election roster
#[derive(Debug, Clone)]
pub struct RosterVoter {
    pub voter_id: String,
    pub name: String,
    pub faculty: String,
    pub program: String,
    pub cohort: String,
    pub standing: String,
    /// Station this voter is assigned to
    pub station_id: String,
    /// Whether a completed ballot already exists for this voter
    pub has_voted: bool,
}

impl RosterVoter {
    /// Minimal roster row for fixtures
    pub fn new(voter_id: &str, name: &str, station_id: &str) -> Self {
        Self {
            voter_id: voter_id.to_string(),
            name: name.to_string(),
            faculty: "Engineering".to_string(),
            program: "Informatics".to_string(),
            cohort: "2021".to_string(),
            standing: "Active".to_string(),
            station_id: station_id.to_string(),
            has_voted: false,
        }
    }
}

#[derive(Debug, Clone)]
struct StationSeed {
    code: String,
    name: String,
    location: String,
    status: String,
    opens_at: Option<String>,
    closes_at: Option<String>,
    capacity: u32,
}

#[derive(Default)]
struct Ledger {
    stations: HashMap<String, StationSeed>,
    roster: HashMap<String, RosterVoter>,
    /// Staged scan payload -> voter id (a voter who claimed the current token)
    scan_claims: HashMap<String, String>,
    /// Recorded check-ins per station
    checkins: HashMap<String, Vec<RemoteCheckin>>,
    next_checkin_id: u64,
    offline: bool,
}

/// Fixture backend holding the authoritative ledger in memory
pub struct MemoryBackend {
    ledger: RwLock<Ledger>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self {
            ledger: RwLock::new(Ledger {
                next_checkin_id: 100,
                ..Ledger::default()
            }),
        }
    }

    /// Create a backend with one provisioned station for testing
    pub fn for_testing(station_id: &str) -> Self {
        let backend = Self::new();
        backend.provision_station(station_id, "TPS 01 Rektorat", "Gedung Rektorat Lt. 1");
        backend
    }

    /// Provision a station in the ledger
    pub fn provision_station(&self, station_id: &str, name: &str, location: &str) {
        let Ok(mut ledger) = self.ledger.write() else {
            return;
        };
        ledger.stations.insert(
            station_id.to_string(),
            StationSeed {
                code: station_id.to_string(),
                name: name.to_string(),
                location: location.to_string(),
                status: "ACTIVE".to_string(),
                opens_at: Some("08:00".to_string()),
                closes_at: Some("16:00".to_string()),
                capacity: 500,
            },
        );
        ledger.checkins.entry(station_id.to_string()).or_default();
    }

    /// Add a voter to the roster
    pub fn register_voter(&self, voter: RosterVoter) {
        let Ok(mut ledger) = self.ledger.write() else {
            return;
        };
        ledger.roster.insert(voter.voter_id.clone(), voter);
    }

    /// Stage a scan payload as claimed by a voter
    ///
    /// Simulates the voter having scanned the station QR: the payload the
    /// operator scans back resolves to this voter.
    pub fn stage_scan(&self, payload: &str, voter_id: &str) {
        let Ok(mut ledger) = self.ledger.write() else {
            return;
        };
        ledger
            .scan_claims
            .insert(payload.to_string(), voter_id.to_string());
    }

    /// Mark a rostered voter as having voted
    pub fn mark_voted(&self, voter_id: &str) {
        let Ok(mut ledger) = self.ledger.write() else {
            return;
        };
        if let Some(voter) = ledger.roster.get_mut(voter_id) {
            voter.has_voted = true;
        }
    }

    /// Simulate the backend becoming unreachable
    pub fn set_offline(&self, offline: bool) {
        let Ok(mut ledger) = self.ledger.write() else {
            return;
        };
        ledger.offline = offline;
    }

    /// Seed a check-in row directly (reconciliation fixtures)
    pub fn push_checkin(&self, station_id: &str, row: RemoteCheckin) {
        let Ok(mut ledger) = self.ledger.write() else {
            return;
        };
        ledger
            .checkins
            .entry(station_id.to_string())
            .or_default()
            .push(row);
    }

    /// Drop all recorded check-ins for a station
    pub fn clear_checkins(&self, station_id: &str) {
        let Ok(mut ledger) = self.ledger.write() else {
            return;
        };
        if let Some(rows) = ledger.checkins.get_mut(station_id) {
            rows.clear();
        }
    }

    fn guard_online(ledger: &Ledger) -> Result<()> {
        if ledger.offline {
            return Err(BackendError::Unreachable("connection refused".to_string()).into());
        }
        Ok(())
    }

    /// Resolve a claim to a voter and record the check-in when admissible
    fn resolve_and_record(&self, station_id: &str, voter_id: &str) -> Result<RemoteCheckin> {
        let mut ledger = self
            .ledger
            .write()
            .map_err(|_| Error::internal("ledger lock poisoned"))?;

        if !ledger.stations.contains_key(station_id) {
            return Err(BackendError::NotFound.into());
        }

        let voter = ledger
            .roster
            .get(voter_id)
            .cloned()
            .ok_or(AdmissionError::InvalidToken)?;

        let admissible = voter.station_id == station_id
            && !voter.has_voted
            && !ledger
                .checkins
                .get(station_id)
                .map(|rows| {
                    rows.iter().any(|row| {
                        row.voter_id == voter.voter_id
                            && QueueStatus::from_wire(&row.status).is_active()
                    })
                })
                .unwrap_or(false);

        let checkin_id = if admissible {
            ledger.next_checkin_id += 1;
            ledger.next_checkin_id.to_string()
        } else {
            // Inadmissible attempts are returned for classification but
            // never recorded in the ledger.
            String::new()
        };

        let row = RemoteCheckin {
            checkin_id,
            voter_id: voter.voter_id.clone(),
            name: voter.name.clone(),
            faculty: voter.faculty.clone(),
            program: voter.program.clone(),
            cohort: voter.cohort.clone(),
            standing: voter.standing.clone(),
            status: "CHECKED_IN".to_string(),
            assigned_station: voter.station_id.clone(),
            has_voted: voter.has_voted,
            checkin_time: Some(Utc::now()),
            voted_time: None,
        };

        if admissible {
            ledger
                .checkins
                .entry(station_id.to_string())
                .or_default()
                .push(row.clone());
        }

        Ok(row)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StationBackend for MemoryBackend {
    async fn summary(&self, station_id: &str) -> Result<StationSummary> {
        let ledger = self
            .ledger
            .read()
            .map_err(|_| Error::internal("ledger lock poisoned"))?;
        Self::guard_online(&ledger)?;

        let seed = ledger
            .stations
            .get(station_id)
            .ok_or(BackendError::NotFound)?;

        let registered = ledger
            .roster
            .values()
            .filter(|voter| voter.station_id == station_id)
            .count() as u32;
        let rows = ledger.checkins.get(station_id);
        let checked_in = rows.map(|rows| rows.len()).unwrap_or(0) as u32;
        let voted = rows
            .map(|rows| {
                rows.iter()
                    .filter(|row| QueueStatus::from_wire(&row.status) == QueueStatus::Voted)
                    .count()
            })
            .unwrap_or(0) as u32;

        Ok(StationSummary {
            code: seed.code.clone(),
            name: seed.name.clone(),
            location: seed.location.clone(),
            status: seed.status.clone(),
            opens_at: seed.opens_at.clone(),
            closes_at: seed.closes_at.clone(),
            capacity: seed.capacity,
            stats: StationStats {
                registered,
                checked_in,
                voted,
                not_voted: registered.saturating_sub(voted),
            },
            last_activity_at: Some(Utc::now()),
        })
    }

    async fn checkins(
        &self,
        station_id: &str,
        filter: StatusFilter,
    ) -> Result<Vec<RemoteCheckin>> {
        let ledger = self
            .ledger
            .read()
            .map_err(|_| Error::internal("ledger lock poisoned"))?;
        Self::guard_online(&ledger)?;

        let rows = ledger
            .checkins
            .get(station_id)
            .ok_or(BackendError::NotFound)?;

        Ok(rows
            .iter()
            .filter(|row| filter.matches(QueueStatus::from_wire(&row.status)))
            .cloned()
            .collect())
    }

    async fn checkin_scan(&self, station_id: &str, token: &str) -> Result<RemoteCheckin> {
        let voter_id = {
            let ledger = self
                .ledger
                .read()
                .map_err(|_| Error::internal("ledger lock poisoned"))?;
            Self::guard_online(&ledger)?;
            ledger
                .scan_claims
                .get(token)
                .cloned()
                .ok_or(AdmissionError::InvalidToken)?
        };

        self.resolve_and_record(station_id, &voter_id)
    }

    async fn checkin_manual(&self, station_id: &str, code: &str) -> Result<RemoteCheckin> {
        {
            let ledger = self
                .ledger
                .read()
                .map_err(|_| Error::internal("ledger lock poisoned"))?;
            Self::guard_online(&ledger)?;
            if !ledger.roster.contains_key(code) {
                return Err(AdmissionError::InvalidToken.into());
            }
        }

        self.resolve_and_record(station_id, code)
    }

    async fn approve(&self, station_id: &str, checkin_id: &str) -> Result<()> {
        let mut ledger = self
            .ledger
            .write()
            .map_err(|_| Error::internal("ledger lock poisoned"))?;
        Self::guard_online(&ledger)?;

        let rows = ledger
            .checkins
            .get_mut(station_id)
            .ok_or(BackendError::NotFound)?;
        let row = rows
            .iter_mut()
            .find(|row| row.checkin_id == checkin_id)
            .ok_or(BackendError::NotFound)?;

        row.status = "VERIFIED".to_string();
        Ok(())
    }

    async fn reject(
        &self,
        station_id: &str,
        checkin_id: &str,
        _reason: Option<&str>,
    ) -> Result<()> {
        let mut ledger = self
            .ledger
            .write()
            .map_err(|_| Error::internal("ledger lock poisoned"))?;
        Self::guard_online(&ledger)?;

        let rows = ledger
            .checkins
            .get_mut(station_id)
            .ok_or(BackendError::NotFound)?;
        let row = rows
            .iter_mut()
            .find(|row| row.checkin_id == checkin_id)
            .ok_or(BackendError::NotFound)?;

        row.status = "REJECTED".to_string();
        Ok(())
    }
}
