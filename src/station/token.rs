//! Admission token rotation
//!
//! Maintains the single station-scoped admission token:
//! 1. At most one active token per station at any instant
//! 2. Automatic rotation on a fixed countdown interval
//! 3. Manual rotation on operator request, resetting the countdown
//! 4. Pausable countdown that captures remaining time instead of
//!    resetting on resume (no premature expiry, no lifetime inflation)
//!
//! The rotator only answers "what is current"; comparing a presented token
//! against the current one is the admission handler's job.

use crate::station::activity::{ActivityFeed, HistoryKind, NotificationKind};
use crate::{Result, internal_error};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// What caused a rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationTrigger {
    /// Countdown reached zero
    Auto,
    /// Operator forced a refresh
    Manual,
}

/// Station-scoped one-time admission token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionToken {
    /// Opaque token value presented by voters
    pub value: String,
    /// When this token was issued
    pub issued_at: DateTime<Utc>,
    /// Fixed rotation interval this token lives for
    pub ttl_secs: u64,
}

/// Snapshot of the rotator's operational state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotatorStats {
    pub remaining_secs: u64,
    pub interval_secs: u64,
    pub paused: bool,
    pub total_rotations: u64,
    pub manual_rotations: u64,
}

struct RotatorState {
    token: AdmissionToken,
    /// Unix-seconds deadline of the current countdown
    deadline: u64,
    /// Captured remaining seconds while the countdown is paused
    paused_remaining: Option<u64>,
    total_rotations: u64,
    manual_rotations: u64,
}

/// Rotating admission token source for one station
pub struct TokenRotator {
    station_tag: String,
    interval_secs: u64,
    feed: Arc<ActivityFeed>,
    state: RwLock<RotatorState>,
}

impl TokenRotator {
    /// Create a rotator and issue the initial token (station-open time)
    pub fn new(station_code: &str, interval_secs: u64, feed: Arc<ActivityFeed>) -> Result<Self> {
        let station_tag = station_code.to_lowercase().replace(['-', ' '], "_");
        let token = issue_token(&station_tag, interval_secs)?;
        let deadline = unix_now()? + interval_secs;

        tracing::info!(
            "🎫 Token rotator initialized: station={}, interval={}s",
            station_code,
            interval_secs
        );

        Ok(Self {
            station_tag,
            interval_secs,
            feed,
            state: RwLock::new(RotatorState {
                token,
                deadline,
                paused_remaining: None,
                total_rotations: 0,
                manual_rotations: 0,
            }),
        })
    }

    /// The station's current admission token
    pub fn current(&self) -> Result<AdmissionToken> {
        let state = self
            .state
            .read()
            .map_err(|_| internal_error!("Rotator state lock poisoned"))?;
        Ok(state.token.clone())
    }

    /// Seconds until the current token expires (0 when overdue)
    pub fn remaining_secs(&self) -> u64 {
        let Ok(state) = self.state.read() else {
            return 0;
        };

        match state.paused_remaining {
            Some(remaining) => remaining,
            None => state.deadline.saturating_sub(unix_now().unwrap_or(u64::MAX)),
        }
    }

    /// Whether the countdown has elapsed and an auto-rotation is due
    ///
    /// Never true while paused; a hidden panel must not silently expire
    /// its token.
    pub fn is_due(&self) -> Result<bool> {
        let state = self
            .state
            .read()
            .map_err(|_| internal_error!("Rotator state lock poisoned"))?;

        Ok(state.paused_remaining.is_none() && unix_now()? >= state.deadline)
    }

    /// Invalidate the current token and issue a new one
    ///
    /// Resets the countdown to the full interval. Emits one audit record
    /// and one notification distinguishing the trigger.
    pub fn rotate(&self, trigger: RotationTrigger) -> Result<AdmissionToken> {
        let new_token = {
            let mut state = self
                .state
                .write()
                .map_err(|_| internal_error!("Rotator state lock poisoned"))?;

            let mut token = issue_token(&self.station_tag, self.interval_secs)?;
            // Random material makes collisions vanishingly rare, but the
            // one-active-token invariant demands strict inequality.
            while token.value == state.token.value {
                token = issue_token(&self.station_tag, self.interval_secs)?;
            }

            state.token = token.clone();
            state.deadline = unix_now()? + self.interval_secs;
            if state.paused_remaining.is_some() {
                state.paused_remaining = Some(self.interval_secs);
            }
            state.total_rotations += 1;
            if trigger == RotationTrigger::Manual {
                state.manual_rotations += 1;
            }

            token
        };

        let label = match trigger {
            RotationTrigger::Manual => "Admission token refreshed manually by operator",
            RotationTrigger::Auto => "Admission token rotated automatically",
        };

        tracing::info!("🔄 {}: station={}", label, self.station_tag);
        self.feed.log(label);
        self.feed.history(HistoryKind::TokenRotated, None, None, label);
        self.feed.notify(
            NotificationKind::Info,
            "Admission token rotated",
            match trigger {
                RotationTrigger::Manual => "A new token is ready to be scanned.",
                RotationTrigger::Auto => "Token rotated automatically for channel security.",
            },
        );

        Ok(new_token)
    }

    /// Pause the countdown, capturing the remaining time
    pub fn pause(&self) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| internal_error!("Rotator state lock poisoned"))?;

        if state.paused_remaining.is_none() {
            let remaining = state.deadline.saturating_sub(unix_now()?);
            state.paused_remaining = Some(remaining);
            tracing::debug!("⏸️  Token countdown paused with {}s remaining", remaining);
        }

        Ok(())
    }

    /// Resume the countdown from the captured remaining time
    ///
    /// Recomputes the deadline from the remainder; never resets to the
    /// full interval.
    pub fn resume(&self) -> Result<()> {
        let mut state = self
            .state
            .write()
            .map_err(|_| internal_error!("Rotator state lock poisoned"))?;

        if let Some(remaining) = state.paused_remaining.take() {
            state.deadline = unix_now()? + remaining;
            tracing::debug!("▶️  Token countdown resumed with {}s remaining", remaining);
        }

        Ok(())
    }

    /// Operational snapshot
    pub fn stats(&self) -> Result<RotatorStats> {
        let state = self
            .state
            .read()
            .map_err(|_| internal_error!("Rotator state lock poisoned"))?;

        let remaining = match state.paused_remaining {
            Some(remaining) => remaining,
            None => state.deadline.saturating_sub(unix_now()?),
        };

        Ok(RotatorStats {
            remaining_secs: remaining,
            interval_secs: self.interval_secs,
            paused: state.paused_remaining.is_some(),
            total_rotations: state.total_rotations,
            manual_rotations: state.manual_rotations,
        })
    }
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| internal_error!("System time error"))?
        .as_secs())
}

fn issue_token(station_tag: &str, ttl_secs: u64) -> Result<AdmissionToken> {
    let mut material = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut material);

    Ok(AdmissionToken {
        value: format!("{station_tag}_{}", hex::encode(material)),
        issued_at: Utc::now(),
        ttl_secs,
    })
}
