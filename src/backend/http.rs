//! HTTP implementation of the backend collaborator
//!
//! Speaks the election backend's REST surface with a bounded per-request
//! timeout. Every transport or protocol failure is classified into
//! [`BackendError`] / [`AdmissionError`] before leaving this module.

use crate::backend::{RemoteCheckin, StationBackend, StationSummary, StatusFilter};
use crate::errors::{AdmissionError, BackendError, Error, Result};
use crate::types::StationStats;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// REST client for the election backend
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
    timeout_secs: u64,
}

impl HttpBackend {
    /// Create a new backend client with a bounded request timeout
    pub fn new(
        base_url: impl Into<String>,
        auth_token: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: auth_token.into(),
            timeout_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Classify a transport-level reqwest failure
    fn classify_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            BackendError::Timeout(self.timeout_secs).into()
        } else if err.is_decode() {
            BackendError::Protocol(err.to_string()).into()
        } else {
            BackendError::Unreachable(err.to_string()).into()
        }
    }

    /// Classify a non-success HTTP response
    async fn classify_response(&self, response: reqwest::Response) -> Error {
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return BackendError::NotFound.into();
        }

        let body = response.text().await.unwrap_or_default();
        if let Some(admission) = parse_admission_code(&body) {
            return admission.into();
        }

        BackendError::Protocol(format!("HTTP {status}: {body}")).into()
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.auth_token)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        if !response.status().is_success() {
            return Err(self.classify_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Protocol(e.to_string()).into())
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.auth_token)
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        if !response.status().is_success() {
            return Err(self.classify_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Protocol(e.to_string()).into())
    }

    async fn post_empty(&self, path: &str, body: &serde_json::Value) -> Result<()> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.auth_token)
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        if !response.status().is_success() {
            return Err(self.classify_response(response).await);
        }

        Ok(())
    }
}

/// Extract a typed admission code from an error body
///
/// Backends wrap codes in either `{"code": "..."}` or `{"message": "..."}`;
/// fall back to scanning the raw body.
fn parse_admission_code(body: &str) -> Option<AdmissionError> {
    #[derive(Deserialize)]
    struct ErrorBody {
        code: Option<String>,
        message: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(code) = parsed.code.as_deref().and_then(AdmissionError::from_code) {
            return Some(code);
        }
        if let Some(code) = parsed
            .message
            .as_deref()
            .and_then(AdmissionError::from_code)
        {
            return Some(code);
        }
    }

    AdmissionError::from_code(body)
}

// Wire DTOs for the backend's response envelopes.

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    station: SummaryStation,
    status: String,
    stats: SummaryStats,
    last_activity_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SummaryStation {
    code: String,
    name: String,
    #[serde(default)]
    location: String,
    opens_at: Option<String>,
    closes_at: Option<String>,
    #[serde(default)]
    capacity: u32,
}

#[derive(Debug, Deserialize)]
struct SummaryStats {
    #[serde(default)]
    total_registered: u32,
    #[serde(default)]
    total_checked_in: u32,
    #[serde(default)]
    total_voted: u32,
    #[serde(default)]
    total_not_voted: u32,
}

#[derive(Debug, Deserialize)]
struct QueueResponse {
    items: Vec<CheckinRow>,
}

#[derive(Debug, Deserialize)]
struct CheckinRow {
    checkin_id: serde_json::Value,
    status: String,
    checkin_time: Option<DateTime<Utc>>,
    voted_time: Option<DateTime<Utc>>,
    voter: CheckinVoter,
}

#[derive(Debug, Deserialize)]
struct CheckinVoter {
    #[serde(alias = "nim")]
    voter_id: String,
    name: String,
    #[serde(default)]
    faculty: String,
    #[serde(default)]
    program: String,
    #[serde(default)]
    cohort: String,
    #[serde(default)]
    standing: String,
    #[serde(default)]
    station_code: String,
    #[serde(default)]
    has_voted: bool,
}

impl CheckinRow {
    fn into_remote(self) -> RemoteCheckin {
        // Numeric and string ids both appear in the wild
        let checkin_id = match self.checkin_id {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            _ => String::new(),
        };

        RemoteCheckin {
            checkin_id,
            voter_id: self.voter.voter_id,
            name: self.voter.name,
            faculty: self.voter.faculty,
            program: self.voter.program,
            cohort: self.voter.cohort,
            standing: self.voter.standing,
            status: self.status,
            assigned_station: self.voter.station_code,
            has_voted: self.voter.has_voted,
            checkin_time: self.checkin_time,
            voted_time: self.voted_time,
        }
    }
}

#[async_trait]
impl StationBackend for HttpBackend {
    async fn summary(&self, station_id: &str) -> Result<StationSummary> {
        let response: SummaryResponse =
            self.get_json(&format!("/stations/{station_id}/summary")).await?;

        Ok(StationSummary {
            code: response.station.code,
            name: response.station.name,
            location: response.station.location,
            status: response.status,
            opens_at: response.station.opens_at,
            closes_at: response.station.closes_at,
            capacity: response.station.capacity,
            stats: StationStats {
                registered: response.stats.total_registered,
                checked_in: response.stats.total_checked_in,
                voted: response.stats.total_voted,
                not_voted: response.stats.total_not_voted,
            },
            last_activity_at: response.last_activity_at,
        })
    }

    async fn checkins(
        &self,
        station_id: &str,
        filter: StatusFilter,
    ) -> Result<Vec<RemoteCheckin>> {
        let response: QueueResponse = self
            .get_json(&format!(
                "/stations/{station_id}/checkins?status={}",
                filter.query_value()
            ))
            .await?;

        Ok(response.items.into_iter().map(CheckinRow::into_remote).collect())
    }

    async fn checkin_scan(&self, station_id: &str, token: &str) -> Result<RemoteCheckin> {
        let row: CheckinRow = self
            .post_json(
                &format!("/stations/{station_id}/checkin/scan"),
                &serde_json::json!({ "token": token }),
            )
            .await?;

        Ok(row.into_remote())
    }

    async fn checkin_manual(&self, station_id: &str, code: &str) -> Result<RemoteCheckin> {
        let row: CheckinRow = self
            .post_json(
                &format!("/stations/{station_id}/checkin/manual"),
                &serde_json::json!({ "code": code }),
            )
            .await?;

        Ok(row.into_remote())
    }

    async fn approve(&self, station_id: &str, checkin_id: &str) -> Result<()> {
        self.post_empty(
            &format!("/stations/{station_id}/checkins/{checkin_id}/approve"),
            &serde_json::json!({}),
        )
        .await
    }

    async fn reject(
        &self,
        station_id: &str,
        checkin_id: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        self.post_empty(
            &format!("/stations/{station_id}/checkins/{checkin_id}/reject"),
            &serde_json::json!({ "reason": reason.unwrap_or("Verification failed") }),
        )
        .await
    }
}
