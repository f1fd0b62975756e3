// src/services/gaps.rs
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use reqwest::Client;
use serde_json::Value;

use crate::models::ScanLogEntry;
use super::normalize::parse_timestamp;

/// Fixed message for a 2xx response whose top-level shape is invalid.
pub const INVALID_FORMAT_MESSAGE: &str = "Invalid response format from gap endpoint";

/// Everything that can go wrong between issuing a request and committing
/// normalized records. All variants are recoverable at the refresh boundary.
#[derive(Debug)]
pub enum PipelineError {
    /// Network or connection level failure.
    Transport(String),
    /// Non-2xx response; `message` is the extracted or synthesized detail.
    Server { status: u16, message: String },
    /// 2xx response whose top-level shape is neither a record array nor an
    /// envelope object with a records field.
    MalformedPayload,
    /// A single element failed validation.
    MalformedRecord { field: &'static str, reason: String },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PipelineError::Transport(message) => write!(f, "request failed: {}", message),
            PipelineError::Server { message, .. } => write!(f, "{}", message),
            PipelineError::MalformedPayload => f.write_str(INVALID_FORMAT_MESSAGE),
            PipelineError::MalformedRecord { field, reason } => {
                write!(f, "malformed record: {} {}", field, reason)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Transport(err.to_string())
    }
}

/// The gap endpoint's payload shape differs across deployments: either the
/// body is the record collection itself, or an envelope carrying the records
/// plus an optional scan log and last-scan timestamp. Resolved once here;
/// downstream code never sees the raw shape.
#[derive(Debug)]
pub enum GapsPayload {
    Records(Vec<Value>),
    Envelope {
        records: Vec<Value>,
        scan_log: Vec<ScanLogEntry>,
        last_scan_time: Option<DateTime<Utc>>,
    },
}

impl GapsPayload {
    pub fn from_value(value: Value) -> Result<GapsPayload, PipelineError> {
        match value {
            Value::Array(items) => Ok(GapsPayload::Records(items)),
            Value::Object(mut map) => {
                let records = match map.remove("records").or_else(|| map.remove("gaps")) {
                    Some(Value::Array(items)) => items,
                    _ => return Err(PipelineError::MalformedPayload),
                };
                let scan_log = match map.remove("scan_log").or_else(|| map.remove("scanLog")) {
                    Some(Value::Array(entries)) => parse_scan_log(entries),
                    _ => Vec::new(),
                };
                let last_scan_time = map
                    .remove("last_scan_time")
                    .or_else(|| map.remove("lastScanTime"))
                    .or_else(|| map.remove("last_scan"))
                    .and_then(|v| v.as_str().and_then(parse_timestamp));
                Ok(GapsPayload::Envelope {
                    records,
                    scan_log,
                    last_scan_time,
                })
            }
            _ => Err(PipelineError::MalformedPayload),
        }
    }

    pub fn into_parts(self) -> (Vec<Value>, Vec<ScanLogEntry>, Option<DateTime<Utc>>) {
        match self {
            GapsPayload::Records(records) => (records, Vec::new(), None),
            GapsPayload::Envelope {
                records,
                scan_log,
                last_scan_time,
            } => (records, scan_log, last_scan_time),
        }
    }
}

/// Deserialize scan log entries element-wise, keeping the valid ones. One
/// bad entry costs that entry, never the rest of the log — the same policy
/// the controller applies to gap records.
fn parse_scan_log(entries: Vec<Value>) -> Vec<ScanLogEntry> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<ScanLogEntry>(entry) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping malformed scan log entry: {}", err);
                None
            }
        })
        .collect()
}

/// Extract a human-readable message from an error response body, falling
/// back to the transport status code when the body is not structured.
pub fn extract_error_message(status: u16, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| format!("Request failed with status {}", status))
}

/// Thin client for the remote gap-collection resource.
pub struct GapsClient {
    client: Client,
    base_url: String,
}

impl GapsClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(GapsClient { client, base_url })
    }

    /// One GET against the gap collection, resolved into a tagged payload.
    pub async fn fetch_gaps(&self) -> Result<GapsPayload, PipelineError> {
        let url = format!("{}/api/gaps", self.base_url);
        info!("Fetching gap collection from {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Server {
                status: status.as_u16(),
                message: extract_error_message(status.as_u16(), &body),
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|_| PipelineError::MalformedPayload)?;
        GapsPayload::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_comes_from_detail_field() {
        let message = extract_error_message(429, r#"{"detail":"rate limited"}"#);
        assert_eq!(message, "rate limited");
    }

    #[test]
    fn error_message_falls_back_to_status_code() {
        assert_eq!(
            extract_error_message(502, "<html>bad gateway</html>"),
            "Request failed with status 502"
        );
        assert_eq!(
            extract_error_message(500, r#"{"error":"no detail field"}"#),
            "Request failed with status 500"
        );
    }

    #[test]
    fn bare_array_payload_resolves_to_records() {
        let payload = GapsPayload::from_value(json!([{"symbol": "AAPL"}])).unwrap();
        let (records, scan_log, last_scan_time) = payload.into_parts();
        assert_eq!(records.len(), 1);
        assert!(scan_log.is_empty());
        assert!(last_scan_time.is_none());
    }

    #[test]
    fn envelope_payload_carries_scan_log_and_timestamp() {
        let payload = GapsPayload::from_value(json!({
            "records": [{"symbol": "MSFT"}, {"symbol": "NVDA"}],
            "scan_log": [
                {"symbol": "MSFT", "companyName": "Microsoft", "status": "scanned", "hasGap": true}
            ],
            "last_scan_time": "2024-01-05T14:30:00Z"
        }))
        .unwrap();

        let (records, scan_log, last_scan_time) = payload.into_parts();
        assert_eq!(records.len(), 2);
        assert_eq!(scan_log.len(), 1);
        assert_eq!(scan_log[0].symbol, "MSFT");
        assert!(scan_log[0].has_gap);
        assert_eq!(
            last_scan_time.unwrap().to_rfc3339(),
            "2024-01-05T14:30:00+00:00"
        );
    }

    #[test]
    fn envelope_accepts_camel_case_keys() {
        let payload = GapsPayload::from_value(json!({
            "records": [],
            "scanLog": [{"symbol": "AMD", "has_gap": false}],
            "lastScanTime": "2024-01-05T09:00:00"
        }))
        .unwrap();

        let (_, scan_log, last_scan_time) = payload.into_parts();
        assert_eq!(scan_log.len(), 1);
        assert!(last_scan_time.is_some());
    }

    #[test]
    fn malformed_scan_log_entry_does_not_discard_the_rest() {
        let payload = GapsPayload::from_value(json!({
            "records": [],
            "scan_log": [
                {"symbol": "MSFT", "status": "scanned", "hasGap": true},
                {"status": "scanned", "hasGap": false}
            ]
        }))
        .unwrap();

        let (_, scan_log, _) = payload.into_parts();
        assert_eq!(scan_log.len(), 1);
        assert_eq!(scan_log[0].symbol, "MSFT");
    }

    #[test]
    fn non_array_scan_log_is_ignored() {
        let payload = GapsPayload::from_value(json!({
            "records": [{"symbol": "AAPL"}],
            "scan_log": "not-a-list"
        }))
        .unwrap();

        let (records, scan_log, _) = payload.into_parts();
        assert_eq!(records.len(), 1);
        assert!(scan_log.is_empty());
    }

    #[test]
    fn envelope_without_records_array_is_malformed() {
        let err = GapsPayload::from_value(json!({"status": "ok"})).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedPayload));

        let err = GapsPayload::from_value(json!({"records": "not-an-array"})).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedPayload));
    }

    #[test]
    fn scalar_payload_is_malformed() {
        let err = GapsPayload::from_value(json!(42)).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedPayload));
        assert_eq!(err.to_string(), INVALID_FORMAT_MESSAGE);
    }
}
