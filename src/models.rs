// src/models.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};

/// Direction of a price gap. The gap size itself is always a non-negative
/// magnitude; the sign lives here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapType {
    Up,
    Down,
}

/// One detected price gap for one symbol on one trading date.
///
/// `date` is always calendar-date granularity (midnight UTC), regardless of
/// whether the source supplied a bare date or a full timestamp. Identity is
/// the composite `(symbol, date)`; duplicates within a fetch are kept in
/// arrival order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapRecord {
    pub symbol: String,
    #[serde(rename = "companyName")]
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    pub date: NaiveDate,
    #[serde(rename = "gap_type")]
    pub gap_type: GapType,
    #[serde(rename = "gap_size")]
    pub gap_size: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(rename = "averageVolume", skip_serializing_if = "Option::is_none")]
    pub average_volume: Option<f64>,
    #[serde(rename = "relativeVolume", skip_serializing_if = "Option::is_none")]
    pub relative_volume: Option<f64>,
    #[serde(rename = "marketCap", skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
}

/// One scan attempt for one symbol, reported by the extended endpoint
/// variant. Passed through as received; only `symbol` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanLogEntry {
    pub symbol: String,
    #[serde(rename = "companyName", alias = "company_name", default)]
    pub company_name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub time: String,
    #[serde(rename = "hasGap", alias = "has_gap", default)]
    pub has_gap: bool,
}

/// Per-day gap counts for charting. Derived, never persisted; recomputed in
/// full on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartBucket {
    pub date: NaiveDate,
    pub count: u32,
    pub up: u32,
    pub down: u32,
}

/// Shared pipeline state. Written only by the refresh controller; the HTTP
/// handlers hold a read reference.
#[derive(Debug, Default)]
pub struct RefreshState {
    pub records: Vec<GapRecord>,
    pub scan_log: Vec<ScanLogEntry>,
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub last_successful_fetch_at: Option<DateTime<Utc>>,
    pub last_scan_time: Option<DateTime<Utc>>,
    /// Epoch of the last request whose response was applied. Responses
    /// carrying an older epoch are discarded.
    pub last_applied_epoch: u64,
}
