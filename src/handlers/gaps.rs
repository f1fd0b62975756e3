// src/handlers/gaps.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use tokio::sync::RwLock;
use warp::reply::Json;
use warp::Rejection;

use crate::models::{GapRecord, RefreshState, ScanLogEntry};
use crate::services::chart;
use crate::services::table::{self, SortDirection, SortKey};
use super::error::ApiError;

pub type SharedState = Arc<RwLock<RefreshState>>;

#[derive(Serialize)]
pub struct TableResponse {
    pub records: Vec<GapRecord>,
    pub total: usize,
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub last_successful_fetch_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct ScanLogResponse {
    pub entries: Vec<ScanLogEntry>,
    pub last_scan_time: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub records: usize,
    pub cached_results_available: bool,
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub last_successful_fetch_at: Option<DateTime<Utc>>,
    pub seconds_since_last_fetch: Option<i64>,
}

fn parse_table_query(
    query: &HashMap<String, String>,
) -> Result<(SortKey, SortDirection, String), Rejection> {
    let sort = match query.get("sort") {
        Some(raw) => SortKey::parse(raw).ok_or_else(|| {
            warp::reject::custom(ApiError::bad_request(format!("unknown sort key: {}", raw)))
        })?,
        None => SortKey::Date,
    };
    let dir = match query.get("dir") {
        Some(raw) => SortDirection::parse(raw).ok_or_else(|| {
            warp::reject::custom(ApiError::bad_request(format!(
                "unknown sort direction: {}",
                raw
            )))
        })?,
        None => SortDirection::Ascending,
    };
    let filter = query.get("filter").cloned().unwrap_or_default();
    Ok((sort, dir, filter))
}

/// Sorted/filtered table view plus the refresh status the banner needs.
pub async fn get_gaps(
    query: HashMap<String, String>,
    state: SharedState,
) -> Result<Json, Rejection> {
    let (sort, dir, filter) = parse_table_query(&query)?;
    let state = state.read().await;
    let records = table::view(&state.records, sort, dir, &filter);
    info!(
        "Serving table view: {} of {} records",
        records.len(),
        state.records.len()
    );
    Ok(warp::reply::json(&TableResponse {
        total: records.len(),
        records,
        is_loading: state.is_loading,
        last_error: state.last_error.clone(),
        last_scan_time: state.last_scan_time,
        last_successful_fetch_at: state.last_successful_fetch_at,
    }))
}

/// Per-day up/down buckets for the chart.
pub async fn get_chart(state: SharedState) -> Result<Json, Rejection> {
    let state = state.read().await;
    let buckets = chart::aggregate(&state.records);
    Ok(warp::reply::json(&buckets))
}

/// Extended-variant scan log, passed through as received.
pub async fn get_scan_log(state: SharedState) -> Result<Json, Rejection> {
    let state = state.read().await;
    Ok(warp::reply::json(&ScanLogResponse {
        entries: state.scan_log.clone(),
        last_scan_time: state.last_scan_time,
    }))
}

/// Status summary mirroring the upstream service's health endpoint.
pub async fn get_health(state: SharedState) -> Result<Json, Rejection> {
    let state = state.read().await;
    let seconds_since_last_fetch = state
        .last_successful_fetch_at
        .map(|t| (Utc::now() - t).num_seconds());
    Ok(warp::reply::json(&HealthResponse {
        status: "healthy",
        records: state.records.len(),
        cached_results_available: !state.records.is_empty(),
        is_loading: state.is_loading,
        last_error: state.last_error.clone(),
        last_successful_fetch_at: state.last_successful_fetch_at,
        seconds_since_last_fetch,
    }))
}
