// src/routes.rs
use std::collections::HashMap;
use std::convert::Infallible;

use log::info;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::error::ApiError;
use crate::handlers::gaps::{get_chart, get_gaps, get_health, get_scan_log, SharedState};

// Recovery handling for our custom errors
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.clone();
    } else {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(state: SharedState) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let state_filter = warp::any().map(move || state.clone());

    let gaps_route = warp::path!("api" / "gaps")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(state_filter.clone())
        .and_then(get_gaps);

    let chart_route = warp::path!("api" / "gaps" / "chart")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(get_chart);

    let scan_log_route = warp::path!("api" / "scan-log")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(get_scan_log);

    let health_route = warp::path!("api" / "health")
        .and(warp::get())
        .and(state_filter.clone())
        .and_then(get_health);

    info!("All routes configured successfully.");

    gaps_route
        .or(chart_route)
        .or(scan_log_route)
        .or(health_route)
        .recover(handle_rejection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GapRecord, GapType, RefreshState};
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn seeded_state() -> SharedState {
        let mut state = RefreshState::default();
        state.records = vec![GapRecord {
            symbol: "AAPL".to_string(),
            company_name: "Apple Inc.".to_string(),
            sector: Some("Information Technology".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            gap_type: GapType::Up,
            gap_size: 2.3,
            price: Some(185.6),
            volume: None,
            average_volume: None,
            relative_volume: None,
            market_cap: None,
        }];
        Arc::new(RwLock::new(state))
    }

    #[tokio::test]
    async fn gaps_route_serves_filtered_table() {
        let api = routes(seeded_state());

        let reply = warp::test::request()
            .path("/api/gaps?sort=gap_size&dir=desc&filter=tech")
            .reply(&api)
            .await;
        assert_eq!(reply.status(), 200);

        let body: serde_json::Value = serde_json::from_slice(reply.body()).unwrap();
        assert_eq!(body["total"], 1);
        assert_eq!(body["records"][0]["symbol"], "AAPL");
        assert_eq!(body["records"][0]["gap_type"], "up");
    }

    #[tokio::test]
    async fn unknown_sort_key_is_a_bad_request() {
        let api = routes(seeded_state());

        let reply = warp::test::request()
            .path("/api/gaps?sort=bogus")
            .reply(&api)
            .await;
        assert_eq!(reply.status(), 400);

        let body: serde_json::Value = serde_json::from_slice(reply.body()).unwrap();
        assert_eq!(body["error"], "unknown sort key: bogus");
    }

    #[tokio::test]
    async fn chart_route_serves_buckets() {
        let api = routes(seeded_state());

        let reply = warp::test::request().path("/api/gaps/chart").reply(&api).await;
        assert_eq!(reply.status(), 200);

        let body: serde_json::Value = serde_json::from_slice(reply.body()).unwrap();
        assert_eq!(body[0]["date"], "2024-01-05");
        assert_eq!(body[0]["count"], 1);
        assert_eq!(body[0]["up"], 1);
        assert_eq!(body[0]["down"], 0);
    }

    #[tokio::test]
    async fn health_route_reports_record_count() {
        let api = routes(seeded_state());

        let reply = warp::test::request().path("/api/health").reply(&api).await;
        assert_eq!(reply.status(), 200);

        let body: serde_json::Value = serde_json::from_slice(reply.body()).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["records"], 1);
        assert_eq!(body["cached_results_available"], true);
        assert_eq!(body["is_loading"], false);
    }
}
