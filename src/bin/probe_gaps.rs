use dotenv::dotenv;
use log::{info, warn};
use std::env;

use gap_dashboard::services::chart;
use gap_dashboard::services::gaps::GapsClient;
use gap_dashboard::services::normalize::normalize_record;

/// One-shot probe: fetch the gap collection, normalize it, and print the
/// per-day aggregate. Useful for checking an endpoint before pointing the
/// dashboard at it.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let base_url =
        env::var("GAPS_API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    info!("Probing gap endpoint at {}", base_url);

    let client = GapsClient::new(&base_url)?;
    let payload = client.fetch_gaps().await?;
    let (raw_records, scan_log, last_scan_time) = payload.into_parts();
    info!(
        "Payload: {} raw records, {} scan log entries, last scan: {:?}",
        raw_records.len(),
        scan_log.len(),
        last_scan_time
    );

    let mut records = Vec::new();
    for raw in &raw_records {
        match normalize_record(raw) {
            Ok(record) => records.push(record),
            Err(err) => warn!("Malformed record: {}", err),
        }
    }
    info!("Normalized {} records", records.len());

    for bucket in chart::aggregate(&records) {
        info!(
            "{}: {} gaps ({} up / {} down)",
            bucket.date, bucket.count, bucket.up, bucket.down
        );
    }

    Ok(())
}
