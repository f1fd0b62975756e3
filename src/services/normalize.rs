// src/services/normalize.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::models::{GapRecord, GapType};
use super::gaps::PipelineError;

/// Coerce a source date to calendar-date granularity. The endpoint's date
/// representation is not contractually fixed; both bare ISO dates and full
/// timestamps have been observed. Timestamps resolve to the UTC calendar day.
pub fn parse_gap_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    // Offset-less timestamps (e.g. Python isoformat) are taken as UTC
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}

/// Parse a full timestamp, tolerating a missing offset.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}

fn malformed(field: &'static str, reason: &str) -> PipelineError {
    PipelineError::MalformedRecord {
        field,
        reason: reason.to_string(),
    }
}

/// First value present under any of the given keys. The wire format mixes
/// snake_case and camelCase across deployments.
fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| obj.get(*name))
}

fn optional_number(obj: &Map<String, Value>, names: &[&str]) -> Option<f64> {
    field(obj, names).and_then(Value::as_f64)
}

/// Validate one raw element and produce a canonical record.
///
/// `symbol`, `date` and `gap_type` are required; everything else passes
/// through preserving optionality. Pure and order-preserving: the caller
/// applies this element-wise and decides what to do with failures.
pub fn normalize_record(raw: &Value) -> Result<GapRecord, PipelineError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| malformed("record", "is not an object"))?;

    let symbol = obj
        .get("symbol")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed("symbol", "is missing or empty"))?
        .to_string();

    let date_raw = obj
        .get("date")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("date", "is missing or not a string"))?;
    let date =
        parse_gap_date(date_raw).ok_or_else(|| malformed("date", "has an unrecognized format"))?;

    let gap_type = match field(obj, &["gap_type", "gapType"])
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("up") => GapType::Up,
        Some("down") => GapType::Down,
        Some(_) => return Err(malformed("gap_type", "is neither \"up\" nor \"down\"")),
        None => return Err(malformed("gap_type", "is missing or not a string")),
    };

    // Sign is carried by gap_type, never by the magnitude itself
    let gap_size = field(obj, &["gap_size", "gapSize"])
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .abs();

    Ok(GapRecord {
        symbol,
        company_name: field(obj, &["companyName", "company_name"])
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        sector: obj.get("sector").and_then(Value::as_str).map(str::to_owned),
        date,
        gap_type,
        gap_size,
        price: optional_number(obj, &["price"]),
        volume: optional_number(obj, &["volume"]),
        average_volume: optional_number(obj, &["averageVolume", "average_volume", "avg_volume"]),
        relative_volume: optional_number(obj, &["relativeVolume", "relative_volume"]),
        market_cap: optional_number(obj, &["marketCap", "market_cap"]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_timestamp_normalizes_to_calendar_date() {
        let record = normalize_record(&json!({
            "symbol": "AAPL",
            "date": "2024-01-05T14:30:00Z",
            "gap_type": "up",
            "gap_size": 2.3
        }))
        .unwrap();

        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert_eq!(record.gap_type, GapType::Up);
        assert_eq!(record.gap_size, 2.3);
    }

    #[test]
    fn bare_date_passes_through() {
        let record = normalize_record(&json!({
            "symbol": "MSFT",
            "date": "2024-02-29",
            "gap_type": "down"
        }))
        .unwrap();
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn timestamp_offset_resolves_to_utc_day() {
        // 22:00 in UTC-5 is already the next day in UTC
        assert_eq!(
            parse_gap_date("2024-01-05T22:00:00-05:00"),
            NaiveDate::from_ymd_opt(2024, 1, 6)
        );
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let no_symbol = json!({"date": "2024-01-05", "gap_type": "up"});
        assert!(matches!(
            normalize_record(&no_symbol),
            Err(PipelineError::MalformedRecord { field: "symbol", .. })
        ));

        let empty_symbol = json!({"symbol": "  ", "date": "2024-01-05", "gap_type": "up"});
        assert!(matches!(
            normalize_record(&empty_symbol),
            Err(PipelineError::MalformedRecord { field: "symbol", .. })
        ));

        let no_date = json!({"symbol": "AAPL", "gap_type": "up"});
        assert!(matches!(
            normalize_record(&no_date),
            Err(PipelineError::MalformedRecord { field: "date", .. })
        ));

        let bad_type = json!({"symbol": "AAPL", "date": "2024-01-05", "gap_type": "sideways"});
        assert!(matches!(
            normalize_record(&bad_type),
            Err(PipelineError::MalformedRecord { field: "gap_type", .. })
        ));
    }

    #[test]
    fn camel_case_wire_names_are_accepted() {
        let record = normalize_record(&json!({
            "symbol": "NVDA",
            "companyName": "NVIDIA",
            "date": "2024-01-05",
            "gapType": "up",
            "gapSize": 4.1,
            "relativeVolume": 2.5,
            "marketCap": 1.2e12
        }))
        .unwrap();

        assert_eq!(record.company_name, "NVIDIA");
        assert_eq!(record.gap_size, 4.1);
        assert_eq!(record.relative_volume, Some(2.5));
        assert_eq!(record.market_cap, Some(1.2e12));
    }

    #[test]
    fn optional_numerics_stay_absent() {
        let record = normalize_record(&json!({
            "symbol": "AMD",
            "date": "2024-01-05",
            "gap_type": "down"
        }))
        .unwrap();

        assert_eq!(record.gap_size, 0.0);
        assert!(record.price.is_none());
        assert!(record.volume.is_none());
        assert!(record.market_cap.is_none());
        assert!(record.sector.is_none());
    }

    #[test]
    fn negative_gap_size_becomes_magnitude() {
        let record = normalize_record(&json!({
            "symbol": "TSLA",
            "date": "2024-01-05",
            "gap_type": "down",
            "gap_size": -1.7
        }))
        .unwrap();
        assert_eq!(record.gap_size, 1.7);
    }

    #[test]
    fn normalize_is_idempotent_over_its_own_output() {
        let first = normalize_record(&json!({
            "symbol": "AAPL",
            "companyName": "Apple Inc.",
            "sector": "Information Technology",
            "date": "2024-01-05T14:30:00Z",
            "gap_type": "up",
            "gap_size": 2.3,
            "price": 185.6,
            "volume": 51_000_000.0
        }))
        .unwrap();

        let reserialized = serde_json::to_value(&first).unwrap();
        let second = normalize_record(&reserialized).unwrap();
        assert_eq!(first, second);
    }
}
