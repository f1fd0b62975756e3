// src/services/table.rs
use std::cmp::Ordering;

use crate::models::GapRecord;

/// Column a table view can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Symbol,
    CompanyName,
    Sector,
    Date,
    GapType,
    GapSize,
    Price,
    Volume,
    AverageVolume,
    RelativeVolume,
    MarketCap,
}

impl SortKey {
    /// Parse a query-string value; both wire spellings are in use.
    pub fn parse(raw: &str) -> Option<SortKey> {
        match raw {
            "symbol" => Some(SortKey::Symbol),
            "companyName" | "company_name" => Some(SortKey::CompanyName),
            "sector" => Some(SortKey::Sector),
            "date" => Some(SortKey::Date),
            "gapType" | "gap_type" => Some(SortKey::GapType),
            "gapSize" | "gap_size" => Some(SortKey::GapSize),
            "price" => Some(SortKey::Price),
            "volume" => Some(SortKey::Volume),
            "averageVolume" | "average_volume" => Some(SortKey::AverageVolume),
            "relativeVolume" | "relative_volume" => Some(SortKey::RelativeVolume),
            "marketCap" | "market_cap" => Some(SortKey::MarketCap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Option<SortDirection> {
        match raw {
            "asc" => Some(SortDirection::Ascending),
            "desc" => Some(SortDirection::Descending),
            _ => None,
        }
    }

    pub fn flipped(self) -> SortDirection {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Active sort selection. Selecting the current key flips direction;
/// selecting a new key resets to ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableQuery {
    pub sort: SortKey,
    pub dir: SortDirection,
}

impl Default for TableQuery {
    fn default() -> Self {
        TableQuery {
            sort: SortKey::Date,
            dir: SortDirection::Ascending,
        }
    }
}

impl TableQuery {
    pub fn toggle(&mut self, key: SortKey) {
        if self.sort == key {
            self.dir = self.dir.flipped();
        } else {
            self.sort = key;
            self.dir = SortDirection::Ascending;
        }
    }
}

/// Absent values order below every present value, so ascending puts them
/// first and descending puts them last.
fn cmp_opt_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn cmp_str(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn cmp_opt_str(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp_str(x, y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn compare_by_key(a: &GapRecord, b: &GapRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::Symbol => cmp_str(&a.symbol, &b.symbol),
        SortKey::CompanyName => cmp_str(&a.company_name, &b.company_name),
        SortKey::Sector => cmp_opt_str(a.sector.as_deref(), b.sector.as_deref()),
        SortKey::Date => a.date.cmp(&b.date),
        SortKey::GapType => a.gap_type.cmp(&b.gap_type),
        SortKey::GapSize => a.gap_size.total_cmp(&b.gap_size),
        SortKey::Price => cmp_opt_f64(a.price, b.price),
        SortKey::Volume => cmp_opt_f64(a.volume, b.volume),
        SortKey::AverageVolume => cmp_opt_f64(a.average_volume, b.average_volume),
        SortKey::RelativeVolume => cmp_opt_f64(a.relative_volume, b.relative_volume),
        SortKey::MarketCap => cmp_opt_f64(a.market_cap, b.market_cap),
    }
}

fn matches_filter(record: &GapRecord, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    record.symbol.to_lowercase().contains(needle)
        || record.company_name.to_lowercase().contains(needle)
        || record
            .sector
            .as_deref()
            .map(|s| s.to_lowercase().contains(needle))
            .unwrap_or(false)
}

/// Derive the ordered, filtered table view. The filter is a case-insensitive
/// substring match over symbol, company name and sector; the sort is stable,
/// so records comparing equal keep their arrival order.
pub fn view(
    records: &[GapRecord],
    sort: SortKey,
    dir: SortDirection,
    filter_text: &str,
) -> Vec<GapRecord> {
    let needle = filter_text.to_lowercase();
    let mut rows: Vec<GapRecord> = records
        .iter()
        .filter(|r| matches_filter(r, &needle))
        .cloned()
        .collect();

    rows.sort_by(|a, b| {
        let ord = compare_by_key(a, b, sort);
        match dir {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
    rows
}
