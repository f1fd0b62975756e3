// src/services/chart.rs
use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{ChartBucket, GapRecord, GapType};

/// Group records into per-day buckets, ascending by date. Grouping is by
/// exact (post-normalization) date equality, so the result is independent of
/// input order. Empty input yields an empty sequence.
pub fn aggregate(records: &[GapRecord]) -> Vec<ChartBucket> {
    let mut buckets: BTreeMap<NaiveDate, (u32, u32)> = BTreeMap::new();

    for record in records {
        let entry = buckets.entry(record.date).or_insert((0, 0));
        match record.gap_type {
            GapType::Up => entry.0 += 1,
            GapType::Down => entry.1 += 1,
        }
    }

    buckets
        .into_iter()
        .map(|(date, (up, down))| ChartBucket {
            date,
            count: up + down,
            up,
            down,
        })
        .collect()
}
