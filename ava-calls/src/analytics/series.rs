//! Day-bucketed series and the weekday/hour heatmap (all UTC)

use super::{extract_sentiment, mean, round_to, Window};
use ava_common::db::CallRecord;
use ava_common::status::FAILURE_RATE;
use chrono::{Datelike, NaiveDate, Timelike};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const SECONDS_IN_MINUTE: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub total_calls: usize,
    /// Minutes
    pub avg_duration: f64,
    pub failed_rate: f64,
    pub avg_sentiment: Option<f64>,
}

#[derive(Default)]
struct DayBucket {
    calls: usize,
    duration_seconds: i64,
    failed: usize,
    sentiments: Vec<f64>,
}

/// One point per UTC day from `window.start` to `window.end` inclusive.
/// Days without calls are present with zero counts.
pub fn compute_time_series(calls: &[CallRecord], window: Window) -> Vec<TimeSeriesPoint> {
    let mut buckets: HashMap<NaiveDate, DayBucket> = HashMap::new();

    for call in calls {
        let bucket = buckets.entry(call.started_at.date_naive()).or_default();
        bucket.calls += 1;
        bucket.duration_seconds += call.duration_seconds.unwrap_or(0);
        if FAILURE_RATE.contains(&call.status.to_ascii_lowercase().as_str()) {
            bucket.failed += 1;
        }
        if let Some(sentiment) = extract_sentiment(call) {
            bucket.sentiments.push(sentiment);
        }
    }

    let last = window.end.date_naive();
    window
        .start
        .date_naive()
        .iter_days()
        .take_while(|day| *day <= last)
        .map(|date| match buckets.get(&date) {
            Some(bucket) if bucket.calls > 0 => {
                let total = bucket.calls as f64;
                TimeSeriesPoint {
                    date,
                    total_calls: bucket.calls,
                    avg_duration: round_to(bucket.duration_seconds as f64 / total / SECONDS_IN_MINUTE, 2),
                    failed_rate: round_to(bucket.failed as f64 / total, 3),
                    avg_sentiment: mean(&bucket.sentiments).map(|s| round_to(s, 3)),
                }
            }
            _ => TimeSeriesPoint {
                date,
                total_calls: 0,
                avg_duration: 0.0,
                failed_rate: 0.0,
                avg_sentiment: None,
            },
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    /// ISO weekday, Monday = 1
    pub weekday: u32,
    pub hour: u32,
    pub count: usize,
    pub intensity: f64,
}

/// Non-empty (weekday, hour) cells, ordered by weekday then hour
pub fn compute_activity_heatmap(calls: &[CallRecord]) -> Vec<HeatmapCell> {
    let mut cells: BTreeMap<(u32, u32), usize> = BTreeMap::new();
    for call in calls {
        let weekday = call.started_at.weekday().number_from_monday();
        *cells.entry((weekday, call.started_at.hour())).or_default() += 1;
    }

    let Some(max) = cells.values().copied().max() else {
        return Vec::new();
    };

    cells
        .into_iter()
        .map(|((weekday, hour), count)| HeatmapCell {
            weekday,
            hour,
            count,
            intensity: round_to(count as f64 / max as f64, 2),
        })
        .collect()
}
