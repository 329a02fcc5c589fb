//! Dashboard analytics
//!
//! Pure reducers over a tenant's calls in a time window. Nothing is cached;
//! callers load the window with `get_calls_in_range` and pass the rows in.

pub mod anomalies;
pub mod overview;
pub mod series;
pub mod topics;

pub use anomalies::{detect_anomalies, Anomaly, AnomalyKind, Severity};
pub use overview::{compute_overview_metrics, recent_calls, Overview, Period, RecentCall};
pub use series::{compute_activity_heatmap, compute_time_series, HeatmapCell, TimeSeriesPoint};
pub use topics::{compute_trending_topics, Topic};

use ava_common::coerce::coerce_f64;
use ava_common::db::CallRecord;
use chrono::{DateTime, Duration, Utc};

pub const OVERVIEW_LOOKBACK_DAYS: i64 = 7;
pub const DEFAULT_LOOKBACK_DAYS: i64 = 14;
pub const TOPIC_LIMIT: usize = 12;
pub const OVERVIEW_TOPIC_LIMIT: usize = 6;
pub const ANOMALY_LIMIT: usize = 20;
pub const RECENT_LIMIT: i64 = 20;

/// Closed time interval an analytics query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `days` days ending at `now`
    pub fn lookback(now: DateTime<Utc>, days: i64) -> Self {
        Self::new(now - Duration::days(days), now)
    }
}

/// Sentiment score of a call, if the payload carries one.
///
/// Looks at `analytics.sentimentScore`, `analytics.customerSatisfaction`,
/// then `sentimentScore`; the first non-null value decides.
pub fn extract_sentiment(call: &CallRecord) -> Option<f64> {
    let candidates = [
        call.meta.get_path(&["analytics", "sentimentScore"]),
        call.meta.get_path(&["analytics", "customerSatisfaction"]),
        call.meta.get("sentimentScore"),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|v| !v.is_null())
        .and_then(coerce_f64)
}

/// Duration used for averages and outlier detection; zero counts as unknown
pub(crate) fn nonzero_duration(call: &CallRecord) -> Option<i64> {
    call.duration_seconds.filter(|d| *d != 0)
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sentiment_lookup_order() {
        let base = call("c", at(1, 10), None, "completed");

        let nested = with_meta(
            base.clone(),
            json!({"analytics": {"sentimentScore": 0.4, "customerSatisfaction": 0.9}, "sentimentScore": 0.1}),
        );
        assert_eq!(extract_sentiment(&nested), Some(0.4));

        let zero_wins = with_meta(base.clone(), json!({"analytics": {"sentimentScore": 0}, "sentimentScore": 0.8}));
        assert_eq!(extract_sentiment(&zero_wins), Some(0.0));

        let satisfaction = with_meta(base.clone(), json!({"analytics": {"customerSatisfaction": "0.7"}}));
        assert_eq!(extract_sentiment(&satisfaction), Some(0.7));

        let top_level = with_meta(base.clone(), json!({"analytics": {"sentimentScore": null}, "sentimentScore": 0.3}));
        assert_eq!(extract_sentiment(&top_level), Some(0.3));

        let garbage = with_meta(base.clone(), json!({"sentimentScore": "great"}));
        assert_eq!(extract_sentiment(&garbage), None);

        assert_eq!(extract_sentiment(&base), None);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(3060.0, 1), 3060.0);
        assert_eq!(round_to(0.12345, 3), 0.123);
        assert_eq!(round_to(2.5 / 60.0, 2), 0.04);
    }
}
