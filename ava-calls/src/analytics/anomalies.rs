//! Outlier and failure flags
//!
//! The long-call threshold for a call is computed from the durations of the
//! *other* calls in the window, `max(mean + k·σ, floor)` with the population
//! standard deviation. Including the call itself would let one extreme
//! outlier inflate σ enough to hide itself.
//!
//! This is stricter than the whole-window formula for tight clusters. With
//! durations 1000/1000/1100 the 1100 s call is measured against 1000/1000
//! and flagged, while whole-window stats would put the bar near 1128 s.

use super::{extract_sentiment, nonzero_duration, round_to};
use ava_common::config::AnalyticsConfig;
use ava_common::db::CallRecord;
use ava_common::status::{self, FAILURE_ANOMALY};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    LongDuration,
    CallFailed,
    NegativeSentiment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub call_id: String,
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub occurred_at: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
    pub assistant_id: String,
}

/// Exact running sums over the window's durations
struct DurationStats {
    count: i128,
    sum: i128,
    sum_sq: i128,
}

impl DurationStats {
    fn collect(calls: &[CallRecord]) -> Self {
        let mut stats = Self {
            count: 0,
            sum: 0,
            sum_sq: 0,
        };
        for d in calls.iter().filter_map(nonzero_duration) {
            let d = i128::from(d);
            stats.count += 1;
            stats.sum += d;
            stats.sum_sq += d * d;
        }
        stats
    }

    /// Threshold for a call of `duration`, computed without it
    fn threshold_excluding(&self, duration: i64, config: &AnalyticsConfig) -> f64 {
        let d = i128::from(duration);
        let n = self.count - 1;
        if n <= 0 {
            return config.long_call_floor_secs;
        }

        let sum = self.sum - d;
        let sum_sq = self.sum_sq - d * d;
        let mean = sum as f64 / n as f64;
        let variance = (n * sum_sq - sum * sum).max(0) as f64 / (n * n) as f64;

        (mean + config.sigma_multiplier * variance.sqrt()).max(config.long_call_floor_secs)
    }
}

/// Flag unusual calls, newest first, at most `limit`
pub fn detect_anomalies(calls: &[CallRecord], config: &AnalyticsConfig, limit: usize) -> Vec<Anomaly> {
    let stats = DurationStats::collect(calls);
    let mut anomalies = Vec::new();

    for call in calls {
        let flag = |kind, severity, message: String| Anomaly {
            call_id: call.id.clone(),
            kind,
            occurred_at: call.started_at,
            severity,
            message,
            assistant_id: call.assistant_id.clone(),
        };

        if let Some(duration) = nonzero_duration(call) {
            let threshold = stats.threshold_excluding(duration, config);
            let seconds = duration as f64;
            if seconds >= threshold {
                let severity = if seconds >= threshold * config.critical_multiplier {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                anomalies.push(flag(
                    AnomalyKind::LongDuration,
                    severity,
                    format!("Unusually long call ({} min)", round_to(seconds / 60.0, 2)),
                ));
            }
        }

        let call_status = call.status.to_ascii_lowercase();
        if FAILURE_ANOMALY.contains(&call_status.as_str()) {
            let severity = if call_status == status::ERROR {
                Severity::Critical
            } else {
                Severity::Warning
            };
            anomalies.push(flag(
                AnomalyKind::CallFailed,
                severity,
                format!("Unfavorable call status: {}", call.status),
            ));
        }

        if let Some(sentiment) = extract_sentiment(call) {
            if sentiment < config.negative_sentiment_threshold {
                anomalies.push(flag(
                    AnomalyKind::NegativeSentiment,
                    Severity::Warning,
                    "Strongly negative sentiment".to_string(),
                ));
            }
        }
    }

    anomalies.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    anomalies.truncate(limit);
    anomalies
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use serde_json::json;

    fn config() -> AnalyticsConfig {
        AnalyticsConfig::default()
    }

    fn kinds(anomalies: &[Anomaly]) -> Vec<(&str, AnomalyKind, Severity)> {
        anomalies
            .iter()
            .map(|a| (a.call_id.as_str(), a.kind, a.severity))
            .collect()
    }

    #[test]
    fn test_scenario_long_and_failed() {
        let calls = vec![
            call("a", at(3, 9), Some(60), "completed"),
            call("b", at(3, 10), Some(120), "completed"),
            call("c", at(3, 11), Some(9000), "failed"),
        ];

        let anomalies = detect_anomalies(&calls, &config(), 20);

        assert_eq!(
            kinds(&anomalies),
            vec![
                ("c", AnomalyKind::LongDuration, Severity::Critical),
                ("c", AnomalyKind::CallFailed, Severity::Warning),
            ]
        );
        assert_eq!(anomalies[0].message, "Unusually long call (150 min)");
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        // Other calls: mean 1200, sigma 200, so the threshold is exactly 1600
        let mut calls = vec![
            call("a", at(3, 1), Some(1000), "completed"),
            call("b", at(3, 2), Some(1000), "completed"),
            call("c", at(3, 3), Some(1400), "completed"),
            call("d", at(3, 4), Some(1400), "completed"),
            call("edge", at(3, 5), Some(1600), "completed"),
        ];

        let anomalies = detect_anomalies(&calls, &config(), 20);
        assert_eq!(kinds(&anomalies), vec![("edge", AnomalyKind::LongDuration, Severity::Warning)]);

        calls[4].duration_seconds = Some(1599);
        assert!(detect_anomalies(&calls, &config(), 20).is_empty());
    }

    #[test]
    fn test_threshold_excludes_the_call_itself() {
        let calls = vec![
            call("a", at(3, 1), Some(1000), "completed"),
            call("b", at(3, 2), Some(1000), "completed"),
            call("c", at(3, 3), Some(1100), "completed"),
        ];

        let anomalies = detect_anomalies(&calls, &config(), 20);
        let flagged: Vec<&str> = anomalies.iter().map(|a| a.call_id.as_str()).collect();
        assert_eq!(flagged, vec!["c"]);
        assert_eq!(anomalies[0].kind, AnomalyKind::LongDuration);
    }

    #[test]
    fn test_floor_applies_to_short_windows() {
        let at_floor = vec![call("a", at(3, 1), Some(900), "completed")];
        assert_eq!(detect_anomalies(&at_floor, &config(), 20).len(), 1);

        let below = vec![call("a", at(3, 1), Some(899), "completed")];
        assert!(detect_anomalies(&below, &config(), 20).is_empty());
    }

    #[test]
    fn test_failure_and_sentiment_flags() {
        let calls = vec![
            call("err", at(3, 1), None, "error"),
            call("busy", at(3, 2), None, "busy"),
            call("na", at(3, 3), None, "no-answer"),
            with_meta(call("sad", at(3, 4), None, "completed"), json!({"sentimentScore": 0.1})),
            with_meta(call("ok", at(3, 5), None, "completed"), json!({"sentimentScore": 0.2})),
        ];

        let anomalies = detect_anomalies(&calls, &config(), 20);

        assert_eq!(
            kinds(&anomalies),
            vec![
                ("sad", AnomalyKind::NegativeSentiment, Severity::Warning),
                ("na", AnomalyKind::CallFailed, Severity::Warning),
                ("err", AnomalyKind::CallFailed, Severity::Critical),
            ]
        );
    }

    #[test]
    fn test_limit_keeps_newest() {
        let calls: Vec<_> = (1..=5)
            .map(|h| call(&format!("c{h}"), at(3, h), None, "failed"))
            .collect();

        let anomalies = detect_anomalies(&calls, &config(), 2);

        let ids: Vec<_> = anomalies.iter().map(|a| a.call_id.as_str()).collect();
        assert_eq!(ids, vec!["c5", "c4"]);
    }

    #[test]
    fn test_serialized_shape() {
        let calls = vec![call("x", at(3, 1), None, "error")];
        let value = serde_json::to_value(&detect_anomalies(&calls, &config(), 20)[0]).unwrap();
        assert_eq!(value["type"], json!("call_failed"));
        assert_eq!(value["severity"], json!("critical"));
        assert_eq!(value["callId"], json!("x"));
    }
}
