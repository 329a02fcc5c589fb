//! Headline metrics and the recent-calls projection

use super::{extract_sentiment, mean, nonzero_duration, round_to, Window};
use ava_common::config::AnalyticsConfig;
use ava_common::db::CallRecord;
use ava_common::status::is_active;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_calls: usize,
    pub active_now: usize,
    pub avg_duration_seconds: f64,
    pub satisfaction: f64,
    pub total_cost: f64,
    pub period: Period,
}

pub fn compute_overview_metrics(
    calls: &[CallRecord],
    window: Window,
    config: &AnalyticsConfig,
) -> Overview {
    let durations: Vec<f64> = calls
        .iter()
        .filter_map(nonzero_duration)
        .map(|d| d as f64)
        .collect();
    let sentiments: Vec<f64> = calls.iter().filter_map(extract_sentiment).collect();
    let total_cost: f64 = calls.iter().filter_map(|c| c.cost).sum();

    Overview {
        total_calls: calls.len(),
        active_now: calls.iter().filter(|c| is_active(&c.status)).count(),
        avg_duration_seconds: round_to(mean(&durations).unwrap_or(0.0), 1),
        satisfaction: round_to(mean(&sentiments).unwrap_or(config.default_satisfaction), 2),
        total_cost: round_to(total_cost, 2),
        period: Period {
            start: window.start,
            end: window.end,
        },
    }
}

/// Dashboard row for one call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentCall {
    pub id: String,
    pub assistant_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: String,
    pub duration_seconds: Option<i64>,
    pub cost: Option<f64>,
    pub customer_number: Option<String>,
    pub transcript: Option<String>,
    pub sentiment: Option<f64>,
}

impl From<&CallRecord> for RecentCall {
    fn from(call: &CallRecord) -> Self {
        Self {
            id: call.id.clone(),
            assistant_id: call.assistant_id.clone(),
            started_at: call.started_at,
            ended_at: call.ended_at,
            status: call.status.clone(),
            duration_seconds: call.duration_seconds,
            cost: call.cost,
            customer_number: call.customer_number.clone(),
            transcript: call.transcript.clone(),
            sentiment: extract_sentiment(call),
        }
    }
}

/// Project calls for the dashboard. Callers scrub expired transcripts first.
pub fn recent_calls(calls: &[CallRecord]) -> Vec<RecentCall> {
    calls.iter().map(RecentCall::from).collect()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use serde_json::json;

    fn window() -> Window {
        Window::new(at(1, 0), at(8, 0))
    }

    #[test]
    fn test_scenario_average() {
        let calls = vec![
            call("a", at(3, 9), Some(60), "completed"),
            call("b", at(3, 10), Some(120), "completed"),
            call("c", at(3, 11), Some(9000), "failed"),
        ];

        let overview = compute_overview_metrics(&calls, window(), &AnalyticsConfig::default());

        assert_eq!(overview.total_calls, 3);
        assert_eq!(overview.avg_duration_seconds, 3060.0);
        assert_eq!(overview.active_now, 0);
        assert_eq!(overview.satisfaction, 0.95);
        assert_eq!(overview.total_cost, 0.0);
    }

    #[test]
    fn test_zero_and_missing_durations_are_ignored() {
        let mut paid = call("a", at(3, 9), Some(0), "in-progress");
        paid.cost = Some(0.125);
        let calls = vec![
            paid,
            call("b", at(3, 10), None, "ringing"),
            with_meta(call("c", at(3, 11), Some(45), "queued"), json!({"sentimentScore": 0.5})),
            with_meta(call("d", at(3, 12), Some(46), "completed"), json!({"sentimentScore": 0.25})),
        ];

        let overview = compute_overview_metrics(&calls, window(), &AnalyticsConfig::default());

        assert_eq!(overview.avg_duration_seconds, 45.5);
        assert_eq!(overview.active_now, 3);
        assert_eq!(overview.satisfaction, 0.38);
        assert_eq!(overview.total_cost, 0.13);
    }

    #[test]
    fn test_empty_window() {
        let overview = compute_overview_metrics(&[], window(), &AnalyticsConfig::default());
        assert_eq!(overview.total_calls, 0);
        assert_eq!(overview.avg_duration_seconds, 0.0);
        assert_eq!(overview.satisfaction, 0.95);
        assert_eq!(overview.period.start, at(1, 0));
    }

    #[test]
    fn test_recent_projection_carries_sentiment() {
        let calls = vec![with_meta(
            call("a", at(3, 9), Some(60), "completed"),
            json!({"analytics": {"sentimentScore": 0.8}}),
        )];
        let recent = recent_calls(&calls);
        assert_eq!(recent[0].sentiment, Some(0.8));

        let value = serde_json::to_value(&recent[0]).unwrap();
        assert_eq!(value["assistantId"], json!("asst-1"));
        assert_eq!(value["durationSeconds"], json!(60));
    }
}
