//! Trending topic mining from payload tags and transcript words

use super::round_to;
use ava_common::config::AnalyticsConfig;
use ava_common::db::CallRecord;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

const TAG_KEYS: &[&str] = &["topics", "tags", "keywords"];
const TOKEN_PUNCTUATION: &[char] = &['.', ',', '!', '?', ':', ';', '(', ')', '[', ']', '{', '}', '"', '\''];
const MIN_WORD_CHARS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub label: String,
    pub count: usize,
    pub weight: f64,
    /// First call the topic was seen in
    pub call_id: String,
}

fn tag_label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

fn candidate_topics(call: &CallRecord) -> Vec<String> {
    let mut topics: Vec<String> = TAG_KEYS
        .iter()
        .filter_map(|key| call.meta.get(key).and_then(Value::as_array))
        .flatten()
        .filter_map(tag_label)
        .collect();

    if let Some(transcript) = &call.transcript {
        topics.extend(
            transcript
                .split_whitespace()
                .map(|token| token.trim_matches(TOKEN_PUNCTUATION).to_lowercase())
                .filter(|token| token.chars().count() >= MIN_WORD_CHARS),
        );
    }

    topics
}

/// Top `limit` topics by frequency. Ties keep first-seen order.
pub fn compute_trending_topics(calls: &[CallRecord], config: &AnalyticsConfig, limit: usize) -> Vec<Topic> {
    let stop_words: HashSet<String> = config.stop_words.iter().map(|w| w.to_lowercase()).collect();

    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, (usize, String)> = HashMap::new();

    for call in calls {
        for topic in candidate_topics(call) {
            let label = topic.to_lowercase();
            if label.is_empty() || stop_words.contains(&label) {
                continue;
            }
            counts
                .entry(label.clone())
                .and_modify(|(count, _)| *count += 1)
                .or_insert_with(|| {
                    order.push(label);
                    (1, call.id.clone())
                });
        }
    }

    let mut ranked: Vec<(String, usize, String)> = order
        .into_iter()
        .filter_map(|label| {
            let (count, call_id) = counts.remove(&label)?;
            Some((label, count, call_id))
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);

    let Some(max_count) = ranked.first().map(|(_, count, _)| *count) else {
        return Vec::new();
    };

    ranked
        .into_iter()
        .map(|(label, count, call_id)| Topic {
            label,
            count,
            weight: round_to(count as f64 / max_count as f64, 2),
            call_id,
        })
        .collect()
}
