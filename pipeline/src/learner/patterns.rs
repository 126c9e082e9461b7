//! Pattern extractors. Each one is a pure function over already loaded
//! rows so the learner can run them independently.

use chrono::{Datelike, Timelike};
use serde_json::{Value, json};
use stash_core::types::{ActionOutcome, Capture, NotificationRecord};
use std::collections::BTreeMap;

const TOP_TOPICS: usize = 10;
const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Computed pattern payload and its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct MinedPattern {
    pub data: Value,
    pub confidence: f32,
}

fn peak<K: Clone + Ord>(counts: &BTreeMap<K, usize>) -> Option<K> {
    // Ties go to the smallest key.
    counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(k, _)| k.clone())
}

fn hour_histogram(hours: impl Iterator<Item = u32>) -> BTreeMap<u32, usize> {
    let mut counts = BTreeMap::new();
    for hour in hours {
        *counts.entry(hour).or_insert(0) += 1;
    }
    counts
}

/// Hour-of-day and day-of-week histograms of when outcomes were recorded.
pub fn save_time(outcomes: &[ActionOutcome]) -> MinedPattern {
    let hours = hour_histogram(outcomes.iter().map(|o| o.recorded_at.hour()));
    let mut days: BTreeMap<usize, usize> = BTreeMap::new();
    for outcome in outcomes {
        let day = outcome.recorded_at.weekday().num_days_from_monday() as usize;
        *days.entry(day).or_insert(0) += 1;
    }

    let day_counts: BTreeMap<&str, usize> = days.iter().map(|(d, c)| (WEEKDAYS[*d], *c)).collect();
    MinedPattern {
        data: json!({
            "hourCounts": hours,
            "dayCounts": day_counts,
            "peakHour": peak(&hours),
            "peakDay": peak(&days).map(|d| WEEKDAYS[d]),
            "sampleSize": outcomes.len(),
        }),
        confidence: if hours.is_empty() { 0.3 } else { 0.7 },
    }
}

/// Frequencies of capture types and topics. `None` without captures.
pub fn content_preference(captures: &[Capture], high_confidence_samples: usize) -> Option<MinedPattern> {
    if captures.is_empty() {
        return None;
    }

    let mut types: BTreeMap<String, usize> = BTreeMap::new();
    let mut topics: BTreeMap<String, usize> = BTreeMap::new();
    for capture in captures {
        *types.entry(capture.capture_type.to_string()).or_insert(0) += 1;
        if let Some(analysis) = &capture.analysis {
            for topic in &analysis.topics {
                *topics.entry(topic.to_lowercase()).or_insert(0) += 1;
            }
        }
    }

    let mut top_topics: Vec<(String, usize)> = topics.into_iter().collect();
    top_topics.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_topics.truncate(TOP_TOPICS);
    let top_topics: Vec<Value> = top_topics
        .into_iter()
        .map(|(topic, count)| json!({ "topic": topic, "count": count }))
        .collect();

    Some(MinedPattern {
        data: json!({
            "typeCounts": types,
            "topTopics": top_topics,
            "sampleSize": captures.len(),
        }),
        confidence: if captures.len() >= high_confidence_samples {
            0.8
        } else {
            0.5
        },
    })
}

/// Histogram of the hour notifications were read. `None` below
/// `min_read_events` reads.
pub fn notification_timing(
    reads: &[NotificationRecord],
    min_read_events: usize,
    high_confidence_samples: usize,
) -> Option<MinedPattern> {
    let read_hours: Vec<u32> = reads.iter().filter_map(|r| r.read_at).map(|t| t.hour()).collect();
    if read_hours.len() < min_read_events {
        return None;
    }

    let hours = hour_histogram(read_hours.iter().copied());
    let mut ranked: Vec<(u32, usize)> = hours.iter().map(|(h, c)| (*h, *c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let peak_hours: Vec<u32> = ranked.iter().take(3).map(|(h, _)| *h).collect();

    Some(MinedPattern {
        data: json!({
            "readHourCounts": hours,
            "peakHours": peak_hours,
            "sampleSize": read_hours.len(),
        }),
        confidence: if read_hours.len() >= high_confidence_samples {
            0.8
        } else {
            0.5
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use stash_core::types::{ActionPlan, CaptureId, CaptureType, DeepAnalysis, OwnerId};

    fn owner() -> OwnerId {
        OwnerId::new("u1".to_string()).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        // 2026-06-01 is a Monday.
        Utc.with_ymd_and_hms(2026, 6, day, hour, 15, 0).unwrap()
    }

    fn outcome(recorded_at: DateTime<Utc>) -> ActionOutcome {
        let capture_id = CaptureId::generate();
        ActionOutcome::new(
            capture_id.clone(),
            owner(),
            ActionPlan {
                capture_id,
                actions: vec![],
                confidence: 0.8,
                reasoning: String::new(),
            },
            vec![],
        )
        .with_recorded_at(recorded_at)
    }

    #[test]
    fn test_save_time_histograms() {
        let outcomes = vec![
            outcome(at(1, 21)),
            outcome(at(1, 21)),
            outcome(at(2, 9)),
            outcome(at(8, 21)),
            outcome(at(3, 13)),
        ];
        let pattern = save_time(&outcomes);
        assert_eq!(pattern.confidence, 0.7);
        assert_eq!(pattern.data["peakHour"], 21);
        assert_eq!(pattern.data["peakDay"], "mon");
        assert_eq!(pattern.data["hourCounts"]["21"], 3);
        assert_eq!(pattern.data["sampleSize"], 5);
    }

    #[test]
    fn test_save_time_without_outcomes_is_low_confidence() {
        let pattern = save_time(&[]);
        assert_eq!(pattern.confidence, 0.3);
        assert!(pattern.data["peakHour"].is_null());
    }

    fn capture(capture_type: CaptureType, topics: &[&str]) -> Capture {
        let mut capture = Capture::new(owner(), capture_type, "x");
        capture.analysis = Some(DeepAnalysis::default().with_topics(topics.iter().copied()));
        capture
    }

    #[test]
    fn test_content_preference_counts() {
        let captures = vec![
            capture(CaptureType::Link, &["Rust", "async"]),
            capture(CaptureType::Link, &["rust"]),
            capture(CaptureType::Image, &["design"]),
        ];
        let pattern = content_preference(&captures, 20).unwrap();
        assert_eq!(pattern.confidence, 0.5);
        assert_eq!(pattern.data["typeCounts"]["link"], 2);
        assert_eq!(pattern.data["topTopics"][0]["topic"], "rust");
        assert_eq!(pattern.data["topTopics"][0]["count"], 2);

        assert!(content_preference(&[], 20).is_none());

        let many: Vec<Capture> = (0..20).map(|_| capture(CaptureType::Text, &[])).collect();
        assert_eq!(content_preference(&many, 20).unwrap().confidence, 0.8);
    }

    fn read_at(hour: u32) -> NotificationRecord {
        NotificationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner(),
            title: "t".to_string(),
            body: "b".to_string(),
            action_tag: None,
            sent_at: at(1, hour),
            read_at: Some(at(1, hour)),
        }
    }

    #[test]
    fn test_notification_timing_needs_enough_reads() {
        let reads: Vec<_> = [8, 8, 12, 20].into_iter().map(read_at).collect();
        assert!(notification_timing(&reads, 5, 20).is_none());

        let reads: Vec<_> = [8, 8, 12, 20, 8].into_iter().map(read_at).collect();
        let pattern = notification_timing(&reads, 5, 20).unwrap();
        assert_eq!(pattern.confidence, 0.5);
        assert_eq!(pattern.data["peakHours"][0], 8);
        assert_eq!(pattern.data["readHourCounts"]["8"], 3);
    }
}
