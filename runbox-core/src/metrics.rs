//! Training metrics scraped from program output.
//!
//! Each output line is matched against a fixed, ordered set of labels. Every
//! label that matches yields its own event; a malformed number only loses
//! that one label.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// Labels scanned for, in order.
pub const METRIC_LABELS: [&str; 5] = ["loss", "accuracy", "epoch", "val_loss", "f1"];

/// Values kept per kind by [`MetricSeries`].
pub const SERIES_WINDOW: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub kind: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl MetricEvent {
    /// One JSON object, no trailing newline.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Receives metric events while a run is active.
pub type MetricCallback = Arc<dyn Fn(MetricEvent) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct MetricExtractor {
    patterns: Vec<(&'static str, Regex)>,
}

impl Default for MetricExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricExtractor {
    pub fn new() -> Self {
        let patterns = METRIC_LABELS
            .iter()
            .map(|label| {
                // `\b` keeps `loss` from matching inside `val_loss`.
                let pattern = format!(
                    r"(?i)\b{}[\s:=]*([-+]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?)",
                    regex::escape(label)
                );
                let re = Regex::new(&pattern).expect("metric pattern is a valid regex");
                (*label, re)
            })
            .collect();
        Self { patterns }
    }

    pub fn extract(&self, line: &str) -> Vec<MetricEvent> {
        self.extract_at(line, Utc::now())
    }

    pub fn extract_at(&self, line: &str, timestamp: DateTime<Utc>) -> Vec<MetricEvent> {
        let mut events = Vec::new();
        for (label, re) in &self.patterns {
            let Some(raw) = re.captures(line).and_then(|c| c.get(1)) else {
                continue;
            };
            match raw.as_str().parse::<f64>() {
                Ok(value) if value.is_finite() => events.push(MetricEvent {
                    kind: label.to_string(),
                    value,
                    timestamp,
                }),
                _ => tracing::debug!(kind = %label, raw = raw.as_str(), "unparseable metric value"),
            }
        }
        events
    }
}

/// Rolling window of recent values per metric kind, for charting.
#[derive(Debug, Clone, Default)]
pub struct MetricSeries {
    series: BTreeMap<String, VecDeque<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSummary {
    pub kind: String,
    pub count: usize,
    pub latest: f64,
    pub min: f64,
    pub max: f64,
}

impl MetricSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: &MetricEvent) {
        let values = self.series.entry(event.kind.clone()).or_default();
        if values.len() == SERIES_WINDOW {
            values.pop_front();
        }
        values.push_back(event.value);
    }

    pub fn values(&self, kind: &str) -> Vec<f64> {
        self.series
            .get(kind)
            .map(|v| v.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn latest(&self, kind: &str) -> Option<f64> {
        self.series.get(kind).and_then(|v| v.back().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }

    /// One summary per kind, sorted by kind.
    pub fn summary(&self) -> Vec<MetricSummary> {
        self.series
            .iter()
            .filter_map(|(kind, values)| {
                let latest = *values.back()?;
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Some(MetricSummary {
                    kind: kind.clone(),
                    count: values.len(),
                    latest,
                    min,
                    max,
                })
            })
            .collect()
    }
}
