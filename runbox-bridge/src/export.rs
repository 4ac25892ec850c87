//! Where metric events go outside the session: a rolling series for the
//! end-of-run summary and, optionally, a JSON-lines file.

use anyhow::{Context, Result};
use runbox_core::{MetricCallback, MetricEvent, MetricSeries};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub struct MetricsRecorder {
    series: Mutex<MetricSeries>,
    sink: Option<Mutex<BufWriter<File>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MetricsRecorder {
    /// `jsonl`, when given, is opened for appending.
    pub fn new(jsonl: Option<&Path>) -> Result<Arc<Self>> {
        let sink = match jsonl {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("cannot open metrics file {}", path.display()))?;
                Some(Mutex::new(BufWriter::new(file)))
            }
            None => None,
        };
        Ok(Arc::new(Self {
            series: Mutex::new(MetricSeries::new()),
            sink,
        }))
    }

    pub fn callback(self: &Arc<Self>) -> MetricCallback {
        let recorder = Arc::clone(self);
        Arc::new(move |event: MetricEvent| recorder.record(&event))
    }

    pub fn record(&self, event: &MetricEvent) {
        lock(&self.series).push(event);

        let Some(sink) = &self.sink else {
            return;
        };
        let written = event
            .to_json()
            .map_err(std::io::Error::from)
            .and_then(|line| writeln!(lock(sink), "{}", line));
        if let Err(e) = written {
            tracing::warn!(kind = %event.kind, error = %e, "failed to export metric");
        }
    }

    pub fn flush(&self) -> Result<()> {
        if let Some(sink) = &self.sink {
            lock(sink).flush().context("cannot flush metrics file")?;
        }
        Ok(())
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let series = lock(&self.series);
        if series.is_empty() {
            return vec!["No metrics reported.".to_string()];
        }
        let mut lines = vec!["📈 Metrics:".to_string()];
        for s in series.summary() {
            lines.push(format!(
                "  {:<10} last {:<10} min {:<10} max {:<10} ({} points)",
                s.kind, s.latest, s.min, s.max, s.count
            ));
        }
        lines
    }
}
