//! Where every line of program and engine output goes.
//!
//! Text blocks arrive tagged with a [`Channel`], get split into lines, and
//! each non-blank line is shown, remembered in scrollback and (while a run has
//! a callback attached) scanned for metrics.

use crate::metrics::{MetricCallback, MetricExtractor};
use crate::scrollback::{Scrollback, ScrollbackLine};
use crate::style::{paint, Tone};
use crate::term::TerminalSurface;

use runbox_script::{Channel, OutputSink};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct OutputPipeline {
    surface: Arc<dyn TerminalSurface>,
    scrollback: Mutex<Scrollback>,
    metrics: Mutex<Option<MetricCallback>>,
    extractor: MetricExtractor,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Detaches the metrics callback when dropped.
pub struct MetricsAttachment<'a> {
    pipeline: &'a OutputPipeline,
}

impl Drop for MetricsAttachment<'_> {
    fn drop(&mut self) {
        *lock(&self.pipeline.metrics) = None;
    }
}

impl OutputPipeline {
    pub fn new(surface: Arc<dyn TerminalSurface>, scrollback_capacity: usize) -> Self {
        Self {
            surface,
            scrollback: Mutex::new(Scrollback::new(scrollback_capacity)),
            metrics: Mutex::new(None),
            extractor: MetricExtractor::new(),
        }
    }

    pub fn surface(&self) -> &Arc<dyn TerminalSurface> {
        &self.surface
    }

    /// Route metric events to `callback` until the returned guard drops.
    /// `None` attaches nothing, and lines are not scanned.
    pub fn attach_metrics(&self, callback: Option<MetricCallback>) -> MetricsAttachment<'_> {
        *lock(&self.metrics) = callback;
        MetricsAttachment { pipeline: self }
    }

    pub fn has_metrics(&self) -> bool {
        lock(&self.metrics).is_some()
    }

    /// An engine message, in the given tone.
    pub fn system(&self, tone: Tone, text: &str) {
        for line in split_lines(text) {
            self.line(Channel::System, tone, line);
        }
    }

    /// Empty line on the display. Never reaches scrollback.
    pub fn blank(&self) {
        self.surface.write_line("");
    }

    pub fn scrollback(&self) -> Vec<ScrollbackLine> {
        lock(&self.scrollback).snapshot()
    }

    pub fn scrollback_len(&self) -> usize {
        lock(&self.scrollback).len()
    }

    pub fn clear_scrollback(&self) {
        lock(&self.scrollback).clear();
    }

    fn line(&self, channel: Channel, tone: Tone, text: &str) {
        self.surface.write_line(&paint(tone, text));
        if text.trim().is_empty() {
            return;
        }

        lock(&self.scrollback).push(ScrollbackLine::new(text, channel));

        if channel == Channel::System {
            return;
        }
        // Clone out so the callback runs without the lock held.
        let callback = lock(&self.metrics).clone();
        if let Some(callback) = callback {
            for event in self.extractor.extract(text) {
                tracing::trace!(kind = %event.kind, value = event.value, "metric");
                callback(event);
            }
        }
    }
}

impl OutputSink for OutputPipeline {
    fn emit(&self, channel: Channel, text: &str) {
        let tone = match channel {
            Channel::Stdout => Tone::Plain,
            Channel::Stderr => Tone::Error,
            Channel::System => Tone::Warning,
        };
        for line in split_lines(text) {
            self.line(channel, tone, line);
        }
    }
}

/// Lines of a block. One trailing newline does not produce an empty last line.
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l))
}
