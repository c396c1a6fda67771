use std::time::Instant;

use opentelemetry::{Key, KeyValue, Value, metrics::Histogram};

/// A timer that records elapsed time to a histogram.
///
/// Captures the current time on creation; `record()` computes the elapsed
/// duration and records it, with any pushed attributes, to the named
/// histogram metric.
pub struct Recorder {
    start: Instant,
    histogram: Histogram<f64>,
    attributes: Vec<KeyValue>,
}

impl Recorder {
    /// Creates a new recorder for the specified histogram metric.
    ///
    /// Timing starts immediately. The elapsed time is recorded in
    /// milliseconds when `record()` is called.
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            histogram: super::meter().f64_histogram(name).build(),
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute to be recorded with the metric.
    ///
    /// Attributes provide additional context for the metric and enable
    /// filtering and grouping in observability tools.
    pub fn push_attribute<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        self.attributes.push(KeyValue::new(key, value));
    }

    /// Records the elapsed time to the histogram.
    pub fn record(self) {
        let duration = self.start.elapsed().as_secs_f64() * 1000.0;
        self.histogram.record(duration, &self.attributes);
    }
}
