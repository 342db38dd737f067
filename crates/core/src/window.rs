//! Bounded, time-ordered sample history for one metric of one vehicle.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::metric_names::Metric;
use crate::types::Timestamp;

/// Default number of samples retained per window.
pub const DEFAULT_WINDOW_CAPACITY: usize = 128;

/// A single timestamped reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl MetricSample {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// FIFO-bounded history of samples, strictly increasing in timestamp.
#[derive(Debug, Clone)]
pub struct MetricWindow {
    metric: Metric,
    capacity: usize,
    samples: VecDeque<MetricSample>,
}

impl MetricWindow {
    /// Create an empty window. A capacity of zero is bumped to one.
    pub fn new(metric: Metric, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            metric,
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&MetricSample> {
        self.samples.back()
    }

    /// Append a sample, evicting the oldest when full.
    ///
    /// Rejects samples whose timestamp is not strictly after the newest one;
    /// the window is left untouched in that case.
    pub fn append(&mut self, sample: MetricSample) -> Result<(), CoreError> {
        if let Some(last) = self.samples.back() {
            if sample.timestamp <= last.timestamp {
                return Err(CoreError::OutOfOrderSample {
                    metric: self.metric.to_string(),
                    timestamp: sample.timestamp,
                    last: last.timestamp,
                });
            }
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        Ok(())
    }

    /// Owned copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        self.samples.iter().copied().collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn timestamps(&self) -> Vec<Timestamp> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
