// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Metric identifiers, values and errors.

use std::fmt::{self, Display};
use std::time::Instant;

/// A structured identifier for a metric: a namespace and a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricId {
    /// The subsystem that owns the metric (e.g. "throttle").
    pub namespace: String,
    /// The metric name within the namespace (e.g. "requests_total").
    pub name: String,
}

impl MetricId {
    /// Creates a new `MetricId`.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// The fundamental type of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// Only ever increases.
    Counter,
    /// Goes up and down.
    Gauge,
    /// A distribution of samples over fixed buckets.
    Histogram,
}

/// The current value of a metric.
#[derive(Debug, Clone)]
pub enum MetricValue {
    /// Counter value.
    Counter(u64),
    /// Gauge value.
    Gauge(f64),
    /// Histogram state.
    Histogram {
        /// Every recorded sample.
        samples: Vec<f64>,
        /// Inclusive upper bounds of the buckets.
        bucket_bounds: Vec<f64>,
        /// Cumulative count of samples at or below each bound.
        bucket_counts: Vec<u64>,
    },
}

impl MetricValue {
    /// Returns the [`MetricType`] corresponding to this value.
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Counter(_) => MetricType::Counter,
            MetricValue::Gauge(_) => MetricType::Gauge,
            MetricValue::Histogram { .. } => MetricType::Histogram,
        }
    }

    /// Returns the value if this is a counter.
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            MetricValue::Counter(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value if this is a gauge.
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            MetricValue::Gauge(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the number of samples if this is a histogram.
    pub fn sample_count(&self) -> Option<usize> {
        match self {
            MetricValue::Histogram { samples, .. } => Some(samples.len()),
            _ => None,
        }
    }
}

/// A metric entry: its value plus descriptive metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric's identifier.
    pub id: MetricId,
    /// Human-readable description.
    pub description: String,
    /// Unit of measurement ("count", "ms", ...).
    pub unit: String,
    /// When the metric was last written.
    pub last_updated: Instant,
    /// The current value.
    pub value: MetricValue,
}

impl Metric {
    fn new(
        id: MetricId,
        description: impl Into<String>,
        unit: impl Into<String>,
        value: MetricValue,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            unit: unit.into(),
            last_updated: Instant::now(),
            value,
        }
    }

    /// Creates a counter starting at zero.
    pub fn new_counter(id: MetricId, description: impl Into<String>) -> Self {
        Self::new(id, description, "count", MetricValue::Counter(0))
    }

    /// Creates a gauge starting at zero.
    pub fn new_gauge(
        id: MetricId,
        description: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self::new(id, description, unit, MetricValue::Gauge(0.0))
    }

    /// Creates an empty histogram over `bucket_bounds`.
    pub fn new_histogram(
        id: MetricId,
        description: impl Into<String>,
        unit: impl Into<String>,
        bucket_bounds: Vec<f64>,
    ) -> Self {
        let bucket_counts = vec![0; bucket_bounds.len()];
        Self::new(
            id,
            description,
            unit,
            MetricValue::Histogram {
                samples: Vec::new(),
                bucket_bounds,
                bucket_counts,
            },
        )
    }

    /// The type of this metric.
    pub fn metric_type(&self) -> MetricType {
        self.value.metric_type()
    }

    /// Marks the metric as written now.
    pub fn touch(&mut self) {
        self.last_updated = Instant::now();
    }
}

/// A specialized `Result` type for metric operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// An error raised by the metrics system.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetricsError {
    /// The requested metric is not registered.
    #[error("Metric not found: {0}")]
    MetricNotFound(MetricId),
    /// The operation does not apply to the metric's type.
    #[error("Type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        /// The type the operation needs.
        expected: MetricType,
        /// The type that was found.
        found: MetricType,
    },
    /// The storage backend failed.
    #[error("Storage error: {0}")]
    StorageError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_as_namespace_and_name() {
        let id = MetricId::new("throttle", "loaded_total");
        assert_eq!(id.to_string(), "throttle:loaded_total");
        assert_ne!(id, MetricId::new("render", "loaded_total"));
    }

    #[test]
    fn constructors_pick_the_right_value() {
        let counter = Metric::new_counter(MetricId::new("t", "c"), "counter");
        assert_eq!(counter.metric_type(), MetricType::Counter);
        assert_eq!(counter.unit, "count");
        assert_eq!(counter.value.as_counter(), Some(0));

        let histogram =
            Metric::new_histogram(MetricId::new("t", "h"), "histogram", "ms", vec![1.0, 10.0]);
        assert_eq!(histogram.value.sample_count(), Some(0));
        assert_eq!(histogram.value.as_gauge(), None);
    }
}
