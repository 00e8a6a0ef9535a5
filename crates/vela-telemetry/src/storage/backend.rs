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

use vela_core::telemetry::{Metric, MetricId, MetricType, MetricValue, MetricsError, MetricsResult};
use std::fmt::Debug;

/// Storage interface for metrics.
///
/// Updates go through [`modify`](MetricsBackend::modify), which applies a
/// closure to the stored value under the backend's own synchronisation, so
/// concurrent increments from several decode threads are never lost.
pub trait MetricsBackend: Send + Sync + Debug + 'static {
    /// Store or replace a metric.
    fn put_metric(&self, metric: Metric) -> MetricsResult<()>;

    /// Retrieve a snapshot of a metric.
    fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric>;

    /// Apply `update` to the stored value of `id` atomically.
    fn modify(&self, id: &MetricId, update: &mut dyn FnMut(&mut MetricValue)) -> MetricsResult<()>;

    /// Snapshot of every stored metric.
    fn list_all_metrics(&self) -> Vec<Metric>;

    /// Number of stored metrics.
    fn metric_count(&self) -> usize;

    /// Increment a counter by `delta`, returning the new value.
    fn increment_counter(&self, id: &MetricId, delta: u64) -> MetricsResult<u64> {
        let mut outcome = Err(MetricType::Counter);
        self.modify(id, &mut |value| {
            outcome = match value {
                MetricValue::Counter(v) => {
                    *v = v.saturating_add(delta);
                    Ok(*v)
                }
                other => Err(other.metric_type()),
            };
        })?;
        outcome.map_err(|found| MetricsError::TypeMismatch {
            expected: MetricType::Counter,
            found,
        })
    }

    /// Set a gauge.
    fn set_gauge(&self, id: &MetricId, new_value: f64) -> MetricsResult<()> {
        let mut outcome = Err(MetricType::Gauge);
        self.modify(id, &mut |value| {
            outcome = match value {
                MetricValue::Gauge(v) => {
                    *v = new_value;
                    Ok(())
                }
                other => Err(other.metric_type()),
            };
        })?;
        outcome.map_err(|found| MetricsError::TypeMismatch {
            expected: MetricType::Gauge,
            found,
        })
    }

    /// Record one histogram sample.
    fn record_histogram_sample(&self, id: &MetricId, sample: f64) -> MetricsResult<()> {
        let mut outcome = Err(MetricType::Histogram);
        self.modify(id, &mut |value| {
            outcome = match value {
                MetricValue::Histogram {
                    samples,
                    bucket_bounds,
                    bucket_counts,
                } => {
                    samples.push(sample);
                    for (count, bound) in bucket_counts.iter_mut().zip(bucket_bounds.iter()) {
                        if sample <= *bound {
                            *count += 1;
                        }
                    }
                    Ok(())
                }
                other => Err(other.metric_type()),
            };
        })?;
        outcome.map_err(|found| MetricsError::TypeMismatch {
            expected: MetricType::Histogram,
            found,
        })
    }
}
