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

use vela_core::telemetry::MetricsResult;
use vela_telemetry::{CounterHandle, GaugeHandle, HistogramHandle, MetricsRegistry};

const NAMESPACE: &str = "throttle";

/// Metric handles updated by the throttler.
pub(crate) struct ThrottleMetrics {
    /// Load calls accepted.
    pub(crate) requests_total: CounterHandle,
    /// Load calls that joined an existing request.
    pub(crate) deduplicated_total: CounterHandle,
    /// Load calls served from the resource cache.
    pub(crate) cache_hits_total: CounterHandle,
    /// Registrations dropped because the caller lost interest.
    pub(crate) cancelled_total: CounterHandle,
    /// Resources delivered to callbacks.
    pub(crate) loaded_total: CounterHandle,
    /// Failures delivered to callbacks.
    pub(crate) failed_total: CounterHandle,
    /// Live pending requests.
    pub(crate) pending_requests: GaugeHandle,
    /// Time spent in background decoders.
    pub(crate) decode_time: HistogramHandle,
}

impl ThrottleMetrics {
    pub(crate) fn new(registry: &MetricsRegistry) -> MetricsResult<Self> {
        Ok(Self {
            requests_total: registry.register_counter(
                NAMESPACE,
                "requests_total",
                "Load requests accepted",
            )?,
            deduplicated_total: registry.register_counter(
                NAMESPACE,
                "deduplicated_total",
                "Load requests merged into an in-flight load",
            )?,
            cache_hits_total: registry.register_counter(
                NAMESPACE,
                "cache_hits_total",
                "Load requests served from the resource cache",
            )?,
            cancelled_total: registry.register_counter(
                NAMESPACE,
                "cancelled_total",
                "Registrations withdrawn before delivery",
            )?,
            loaded_total: registry.register_counter(
                NAMESPACE,
                "loaded_total",
                "Resources delivered to callbacks",
            )?,
            failed_total: registry.register_counter(
                NAMESPACE,
                "failed_total",
                "Load failures delivered to callbacks",
            )?,
            pending_requests: registry.register_gauge(
                NAMESPACE,
                "pending_requests",
                "Loads queued or in flight",
                "requests",
            )?,
            decode_time: registry.register_histogram(
                NAMESPACE,
                "decode_time",
                "Background decode time",
                "ms",
                vec![1.0, 5.0, 16.0, 33.0, 100.0, 500.0],
            )?,
        })
    }
}

pub(crate) fn count(counter: &CounterHandle, amount: usize) {
    if amount == 0 {
        return;
    }
    if let Err(e) = counter.increment_by(amount as u64) {
        log::warn!("Failed to update {}: {e}", counter.id());
    }
}

pub(crate) fn set_gauge(gauge: &GaugeHandle, value: usize) {
    if let Err(e) = gauge.set(value as f64) {
        log::warn!("Failed to update {}: {e}", gauge.id());
    }
}
