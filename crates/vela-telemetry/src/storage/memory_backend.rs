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

use crate::storage::backend::MetricsBackend;
use vela_core::telemetry::{Metric, MetricId, MetricValue, MetricsError, MetricsResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory metrics backend built on `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    storage: RwLock<HashMap<MetricId, Metric>>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error() -> MetricsError {
    MetricsError::StorageError("metrics storage lock poisoned".to_string())
}

impl MetricsBackend for InMemoryBackend {
    fn put_metric(&self, metric: Metric) -> MetricsResult<()> {
        let mut storage = self.storage.write().map_err(|_| lock_error())?;
        storage.insert(metric.id.clone(), metric);
        Ok(())
    }

    fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric> {
        let storage = self.storage.read().map_err(|_| lock_error())?;
        storage
            .get(id)
            .cloned()
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))
    }

    fn modify(&self, id: &MetricId, update: &mut dyn FnMut(&mut MetricValue)) -> MetricsResult<()> {
        let mut storage = self.storage.write().map_err(|_| lock_error())?;
        let metric = storage
            .get_mut(id)
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))?;
        update(&mut metric.value);
        metric.touch();
        Ok(())
    }

    fn list_all_metrics(&self) -> Vec<Metric> {
        match self.storage.read() {
            Ok(storage) => storage.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn metric_count(&self) -> usize {
        self.storage.read().map(|storage| storage.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use vela_core::telemetry::MetricType;

    #[test]
    fn missing_metric_is_reported() {
        let backend = InMemoryBackend::new();
        let id = MetricId::new("throttle", "nope");
        assert!(matches!(
            backend.increment_counter(&id, 1),
            Err(MetricsError::MetricNotFound(_))
        ));
    }

    #[test]
    fn type_mismatch_is_reported() {
        let backend = InMemoryBackend::new();
        let id = MetricId::new("throttle", "pending");
        backend.put_metric(Metric::new_gauge(id.clone(), "pending", "requests")).unwrap();

        match backend.increment_counter(&id, 1) {
            Err(MetricsError::TypeMismatch { expected, found }) => {
                assert_eq!(expected, MetricType::Counter);
                assert_eq!(found, MetricType::Gauge);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let backend = Arc::new(InMemoryBackend::new());
        let id = MetricId::new("throttle", "loaded_total");
        backend.put_metric(Metric::new_counter(id.clone(), "loads")).unwrap();

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let backend = backend.clone();
                let id = id.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        backend.increment_counter(&id, 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().expect("Thread join failed");
        }

        assert_eq!(backend.get_metric(&id).unwrap().value.as_counter(), Some(1000));
    }

    #[test]
    fn listing_returns_every_metric() {
        let backend = InMemoryBackend::new();
        backend.put_metric(Metric::new_counter(MetricId::new("throttle", "a"), "a")).unwrap();
        backend.put_metric(Metric::new_counter(MetricId::new("throttle", "b"), "b")).unwrap();
        backend.put_metric(Metric::new_counter(MetricId::new("render", "c"), "c")).unwrap();

        let mut names: Vec<_> = backend.list_all_metrics().into_iter().map(|m| m.id.name).collect();
        names.sort();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(backend.metric_count(), 3);
    }
}
