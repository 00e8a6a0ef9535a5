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

use super::async_loader::{LoaderFactory, ResourceLoader, UnitFactory};
use super::cache::ResourceCache;
use super::callback::LoadCallback;
use super::error::ThrottleError;
use super::future::{FutureCallback, LoadFuture};
use super::limiter::ThreadLimiter;
use super::metrics::ThrottleMetrics;
use super::pending::PendingRequests;
use super::settings::ThrottlerSettings;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use vela_core::asset::Asset;
use vela_core::priority::is_valid_priority;
use vela_core::render::RenderThread;
use vela_core::resource::ResourceDescriptor;
use vela_core::CancellationToken;
use vela_telemetry::MetricsRegistry;

/// Entry point for asynchronous resource loads.
///
/// One `Throttler` serves one rendering context. Register a
/// [`ResourceLoader`] per output type, then call [`load`](Self::load) from any
/// thread. Concurrent loads of the same resource are merged into one decode,
/// queued work runs highest priority first, and at most
/// [`ThrottlerSettings::decode_thread_limit`] decodes run at once. A resource
/// that was delivered before and is still held somewhere is handed out again
/// without a decode.
pub struct Throttler {
    loaders: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    requests: Arc<PendingRequests>,
    limiter: ThreadLimiter,
    render: Arc<dyn RenderThread>,
    metrics: Arc<ThrottleMetrics>,
    metrics_registry: Arc<MetricsRegistry>,
    settings: ThrottlerSettings,
}

impl Throttler {
    /// Creates a throttler that hands finished work to `render`.
    ///
    /// # Errors
    /// Fails if the throttler's metrics cannot be registered.
    pub fn new(
        settings: ThrottlerSettings,
        render: Arc<dyn RenderThread>,
        metrics_registry: Arc<MetricsRegistry>,
    ) -> Result<Self, ThrottleError> {
        let metrics = Arc::new(ThrottleMetrics::new(&metrics_registry)?);
        let limiter = ThreadLimiter::from_settings(&settings);
        log::info!(
            "Throttler ready: {} decode thread(s), spawn ceiling {}",
            limiter.limit(),
            settings.spawn_ceiling
        );
        Ok(Self {
            loaders: HashMap::new(),
            requests: PendingRequests::new(
                Arc::clone(&metrics),
                ResourceCache::new(settings.cache_resources),
                Arc::clone(&render),
            ),
            limiter,
            render,
            metrics,
            metrics_registry,
            settings,
        })
    }

    /// Registers the loader for `L::Output`, replacing any previous one.
    pub fn register_loader<L: ResourceLoader>(&mut self, loader: L) {
        let factory: Arc<dyn UnitFactory<L::Output>> = Arc::new(LoaderFactory::new(
            loader,
            Arc::clone(&self.render),
            Arc::clone(&self.metrics),
        ));
        let previous = self
            .loaders
            .insert(TypeId::of::<L::Output>(), Box::new(factory));
        if previous.is_some() {
            log::warn!("Replaced the loader for {}", type_name::<L::Output>());
        } else {
            log::debug!("Registered a loader for {}", type_name::<L::Output>());
        }
    }

    /// Requests a resource.
    ///
    /// `callback` receives the result on the render thread, or the failure on
    /// whichever thread detected it. The returned token withdraws this one
    /// request; other callers waiting on the same resource are unaffected.
    ///
    /// # Errors
    /// - [`ThrottleError::PriorityOutOfRange`] for a priority below
    ///   [`LOWEST_PRIORITY`](vela_core::priority::LOWEST_PRIORITY).
    /// - [`ThrottleError::NoLoaderRegistered`] if nothing produces `T`.
    /// - [`ThrottleError::DescriptorReused`] if `descriptor` is already
    ///   pending. Use a new descriptor for every call.
    pub fn load<T: Asset>(
        &self,
        descriptor: Arc<ResourceDescriptor>,
        callback: impl LoadCallback<T>,
        priority: i32,
    ) -> Result<CancellationToken, ThrottleError> {
        if !is_valid_priority(priority) {
            return Err(ThrottleError::PriorityOutOfRange { priority });
        }
        let factory = self.factory::<T>()?;
        self.requests.register(
            descriptor,
            Box::new(callback),
            priority,
            factory.as_ref(),
            &self.limiter,
        )
    }

    /// Requests a resource and returns a handle to block on.
    ///
    /// # Errors
    /// As for [`load`](Self::load).
    pub fn load_future<T: Asset>(
        &self,
        descriptor: Arc<ResourceDescriptor>,
        priority: i32,
    ) -> Result<LoadFuture<T>, ThrottleError> {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let key = descriptor.key().clone();
        let token = self.load(descriptor, FutureCallback::new(sender), priority)?;
        Ok(LoadFuture::new(key, receiver, token))
    }

    /// Loads that are queued or in flight.
    pub fn pending_count(&self) -> usize {
        self.requests.len()
    }

    /// Loads waiting for a decode worker.
    pub fn queued_count(&self) -> usize {
        self.limiter.queued()
    }

    /// The registry holding the `throttle` metrics.
    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics_registry
    }

    /// The settings this throttler was built with.
    pub fn settings(&self) -> &ThrottlerSettings {
        &self.settings
    }

    fn factory<T: Asset>(&self) -> Result<&Arc<dyn UnitFactory<T>>, ThrottleError> {
        self.loaders
            .get(&TypeId::of::<T>())
            .and_then(|factory| factory.downcast_ref::<Arc<dyn UnitFactory<T>>>())
            .ok_or(ThrottleError::NoLoaderRegistered {
                type_name: type_name::<T>(),
            })
    }
}
