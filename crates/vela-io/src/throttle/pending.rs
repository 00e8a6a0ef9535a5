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

//! Deduplication of concurrent requests for the same resource.
//!
//! The registry holds at most one [`PendingRequest`] per resource key and
//! result type. Later requests for a key that is already loading join the
//! existing entry instead of starting a second decode; when the decode
//! finishes, every joined callback receives the same handle. Delivered
//! resources go into the [`ResourceCache`], so a request for a resource that
//! is still held elsewhere is answered without decoding at all.
//!
//! Locks are always taken in the order scheduler, registry, callback list.
//! The cache lock nests inside the registry lock. Requesters release the
//! registry before they touch the scheduler.

use super::async_loader::{LoadUnit, UnitFactory};
use super::cache::ResourceCache;
use super::callback::LoadCallback;
use super::error::{panic_message, LoadError, ThrottleError};
use super::limiter::ThreadLimiter;
use super::metrics::{count, set_gauge, ThrottleMetrics};
use super::policy::PriorityCancelable;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use vela_core::asset::{Asset, AssetHandle};
use vela_core::priority::EMPTY_LIST_PRIORITY;
use vela_core::render::RenderThread;
use vela_core::resource::{ResourceDescriptor, ResourceKey};
use vela_core::CancellationToken;

type Entries<T> = HashMap<ResourceKey, Arc<PendingRequest<T>>>;

#[derive(Default)]
pub(crate) struct Registry {
    by_type: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    live: usize,
}

fn entries_mut<T: Asset>(
    by_type: &mut HashMap<TypeId, Box<dyn Any + Send + Sync>>,
) -> &mut Entries<T> {
    let slot = by_type
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Box::new(Entries::<T>::new()));
    match slot.downcast_mut::<Entries<T>>() {
        Some(entries) => entries,
        None => unreachable!("registry slot for {} holds another type", type_name::<T>()),
    }
}

/// The table of in-flight loads, shared by every request it created.
pub(crate) struct PendingRequests {
    registry: Mutex<Registry>,
    cache: ResourceCache,
    render: Arc<dyn RenderThread>,
    metrics: Arc<ThrottleMetrics>,
}

enum Scheduled<T: Asset> {
    Started(Arc<PendingRequest<T>>),
    Joined(Arc<PendingRequest<T>>),
    Cached(AssetHandle<T>, Registration<T>),
}

impl PendingRequests {
    pub(crate) fn new(
        metrics: Arc<ThrottleMetrics>,
        cache: ResourceCache,
        render: Arc<dyn RenderThread>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry: Mutex::new(Registry::default()),
            cache,
            render,
            metrics,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live entries across all result types.
    pub(crate) fn len(&self) -> usize {
        self.lock().live
    }

    /// Starts a load for `descriptor`, joins the one already in flight for an
    /// equal key, or answers from the cache.
    pub(crate) fn register<T: Asset>(
        self: &Arc<Self>,
        descriptor: Arc<ResourceDescriptor>,
        callback: Box<dyn LoadCallback<T>>,
        priority: i32,
        factory: &dyn UnitFactory<T>,
        limiter: &ThreadLimiter,
    ) -> Result<CancellationToken, ThrottleError> {
        let token = CancellationToken::new();
        let registration = Registration {
            callback,
            descriptor: Arc::clone(&descriptor),
            token: token.clone(),
        };

        let scheduled = {
            let mut registry = self.lock();
            let Registry { by_type, live } = &mut *registry;
            let entries = entries_mut::<T>(by_type);

            if let Some(pending) = entries.get(descriptor.key()) {
                if pending.holds(&descriptor) {
                    return Err(ThrottleError::DescriptorReused {
                        key: descriptor.key().clone(),
                    });
                }
                pending.add_callback(registration, priority);
                Scheduled::Joined(Arc::clone(pending))
            } else if let Some(resource) = self.cache.get::<T>(descriptor.key()) {
                Scheduled::Cached(resource, registration)
            } else {
                let pending = PendingRequest::new(
                    Arc::clone(&descriptor),
                    Arc::downgrade(self),
                    registration,
                    priority,
                    factory.unit(Arc::clone(&descriptor)),
                    Arc::clone(&self.metrics),
                );
                entries.insert(descriptor.key().clone(), Arc::clone(&pending));
                *live += 1;
                set_gauge(&self.metrics.pending_requests, *live);
                Scheduled::Started(pending)
            }
        };

        count(&self.metrics.requests_total, 1);
        match scheduled {
            Scheduled::Started(pending) => {
                log::debug!("Spawning load of {descriptor} at priority {priority}");
                limiter.spawn(pending);
            }
            Scheduled::Joined(pending) => {
                // Nobody will ever read the duplicate's stream.
                descriptor.close_stream();
                count(&self.metrics.deduplicated_total, 1);
                log::debug!(
                    "Joined {descriptor} onto the pending load of {}, priority {priority}",
                    pending.descriptor
                );
                let item: Arc<dyn PriorityCancelable> = pending;
                limiter.reschedule(&item);
            }
            Scheduled::Cached(resource, registration) => {
                descriptor.close_stream();
                count(&self.metrics.cache_hits_total, 1);
                log::debug!("Serving {descriptor} from the cache");
                let metrics = Arc::clone(&self.metrics);
                self.render.run_on_render_thread(Box::new(move || {
                    registration.deliver(resource, &metrics)
                }));
            }
        }
        Ok(token)
    }
}

struct Registration<T: Asset> {
    callback: Box<dyn LoadCallback<T>>,
    descriptor: Arc<ResourceDescriptor>,
    token: CancellationToken,
}

impl<T: Asset> Registration<T> {
    fn still_wanted(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        panic::catch_unwind(AssertUnwindSafe(|| self.callback.still_wanted(&self.descriptor)))
            .unwrap_or_else(|payload| {
                log::warn!(
                    "still_wanted() for {} panicked, dropping the callback: {}",
                    self.descriptor.key(),
                    panic_message(payload.as_ref())
                );
                false
            })
    }

    /// Hands a cached resource to this one callback. Render thread only.
    fn deliver(self, resource: AssetHandle<T>, metrics: &ThrottleMetrics) {
        if !self.still_wanted() {
            count(&metrics.cancelled_total, 1);
            return;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| {
            self.callback.loaded(resource, &self.descriptor)
        })) {
            Ok(()) => count(&metrics.loaded_total, 1),
            Err(payload) => log::error!(
                "Callback for {} panicked: {}",
                self.descriptor.key(),
                panic_message(payload.as_ref())
            ),
        }
    }
}

/// One in-flight load and everybody waiting for it.
pub(crate) struct PendingRequest<T: Asset> {
    descriptor: Arc<ResourceDescriptor>,
    registry: Weak<PendingRequests>,
    callbacks: Mutex<Vec<Registration<T>>>,
    priority: AtomicI32,
    highest_priority: AtomicI32,
    unit: Mutex<Option<Box<dyn LoadUnit<T>>>>,
    retired: AtomicBool,
    metrics: Arc<ThrottleMetrics>,
}

impl<T: Asset> PendingRequest<T> {
    fn new(
        descriptor: Arc<ResourceDescriptor>,
        registry: Weak<PendingRequests>,
        first: Registration<T>,
        priority: i32,
        unit: Box<dyn LoadUnit<T>>,
        metrics: Arc<ThrottleMetrics>,
    ) -> Arc<Self> {
        let request = Self {
            descriptor,
            registry,
            callbacks: Mutex::new(Vec::with_capacity(1)),
            priority: AtomicI32::new(EMPTY_LIST_PRIORITY),
            highest_priority: AtomicI32::new(EMPTY_LIST_PRIORITY),
            unit: Mutex::new(Some(unit)),
            retired: AtomicBool::new(false),
            metrics,
        };
        request.add_callback(first, priority);
        request.update_priority();
        Arc::new(request)
    }

    fn lock_callbacks(&self) -> MutexGuard<'_, Vec<Registration<T>>> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `descriptor` is the instance that started this request or one
    /// that joined it and is still waiting.
    fn holds(&self, descriptor: &Arc<ResourceDescriptor>) -> bool {
        Arc::ptr_eq(&self.descriptor, descriptor)
            || self
                .lock_callbacks()
                .iter()
                .any(|registration| Arc::ptr_eq(&registration.descriptor, descriptor))
    }

    fn add_callback(&self, registration: Registration<T>, priority: i32) {
        self.lock_callbacks().push(registration);
        self.highest_priority.fetch_max(priority, Ordering::AcqRel);
    }

    /// Hands the converted resource to every callback. Render thread only.
    pub(crate) fn loaded(&self, resource: AssetHandle<T>) {
        // Cached before retiring, so a request that misses the registry finds it.
        if let Some(requests) = self.registry.upgrade() {
            requests.cache.insert(self.descriptor.key().clone(), &resource);
        }
        let delivered = self.fan_out(|registration| {
            registration
                .callback
                .loaded(resource.clone(), &registration.descriptor)
        });
        log::debug!("Delivered {} to {delivered} callback(s)", self.descriptor.key());
        count(&self.metrics.loaded_total, delivered);
    }

    /// Reports a failed load to every callback.
    pub(crate) fn failed(&self, error: LoadError) {
        log::warn!("Failed to load {}: {error}", self.descriptor.key());
        let delivered = self.fan_out(|registration| {
            registration
                .callback
                .failed(error.clone(), &registration.descriptor)
        });
        count(&self.metrics.failed_total, delivered);
    }

    /// Drops callbacks that lost interest. Retires the request and returns
    /// `false` when none are left.
    pub(crate) fn sweep_unwanted(&self) -> bool {
        if self.retired.load(Ordering::Acquire) {
            return false;
        }
        let registry = self.registry.upgrade();
        let mut guard = registry.as_deref().map(PendingRequests::lock);

        let mut callbacks = self.lock_callbacks();
        let before = callbacks.len();
        callbacks.retain(Registration::still_wanted);
        count(&self.metrics.cancelled_total, before - callbacks.len());
        if !callbacks.is_empty() {
            return true;
        }
        drop(callbacks);

        log::debug!("Nobody wants {} any more", self.descriptor);
        self.retire(guard.as_deref_mut());
        false
    }

    /// Delivers to every callback, including ones that join while delivery is
    /// under way, then retires the request.
    fn fan_out(&self, deliver: impl Fn(&Registration<T>)) -> usize {
        let registry = self.registry.upgrade();
        let mut delivered = 0;
        loop {
            let batch = {
                let mut guard = registry.as_deref().map(PendingRequests::lock);
                let mut callbacks = self.lock_callbacks();
                if callbacks.is_empty() {
                    drop(callbacks);
                    self.retire(guard.as_deref_mut());
                    break;
                }
                mem::take(&mut *callbacks)
            };

            for registration in batch {
                if registration.token.is_cancelled() {
                    count(&self.metrics.cancelled_total, 1);
                    continue;
                }
                match panic::catch_unwind(AssertUnwindSafe(|| deliver(&registration))) {
                    Ok(()) => delivered += 1,
                    Err(payload) => log::error!(
                        "Callback for {} panicked: {}",
                        registration.descriptor.key(),
                        panic_message(payload.as_ref())
                    ),
                }
            }
        }
        delivered
    }

    /// Removes this request from the registry. Must be called with the
    /// registry locked, so no callback can join after the final check.
    fn retire(&self, registry: Option<&mut Registry>) {
        if self.retired.swap(true, Ordering::AcqRel) {
            return;
        }
        self.descriptor.close_stream();
        let Some(registry) = registry else {
            return;
        };

        let removed = entries_mut::<T>(&mut registry.by_type).remove(self.descriptor.key());
        match removed {
            Some(entry) if ptr::eq(Arc::as_ptr(&entry), self) => {
                registry.live -= 1;
                set_gauge(&self.metrics.pending_requests, registry.live);
            }
            other => panic!(
                "retiring the request for {} removed {:?}, not {:p}",
                self.descriptor.key(),
                other.as_ref().map(Arc::as_ptr),
                self
            ),
        }
    }
}

impl<T: Asset> PriorityCancelable for PendingRequest<T> {
    fn priority(&self) -> i32 {
        self.priority.load(Ordering::Acquire)
    }

    fn update_priority(&self) {
        self.priority
            .store(self.highest_priority.load(Ordering::Acquire), Ordering::Release);
    }

    fn still_wanted(&self) -> bool {
        self.sweep_unwanted()
    }

    fn run(self: Arc<Self>) {
        let unit = self
            .unit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(unit) = unit else {
            log::error!("The load of {} was started twice", self.descriptor.key());
            return;
        };
        if !unit.still_wanted(&self) {
            return;
        }
        unit.run(self);
    }
}
