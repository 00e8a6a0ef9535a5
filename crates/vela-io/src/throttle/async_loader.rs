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

//! Background decode of one resource, followed by a hop to the render thread.

use super::error::{BoxError, LoadError};
use super::metrics::ThrottleMetrics;
use super::pending::PendingRequest;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use vela_core::asset::{Asset, AssetHandle};
use vela_core::render::RenderThread;
use vela_core::resource::{ResourceDescriptor, StreamState};
use vela_telemetry::ScopedMetricTimer;

/// Decodes one kind of resource.
///
/// Loading is split in two: [`load_resource`](Self::load_resource) does the
/// slow part on a decode worker and must not touch GPU state;
/// [`convert`](Self::convert) runs on the render thread and turns the decoded
/// data into the final resource. Loaders with nothing to do on the render
/// thread use the same type for both and return the input from `convert`.
pub trait ResourceLoader: Send + Sync + 'static {
    /// What the decode worker produces.
    type Intermediate: Send + 'static;
    /// What callbacks receive.
    type Output: Asset;

    /// Reads and decodes the descriptor's stream. `Ok(None)` means the stream
    /// held nothing usable.
    fn load_resource(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<Option<Self::Intermediate>, BoxError>;

    /// Builds the final resource. Always called on the render thread.
    fn convert(&self, intermediate: Self::Intermediate) -> Self::Output;
}

/// A one-shot background task owned by a pending request.
pub(crate) trait LoadUnit<T: Asset>: Send {
    /// Checked once more right before the unit starts.
    fn still_wanted(&self, owner: &PendingRequest<T>) -> bool {
        owner.sweep_unwanted()
    }

    /// Decodes, then reports back to `owner`.
    fn run(self: Box<Self>, owner: Arc<PendingRequest<T>>);
}

/// Builds load units for one output type.
pub(crate) trait UnitFactory<T: Asset>: Send + Sync {
    fn unit(&self, descriptor: Arc<ResourceDescriptor>) -> Box<dyn LoadUnit<T>>;
}

pub(crate) struct LoaderFactory<L: ResourceLoader> {
    loader: Arc<L>,
    render: Arc<dyn RenderThread>,
    metrics: Arc<ThrottleMetrics>,
}

impl<L: ResourceLoader> LoaderFactory<L> {
    pub(crate) fn new(
        loader: L,
        render: Arc<dyn RenderThread>,
        metrics: Arc<ThrottleMetrics>,
    ) -> Self {
        Self {
            loader: Arc::new(loader),
            render,
            metrics,
        }
    }
}

impl<L: ResourceLoader> UnitFactory<L::Output> for LoaderFactory<L> {
    fn unit(&self, descriptor: Arc<ResourceDescriptor>) -> Box<dyn LoadUnit<L::Output>> {
        Box::new(AsyncLoader {
            loader: Arc::clone(&self.loader),
            descriptor,
            render: Arc::clone(&self.render),
            metrics: Arc::clone(&self.metrics),
        })
    }
}

/// Runs a [`ResourceLoader`] against one descriptor.
pub(crate) struct AsyncLoader<L: ResourceLoader> {
    loader: Arc<L>,
    descriptor: Arc<ResourceDescriptor>,
    render: Arc<dyn RenderThread>,
    metrics: Arc<ThrottleMetrics>,
}

impl<L: ResourceLoader> LoadUnit<L::Output> for AsyncLoader<L> {
    fn run(self: Box<Self>, owner: Arc<PendingRequest<L::Output>>) {
        let AsyncLoader {
            loader,
            descriptor,
            render,
            metrics,
        } = *self;
        let key = descriptor.key().clone();

        if descriptor.state() == StreamState::Closed {
            owner.failed(LoadError::StreamUnavailable { key });
            return;
        }

        let decoded = {
            let _timer = ScopedMetricTimer::new(&metrics.decode_time);
            panic::catch_unwind(AssertUnwindSafe(|| loader.load_resource(&descriptor)))
        };
        descriptor.close_stream();

        match decoded {
            Ok(Ok(Some(intermediate))) => {
                log::debug!("Decoded {key}; handing off to the render thread");
                render.run_on_render_thread(Box::new(move || {
                    match panic::catch_unwind(AssertUnwindSafe(|| loader.convert(intermediate))) {
                        Ok(resource) => owner.loaded(AssetHandle::new(resource)),
                        Err(payload) => owner.failed(LoadError::panicked(key, payload.as_ref())),
                    }
                }));
            }
            Ok(Ok(None)) => owner.failed(LoadError::Empty { key }),
            Ok(Err(cause)) => owner.failed(LoadError::decode(key, cause)),
            Err(payload) => owner.failed(LoadError::panicked(key, payload.as_ref())),
        }
    }
}
