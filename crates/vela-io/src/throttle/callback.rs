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

//! The interface through which loaded resources reach the caller.

use super::error::LoadError;
use vela_core::asset::{Asset, AssetHandle};
use vela_core::resource::ResourceDescriptor;

/// Receives the outcome of one load request.
///
/// Exactly one of [`loaded`](Self::loaded) or [`failed`](Self::failed) is
/// called, unless the request was cancelled first. `loaded` always runs on the
/// render thread; `failed` may run on a decode worker.
///
/// [`still_wanted`](Self::still_wanted) is polled while the request is queued,
/// under the scheduler's lock. It must be quick and must not call back into
/// the throttler.
pub trait LoadCallback<T: Asset>: Send + 'static {
    /// Returns `false` once the caller no longer needs the resource.
    fn still_wanted(&self, _descriptor: &ResourceDescriptor) -> bool {
        true
    }

    /// The resource is ready. Every callback deduplicated onto one load gets a
    /// clone of the same handle.
    fn loaded(&self, resource: AssetHandle<T>, descriptor: &ResourceDescriptor);

    /// The load failed.
    fn failed(&self, error: LoadError, descriptor: &ResourceDescriptor);
}

/// A [`LoadCallback`] built from two closures. See [`callback_fn`].
pub struct FnCallback<L, F> {
    on_loaded: L,
    on_failed: F,
}

/// Builds a callback from a success closure and a failure closure.
///
/// ```
/// use vela_core::asset::{Asset, AssetHandle};
/// use vela_core::resource::ResourceDescriptor;
/// use vela_io::callback_fn;
///
/// struct Texture;
/// impl Asset for Texture {}
///
/// let callback = callback_fn(
///     |_texture: AssetHandle<Texture>, descriptor: &ResourceDescriptor| {
///         println!("{descriptor} is ready");
///     },
///     |error, _| eprintln!("{error}"),
/// );
/// # let _ = callback;
/// ```
pub fn callback_fn<T, L, F>(on_loaded: L, on_failed: F) -> FnCallback<L, F>
where
    T: Asset,
    L: Fn(AssetHandle<T>, &ResourceDescriptor) + Send + 'static,
    F: Fn(LoadError, &ResourceDescriptor) + Send + 'static,
{
    FnCallback {
        on_loaded,
        on_failed,
    }
}

impl<T, L, F> LoadCallback<T> for FnCallback<L, F>
where
    T: Asset,
    L: Fn(AssetHandle<T>, &ResourceDescriptor) + Send + 'static,
    F: Fn(LoadError, &ResourceDescriptor) + Send + 'static,
{
    fn loaded(&self, resource: AssetHandle<T>, descriptor: &ResourceDescriptor) {
        (self.on_loaded)(resource, descriptor)
    }

    fn failed(&self, error: LoadError, descriptor: &ResourceDescriptor) {
        (self.on_failed)(error, descriptor)
    }
}
