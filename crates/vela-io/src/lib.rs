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

//! # Vela I/O
//!
//! Asynchronous loading of textures, meshes and other resources for an engine
//! with a single render thread.
//!
//! Callers hand a [`Throttler`] a resource descriptor, a callback and a
//! priority. Decoding happens on a small pool of background workers; the
//! final conversion and the callbacks run on the render thread, which drains
//! a [`RenderQueue`](vela_core::render::RenderQueue) once per frame.

#![warn(missing_docs)]

pub mod throttle;

pub use throttle::{
    callback_fn, BoxError, LoadCallback, LoadError, LoadFuture, LoadResult, ResourceLoader,
    ThrottleError, Throttler, ThrottlerSettings,
};
