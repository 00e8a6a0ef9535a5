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

//! Primitives for handing work to the single render thread.
//!
//! Only the render thread may construct or mutate GPU-resident resources.
//! Background code reaches it through the [`RenderThread`] trait; the
//! [`RenderQueue`] is the standard implementation, a single-consumer channel
//! the frame loop drains once per frame before any per-frame listener runs.

mod queue;

pub use self::queue::{RenderQueue, RenderTaskSender};

/// A unit of work that must run on the render thread.
pub type RenderTask = Box<dyn FnOnce() + Send + 'static>;

/// The hop from any thread to the render thread.
///
/// Implementations must run tasks in submission order relative to other
/// render-thread work, once per frame, before other per-frame callbacks.
/// Submission never blocks on the render thread.
pub trait RenderThread: Send + Sync + 'static {
    /// Enqueues `task` for the next drain of the render loop.
    fn run_on_render_thread(&self, task: RenderTask);
}
