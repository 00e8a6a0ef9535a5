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

use super::{RenderTask, RenderThread};

/// The render thread's inbox.
///
/// The owner (the render loop) keeps the `RenderQueue` and calls
/// [`drain`](RenderQueue::drain) at the top of every frame. Any number of
/// [`RenderTaskSender`]s can post into it from other threads.
#[derive(Debug)]
pub struct RenderQueue {
    sender: flume::Sender<RenderTask>,
    receiver: flume::Receiver<RenderTask>,
}

impl RenderQueue {
    /// Creates a new queue with an unbounded channel.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        log::debug!("Render task queue initialized.");
        Self { sender, receiver }
    }

    /// Returns a sender that posts tasks into this queue.
    pub fn sender(&self) -> RenderTaskSender {
        RenderTaskSender {
            sender: self.sender.clone(),
        }
    }

    /// Runs every task queued before this call, in submission order.
    ///
    /// Tasks posted while draining are left for the next frame, so a task that
    /// re-posts itself cannot stall the frame.
    ///
    /// ## Returns
    /// The number of tasks that ran.
    pub fn drain(&self) -> usize {
        let pending = self.receiver.len();
        let mut ran = 0;
        for task in self.receiver.try_iter().take(pending) {
            task();
            ran += 1;
        }
        if ran > 0 {
            log::trace!("Drained {ran} render task(s).");
        }
        ran
    }

    /// Number of tasks waiting for the next drain.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` if no task is waiting.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for RenderQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderThread for RenderQueue {
    fn run_on_render_thread(&self, task: RenderTask) {
        self.sender().run_on_render_thread(task);
    }
}

/// A cloneable handle that posts tasks to a [`RenderQueue`].
#[derive(Debug, Clone)]
pub struct RenderTaskSender {
    sender: flume::Sender<RenderTask>,
}

impl RenderThread for RenderTaskSender {
    fn run_on_render_thread(&self, task: RenderTask) {
        if self.sender.send(task).is_err() {
            log::error!("Failed to post render task: render queue was dropped.");
        }
    }
}
