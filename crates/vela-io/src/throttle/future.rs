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

//! Blocking handles for loads that are consumed off the render thread.

use super::callback::LoadCallback;
use super::error::LoadError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;
use vela_core::asset::{Asset, AssetHandle};
use vela_core::resource::{ResourceDescriptor, ResourceKey};
use vela_core::CancellationToken;

/// Outcome of a load.
pub type LoadResult<T> = Result<AssetHandle<T>, LoadError>;

/// The eventual result of [`Throttler::load_future`](super::Throttler::load_future).
///
/// The result is produced when the render thread drains its queue, so never
/// block on a `LoadFuture` from the render thread itself. Dropping the future
/// withdraws the request if it has not started decoding yet.
pub struct LoadFuture<T: Asset> {
    key: ResourceKey,
    receiver: Receiver<LoadResult<T>>,
    token: CancellationToken,
    outcome: Option<LoadResult<T>>,
}

impl<T: Asset> LoadFuture<T> {
    pub(crate) fn new(
        key: ResourceKey,
        receiver: Receiver<LoadResult<T>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            key,
            receiver,
            token,
            outcome: None,
        }
    }

    /// Key of the requested resource.
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    /// Withdraws the request. A decode that already started still completes,
    /// but its result is not delivered here.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once an outcome is available.
    pub fn is_ready(&mut self) -> bool {
        self.poll();
        self.outcome.is_some()
    }

    /// The outcome, if there is one yet.
    pub fn try_get(&mut self) -> Option<LoadResult<T>> {
        self.poll();
        self.outcome.clone()
    }

    /// Blocks for at most `timeout`; `None` if the load is still running.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<LoadResult<T>> {
        if self.outcome.is_none() {
            match self.receiver.recv_timeout(timeout) {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => self.outcome = Some(Err(self.abandoned())),
            }
        }
        self.outcome.clone()
    }

    /// Blocks until the load finishes.
    pub fn wait(mut self) -> LoadResult<T> {
        if let Some(outcome) = self.outcome.take() {
            return outcome;
        }
        self.receiver
            .recv()
            .unwrap_or_else(|_| Err(self.abandoned()))
    }

    fn poll(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        match self.receiver.try_recv() {
            Ok(outcome) => self.outcome = Some(outcome),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.outcome = Some(Err(self.abandoned())),
        }
    }

    fn abandoned(&self) -> LoadError {
        LoadError::Abandoned {
            key: self.key.clone(),
        }
    }
}

impl<T: Asset> Drop for LoadFuture<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Forwards the outcome of a load into a [`LoadFuture`].
pub(crate) struct FutureCallback<T: Asset> {
    sender: Sender<LoadResult<T>>,
}

impl<T: Asset> FutureCallback<T> {
    pub(crate) fn new(sender: Sender<LoadResult<T>>) -> Self {
        Self { sender }
    }
}

impl<T: Asset> LoadCallback<T> for FutureCallback<T> {
    fn loaded(&self, resource: AssetHandle<T>, _descriptor: &ResourceDescriptor) {
        // The receiver may already be gone; nobody is waiting then.
        let _ = self.sender.try_send(Ok(resource));
    }

    fn failed(&self, error: LoadError, _descriptor: &ResourceDescriptor) {
        let _ = self.sender.try_send(Err(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::io::Cursor;

    #[derive(Debug)]
    struct Blob(u8);
    impl Asset for Blob {}

    fn future() -> (FutureCallback<Blob>, LoadFuture<Blob>, CancellationToken) {
        let (sender, receiver) = bounded(1);
        let token = CancellationToken::new();
        let future = LoadFuture::new(ResourceKey::Embedded(7), receiver, token.clone());
        (FutureCallback::new(sender), future, token)
    }

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::from_reader(ResourceKey::Embedded(7), Cursor::new(Vec::new()))
    }

    #[test]
    fn resolves_from_the_callback() {
        let (callback, mut future, _) = future();
        assert!(!future.is_ready());
        assert!(future.wait_timeout(Duration::from_millis(1)).is_none());

        callback.loaded(AssetHandle::new(Blob(3)), &descriptor());
        assert!(future.is_ready());
        assert_eq!(future.try_get().unwrap().unwrap().0, 3);
        assert_eq!(future.wait().unwrap().0, 3);
    }

    #[test]
    fn failures_are_delivered() {
        let (callback, future, _) = future();
        callback.failed(LoadError::Empty { key: ResourceKey::Embedded(7) }, &descriptor());
        assert!(matches!(future.wait(), Err(LoadError::Empty { .. })));
    }

    #[test]
    fn a_dropped_request_reports_abandoned() {
        let (callback, future, _) = future();
        drop(callback);
        assert!(matches!(future.wait(), Err(LoadError::Abandoned { .. })));
    }

    #[test]
    fn dropping_the_future_cancels() {
        let (_callback, future, token) = future();
        drop(future);
        assert!(token.is_cancelled());
    }
}
