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

//! Errors reported by the throttler.

use std::any::Any;
use std::error::Error;
use std::sync::Arc;
use thiserror::Error;
use vela_core::priority::{HIGHEST_PRIORITY, LOWEST_PRIORITY};
use vela_core::resource::ResourceKey;
use vela_core::telemetry::MetricsError;

/// The error type background decoders return, as in any `std` error chain.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// A request that was rejected before anything was scheduled.
#[derive(Debug, Error)]
pub enum ThrottleError {
    /// The priority lies in the band reserved for internal sentinels.
    #[error(
        "priority {priority} is outside [{lo}, {hi}]",
        lo = LOWEST_PRIORITY,
        hi = HIGHEST_PRIORITY
    )]
    PriorityOutOfRange {
        /// The rejected priority.
        priority: i32,
    },

    /// The same descriptor instance was submitted while its first request is
    /// still pending. Every load call needs a fresh descriptor.
    #[error("descriptor for {key} was submitted more than once; each load needs a new descriptor")]
    DescriptorReused {
        /// Key of the reused descriptor.
        key: ResourceKey,
    },

    /// No loader produces the requested resource type.
    #[error("no loader registered for resource type `{type_name}`")]
    NoLoaderRegistered {
        /// Name of the requested type.
        type_name: &'static str,
    },

    /// The throttler's metrics could not be registered.
    #[error("failed to register throttler metrics: {0}")]
    Metrics(#[from] MetricsError),
}

/// Why a background load did not produce a resource. Delivered to every
/// callback that was waiting on the load, so it is cheap to clone.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The decoder returned an error.
    #[error("failed to decode {key}: {cause}")]
    Decode {
        /// Key of the resource.
        key: ResourceKey,
        /// The decoder's error.
        cause: Arc<dyn Error + Send + Sync>,
    },

    /// The decoder finished without producing anything.
    #[error("decoder produced nothing for {key}")]
    Empty {
        /// Key of the resource.
        key: ResourceKey,
    },

    /// The descriptor's stream was closed before the decoder could claim it.
    #[error("stream for {key} was closed before decoding")]
    StreamUnavailable {
        /// Key of the resource.
        key: ResourceKey,
    },

    /// The decoder or the render-thread conversion panicked.
    #[error("loading {key} panicked: {message}")]
    Panicked {
        /// Key of the resource.
        key: ResourceKey,
        /// The panic payload, when it was a string.
        message: String,
    },

    /// The request was dropped before it produced an outcome, for instance
    /// because its render thread went away.
    #[error("request for {key} was abandoned")]
    Abandoned {
        /// Key of the resource.
        key: ResourceKey,
    },
}

impl LoadError {
    pub(crate) fn decode(key: ResourceKey, cause: BoxError) -> Self {
        LoadError::Decode {
            key,
            cause: Arc::from(cause),
        }
    }

    pub(crate) fn panicked(key: ResourceKey, payload: &(dyn Any + Send)) -> Self {
        LoadError::Panicked {
            key,
            message: panic_message(payload),
        }
    }

    /// Key of the resource that failed to load.
    pub fn key(&self) -> &ResourceKey {
        match self {
            LoadError::Decode { key, .. }
            | LoadError::Empty { key }
            | LoadError::StreamUnavailable { key }
            | LoadError::Panicked { key, .. }
            | LoadError::Abandoned { key } => key,
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
