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

//! The resource throttler: deduplicated, prioritized, bounded background loads.

mod async_loader;
mod cache;
mod callback;
mod error;
mod future;
mod limiter;
mod metrics;
mod pending;
mod policy;
mod settings;
mod throttler;

pub use self::async_loader::ResourceLoader;
pub use self::callback::{callback_fn, FnCallback, LoadCallback};
pub use self::error::{BoxError, LoadError, ThrottleError};
pub use self::future::{LoadFuture, LoadResult};
pub use self::limiter::ThreadLimiter;
pub use self::policy::{PriorityCancelable, PriorityCancelingLifoPolicy, ThreadPolicyProvider};
pub use self::settings::ThrottlerSettings;
pub use self::throttler::Throttler;
