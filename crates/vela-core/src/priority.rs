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

//! The priority range accepted by asynchronous load requests.
//!
//! Every request has a priority: the larger the number, the sooner it runs.
//! A simple way to generate priorities is to score resources from 0 to 1 and
//! map that onto [`LOWEST_PRIORITY`]..=[`HIGHEST_PRIORITY`].

/// Number of values at the bottom of the `i32` range held back for internal
/// sentinels. Raising it narrows the range available to applications.
pub const RESERVED_PRIORITIES: i32 = 1024;

/// The lowest priority an application may request.
pub const LOWEST_PRIORITY: i32 = i32::MIN + RESERVED_PRIORITIES;

/// The highest priority an application may request.
pub const HIGHEST_PRIORITY: i32 = i32::MAX;

/// The priority used when a caller does not supply one.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Priority of a pending request whose callback list is empty. Sits in the
/// reserved band, below anything an application can ask for.
pub const EMPTY_LIST_PRIORITY: i32 = LOWEST_PRIORITY - 1;

/// Returns `true` if `priority` is inside the application range.
pub fn is_valid_priority(priority: i32) -> bool {
    (LOWEST_PRIORITY..=HIGHEST_PRIORITY).contains(&priority)
}
