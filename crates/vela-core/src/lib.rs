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

//! # Vela Core
//!
//! Foundational crate containing the contracts shared by the resource
//! throttling engine and the rendering framework around it: the [`asset::Asset`]
//! marker, value-keyed [`resource::ResourceDescriptor`]s, the priority range,
//! cancellation tokens, and the render-thread task queue.

#![warn(missing_docs)]

pub mod asset;
pub mod cancel;
pub mod priority;
pub mod render;
pub mod resource;
pub mod telemetry;
pub mod utils;

pub use cancel::CancellationToken;
pub use utils::timer::Stopwatch;
