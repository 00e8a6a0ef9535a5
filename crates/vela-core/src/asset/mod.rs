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

//! Provides the foundational traits and primitive types for Vela's asset system.
//!
//! This module defines the "common language" for everything the throttler hands
//! back to the application. It has no knowledge of how assets are decoded or
//! scheduled; that lives in `vela-io` and `vela-lanes`.

mod handle;

pub use handle::*;

/// A marker trait for types that can be delivered by the resource loader.
///
/// The supertraits enforce the guarantees the loader relies on:
/// - `Send` + `Sync`: a loaded asset is shared between the render thread and
///   every callback that asked for it.
/// - `'static`: the asset does not borrow from the request that produced it.
///
/// # Examples
///
/// ```
/// use vela_core::asset::Asset;
///
/// struct Texture {
///     // ... fields
/// }
///
/// impl Asset for Texture {}
/// ```
pub trait Asset: Send + Sync + 'static {}
