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

//! # Vela Lanes
//!
//! Concrete [`ResourceLoader`](vela_io::ResourceLoader)s. Each lane decodes on
//! a background worker into plain CPU data, then hands that data to an upload
//! function on the render thread, where GPU objects may be created.

#![warn(missing_docs)]

pub mod mesh_loader_lane;
pub mod texture_loader_lane;

pub use mesh_loader_lane::{Aabb, CpuMesh, ObjLoaderLane};
pub use texture_loader_lane::{CpuTexture, TextureLoaderLane};
