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

//! Defines a lane for loading OBJ mesh assets.

use super::{Aabb, CpuMesh};
use ahash::AHashMap;
use anyhow::Context;
use vela_core::asset::Asset;
use vela_core::resource::ResourceDescriptor;
use vela_io::{BoxError, ResourceLoader};

/// Lane for loading Wavefront OBJ meshes.
///
/// Every object in the file is merged into one triangulated mesh with a
/// single index buffer. Material libraries are ignored.
#[derive(Clone)]
pub struct ObjLoaderLane<F> {
    upload: F,
}

impl ObjLoaderLane<fn(CpuMesh) -> CpuMesh> {
    /// A lane that delivers the decoded mesh as it is.
    pub fn cpu() -> Self {
        Self {
            upload: std::convert::identity,
        }
    }
}

impl<F> ObjLoaderLane<F> {
    /// A lane that builds its output with `upload` on the render thread.
    pub fn with_upload(upload: F) -> Self {
        Self { upload }
    }
}

impl<F, G> ResourceLoader for ObjLoaderLane<F>
where
    F: Fn(CpuMesh) -> G + Send + Sync + 'static,
    G: Asset,
{
    type Intermediate = CpuMesh;
    type Output = G;

    fn load_resource(&self, descriptor: &ResourceDescriptor) -> Result<Option<CpuMesh>, BoxError> {
        let bytes = descriptor.read_to_end()?;
        let obj_text = std::str::from_utf8(&bytes).context("OBJ file is not valid UTF-8")?;

        let (models, _materials) = tobj::load_obj_buf(
            &mut std::io::Cursor::new(obj_text),
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |_| Ok((Vec::new(), AHashMap::new())),
        )
        .with_context(|| format!("Failed to parse OBJ file {}", descriptor.key()))?;

        let mut merged = CpuMesh {
            positions: Vec::new(),
            normals: Some(Vec::new()),
            tex_coords: Some(Vec::new()),
            indices: Vec::new(),
            bounding_box: None,
        };
        for model in &models {
            let mesh = &model.mesh;
            let base = merged.positions.len() as u32;
            merged
                .positions
                .extend(mesh.positions.chunks_exact(3).map(|v| [v[0], v[1], v[2]]));
            merged.indices.extend(mesh.indices.iter().map(|i| i + base));

            // An attribute survives only if every object has it.
            if mesh.normals.is_empty() {
                merged.normals = None;
            }
            if let Some(normals) = merged.normals.as_mut() {
                normals.extend(mesh.normals.chunks_exact(3).map(|n| [n[0], n[1], n[2]]));
            }
            if mesh.texcoords.is_empty() {
                merged.tex_coords = None;
            }
            if let Some(tex_coords) = merged.tex_coords.as_mut() {
                tex_coords.extend(mesh.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]));
            }
        }
        if merged.positions.is_empty() {
            return Ok(None);
        }
        merged.bounding_box = Aabb::from_points(&merged.positions);

        log::debug!(
            "Decoded {}: {} object(s), {} triangle(s)",
            descriptor.key(),
            models.len(),
            merged.triangle_count()
        );
        Ok(Some(merged))
    }

    fn convert(&self, intermediate: CpuMesh) -> G {
        (self.upload)(intermediate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use vela_core::resource::ResourceKey;

    const QUAD: &str = "\
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";

    // Face indices are global to the file, so this only makes sense after QUAD.
    const TRIANGLE: &str = "\
o tri
v 0 0 2
v 1 0 2
v 0 1 2
f 5 6 7
";

    fn descriptor(text: &str) -> ResourceDescriptor {
        ResourceDescriptor::from_reader(
            ResourceKey::Asset("mesh.obj".into()),
            Cursor::new(text.as_bytes().to_vec()),
        )
    }

    #[test]
    fn quads_are_triangulated() {
        let mesh = ObjLoaderLane::cpu()
            .load_resource(&descriptor(QUAD))
            .unwrap()
            .unwrap();

        assert_eq!(mesh.positions.len(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.tex_coords.as_ref().map(Vec::len), Some(4));
        assert!(mesh.normals.is_none());
        let bounds = mesh.bounding_box.unwrap();
        assert_eq!(bounds.max, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn objects_are_merged_with_offset_indices() {
        let text = format!("{QUAD}{TRIANGLE}");
        let mesh = ObjLoaderLane::cpu()
            .load_resource(&descriptor(&text))
            .unwrap()
            .unwrap();

        assert_eq!(mesh.positions.len(), 7);
        assert_eq!(mesh.triangle_count(), 3);
        assert!(mesh.indices[6..].iter().all(|&i| i >= 4));
        // The triangle has no texture coordinates, so the merged mesh has none.
        assert!(mesh.tex_coords.is_none());
        assert_eq!(mesh.bounding_box.unwrap().max[2], 2.0);
    }

    #[test]
    fn a_file_without_geometry_yields_nothing() {
        let result = ObjLoaderLane::cpu()
            .load_resource(&descriptor("# just a comment\n"))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let descriptor = ResourceDescriptor::from_reader(
            ResourceKey::Asset("mesh.obj".into()),
            Cursor::new(vec![0xff, 0xfe, 0x00]),
        );
        assert!(ObjLoaderLane::cpu().load_resource(&descriptor).is_err());
    }
}
