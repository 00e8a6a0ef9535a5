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

use anyhow::Result;
use image::{ImageFormat, Rgba, RgbaImage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use vela_core::asset::AssetHandle;
use vela_core::render::RenderQueue;
use vela_core::resource::ResourceDescriptor;
use vela_io::{LoadFuture, LoadResult, Throttler, ThrottlerSettings};
use vela_lanes::{CpuMesh, CpuTexture, ObjLoaderLane, TextureLoaderLane};
use vela_telemetry::MetricsRegistry;

fn throttler(queue: &RenderQueue) -> Result<Throttler> {
    let mut throttler = Throttler::new(
        ThrottlerSettings::default(),
        Arc::new(queue.sender()),
        Arc::new(MetricsRegistry::new()),
    )?;
    throttler.register_loader(TextureLoaderLane::cpu());
    throttler.register_loader(ObjLoaderLane::cpu());
    Ok(throttler)
}

fn resolve<T: vela_core::asset::Asset>(
    queue: &RenderQueue,
    future: &mut LoadFuture<T>,
) -> LoadResult<T> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        queue.drain();
        if let Some(outcome) = future.wait_timeout(Duration::from_millis(1)) {
            return outcome;
        }
        assert!(Instant::now() < deadline, "load never finished");
    }
}

#[test]
fn textures_and_meshes_load_from_disk() -> Result<()> {
    // --- 1. Setup: real files in a temporary asset directory ---
    let dir = tempdir()?;
    let mut img = RgbaImage::new(4, 2);
    img.put_pixel(3, 1, Rgba([1, 2, 3, 4]));
    img.save_with_format(dir.path().join("tex.png"), ImageFormat::Png)?;
    std::fs::write(
        dir.path().join("tri.obj"),
        "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n",
    )?;

    let queue = RenderQueue::new();
    let throttler = throttler(&queue)?;

    // --- 2. Request both resources, the texture twice ---
    let mut first = throttler.load_future::<CpuTexture>(
        Arc::new(ResourceDescriptor::open_asset(dir.path(), "tex.png")?),
        5,
    )?;
    let mut second = throttler.load_future::<CpuTexture>(
        Arc::new(ResourceDescriptor::open_asset(dir.path(), "tex.png")?),
        9,
    )?;
    let mut mesh = throttler.load_future::<CpuMesh>(
        Arc::new(ResourceDescriptor::open(dir.path().join("tri.obj"))?),
        0,
    )?;

    // --- 3. Assert ---
    let first = resolve(&queue, &mut first)?;
    let second = resolve(&queue, &mut second)?;
    assert!(AssetHandle::ptr_eq(&first, &second));
    assert_eq!((first.width, first.height), (4, 2));
    assert_eq!(&first.pixels[first.pixels.len() - 4..], &[1, 2, 3, 4]);

    let mesh = resolve(&queue, &mut mesh)?;
    assert_eq!(mesh.triangle_count(), 1);
    assert_eq!(mesh.normals.as_ref().map(Vec::len), Some(3));

    assert_eq!(throttler.pending_count(), 0);
    Ok(())
}

#[test]
fn a_corrupt_texture_fails_the_load() -> Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("broken.png"), b"definitely not a png")?;

    let queue = RenderQueue::new();
    let throttler = throttler(&queue)?;
    let mut future = throttler.load_future::<CpuTexture>(
        Arc::new(ResourceDescriptor::open_asset(dir.path(), "broken.png")?),
        0,
    )?;

    let error = resolve(&queue, &mut future).unwrap_err();
    assert!(error.to_string().contains("broken.png"));
    Ok(())
}
