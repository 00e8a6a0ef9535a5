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

//! Plays a few seconds of a fake render loop while textures and meshes stream
//! in through the throttler.
//!
//! Usage: `sandbox [settings.ron]`

use anyhow::{Context, Result};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;
use vela_core::asset::{Asset, AssetHandle};
use vela_core::priority::{DEFAULT_PRIORITY, HIGHEST_PRIORITY, LOWEST_PRIORITY};
use vela_core::render::RenderQueue;
use vela_core::resource::{ResourceDescriptor, ResourceKey};
use vela_io::{callback_fn, Throttler, ThrottlerSettings};
use vela_lanes::{CpuMesh, CpuTexture, ObjLoaderLane, TextureLoaderLane};
use vela_telemetry::MetricsRegistry;

const FRAME: Duration = Duration::from_millis(16);
const MAX_FRAMES: u32 = 600;

/// Stand-in for a GPU texture; creating one is only legal on the render thread.
#[derive(Debug)]
struct GpuTexture {
    id: u32,
    width: u32,
    height: u32,
}
impl Asset for GpuTexture {}

/// Stand-in for GPU vertex and index buffers.
#[derive(Debug)]
struct GpuMesh {
    id: u32,
    triangles: usize,
}
impl Asset for GpuMesh {}

static NEXT_GPU_ID: AtomicU32 = AtomicU32::new(1);

fn checkerboard(size: u32) -> Result<Vec<u8>> {
    let img = RgbaImage::from_fn(size, size, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([40, 40, 40, 255])
        }
    });
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("Failed to encode the demo texture")?;
    Ok(bytes)
}

const CUBE_OBJ: &str = "\
v -1 -1 -1\nv 1 -1 -1\nv 1 1 -1\nv -1 1 -1\nv -1 -1 1\nv 1 -1 1\nv 1 1 1\nv -1 1 1\n\
f 1 2 3 4\nf 5 8 7 6\nf 1 5 6 2\nf 2 6 7 3\nf 3 7 8 4\nf 5 1 4 8\n";

fn asset(name: &str, bytes: Vec<u8>) -> Arc<ResourceDescriptor> {
    Arc::new(ResourceDescriptor::from_reader(
        ResourceKey::Asset(name.to_string()),
        Cursor::new(bytes),
    ))
}

fn build_throttler(settings: ThrottlerSettings, queue: &RenderQueue) -> Result<Throttler> {
    let render_thread: ThreadId = thread::current().id();

    let mut throttler = Throttler::new(
        settings,
        Arc::new(queue.sender()),
        Arc::new(MetricsRegistry::new()),
    )?;
    throttler.register_loader(TextureLoaderLane::with_upload(move |cpu: CpuTexture| {
        assert_eq!(thread::current().id(), render_thread, "texture upload off the render thread");
        GpuTexture {
            id: NEXT_GPU_ID.fetch_add(1, Ordering::Relaxed),
            width: cpu.width,
            height: cpu.height,
        }
    }));
    throttler.register_loader(ObjLoaderLane::with_upload(move |cpu: CpuMesh| {
        assert_eq!(thread::current().id(), render_thread, "mesh upload off the render thread");
        GpuMesh {
            id: NEXT_GPU_ID.fetch_add(1, Ordering::Relaxed),
            triangles: cpu.triangle_count(),
        }
    }));
    Ok(throttler)
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings = match std::env::args().nth(1) {
        Some(path) => ThrottlerSettings::load(&path)?,
        None => ThrottlerSettings::default(),
    };
    log::info!("Sandbox settings: {settings:?}");

    let queue = RenderQueue::new();
    let throttler = build_throttler(settings, &queue)?;
    let outstanding = Arc::new(Mutex::new(0usize));

    let texture_callback = |label: &'static str| {
        *outstanding.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        let loaded_left = Arc::clone(&outstanding);
        let failed_left = Arc::clone(&outstanding);
        callback_fn(
            move |texture: AssetHandle<GpuTexture>, descriptor: &ResourceDescriptor| {
                log::info!(
                    "[{label}] {descriptor} -> texture #{} ({}x{})",
                    texture.id,
                    texture.width,
                    texture.height
                );
                *loaded_left.lock().unwrap_or_else(|e| e.into_inner()) -= 1;
            },
            move |error, _| {
                log::error!("[{label}] {error}");
                *failed_left.lock().unwrap_or_else(|e| e.into_inner()) -= 1;
            },
        )
    };

    // Background scenery first, at low priority.
    let checker = checkerboard(64)?;
    for i in 0..6 {
        throttler.load(
            asset(&format!("scenery/{i}.png"), checker.clone()),
            texture_callback("scenery"),
            LOWEST_PRIORITY,
        )?;
    }

    // Two views want the same texture; only one decode happens.
    throttler.load(asset("hero.png", checker.clone()), texture_callback("hud"), DEFAULT_PRIORITY)?;
    throttler.load(
        asset("hero.png", checker.clone()),
        texture_callback("player"),
        HIGHEST_PRIORITY,
    )?;

    // A request nobody needs any more.
    let token = throttler.load(
        asset("skipped.png", checker.clone()),
        texture_callback("skipped"),
        LOWEST_PRIORITY,
    )?;
    token.cancel();
    *outstanding.lock().unwrap_or_else(|e| e.into_inner()) -= 1;

    // A mesh consumed through a future, from a helper thread.
    let mesh =
        throttler.load_future::<GpuMesh>(asset("cube.obj", CUBE_OBJ.as_bytes().to_vec()), 10)?;
    let waiter = thread::spawn(move || mesh.wait());

    let mut frame = 0;
    while frame < MAX_FRAMES {
        let ran = queue.drain();
        if ran > 0 {
            log::debug!("Frame {frame}: {ran} render task(s)");
        }
        if throttler.pending_count() == 0 {
            break;
        }
        thread::sleep(FRAME);
        frame += 1;
    }
    log::info!("Loads settled after {frame} frame(s)");

    match waiter.join() {
        Ok(Ok(mesh)) => log::info!("cube.obj -> mesh #{} ({} triangles)", mesh.id, mesh.triangles),
        Ok(Err(error)) => log::error!("cube.obj failed: {error}"),
        Err(_) => log::error!("The mesh waiter panicked"),
    }

    let left = *outstanding.lock().unwrap_or_else(|e| e.into_inner());
    if left > 0 {
        log::warn!("{left} callback(s) never fired");
    }

    for metric in throttler.metrics().get_namespace_metrics("throttle") {
        log::info!("{} = {:?}", metric.id, metric.value);
    }
    Ok(())
}
