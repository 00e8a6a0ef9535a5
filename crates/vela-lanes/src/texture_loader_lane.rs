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

//! Texture loading.

use anyhow::Context;
use image::ImageFormat;
use vela_core::asset::Asset;
use vela_core::resource::ResourceDescriptor;
use vela_io::{BoxError, ResourceLoader};

/// A decoded RGBA8 image in sRGB space, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuTexture {
    /// Tightly packed RGBA8 rows, top row first.
    pub pixels: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Asset for CpuTexture {}

/// A lane dedicated to decoding bitmap files on a background worker.
///
/// `upload` runs on the render thread and turns the decoded pixels into the
/// application's texture type.
#[derive(Clone)]
pub struct TextureLoaderLane<F> {
    upload: F,
}

impl TextureLoaderLane<fn(CpuTexture) -> CpuTexture> {
    /// A lane that delivers the decoded pixels as they are.
    pub fn cpu() -> Self {
        Self {
            upload: std::convert::identity,
        }
    }
}

impl<F> TextureLoaderLane<F> {
    /// A lane that builds its output with `upload` on the render thread.
    pub fn with_upload(upload: F) -> Self {
        Self { upload }
    }
}

impl<F, G> ResourceLoader for TextureLoaderLane<F>
where
    F: Fn(CpuTexture) -> G + Send + Sync + 'static,
    G: Asset,
{
    type Intermediate = CpuTexture;
    type Output = G;

    fn load_resource(
        &self,
        descriptor: &ResourceDescriptor,
    ) -> Result<Option<CpuTexture>, BoxError> {
        let bytes = descriptor.read_to_end()?;
        if bytes.is_empty() {
            return Ok(None);
        }

        // Trust the extension when there is one, otherwise sniff the header.
        let format = descriptor
            .extension()
            .and_then(|ext| ImageFormat::from_extension(ext.as_str()));
        let img = match format {
            Some(format) => image::load_from_memory_with_format(&bytes, format),
            None => image::load_from_memory(&bytes),
        }
        .with_context(|| format!("Failed to decode image {}", descriptor.key()))?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::debug!("Decoded {} ({width}x{height})", descriptor.key());

        Ok(Some(CpuTexture {
            pixels: rgba.into_raw(),
            width,
            height,
        }))
    }

    fn convert(&self, intermediate: CpuTexture) -> G {
        (self.upload)(intermediate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;
    use vela_core::resource::ResourceKey;

    fn png_bytes() -> Vec<u8> {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 255, 128]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn descriptor(name: &str, bytes: Vec<u8>) -> ResourceDescriptor {
        ResourceDescriptor::from_reader(ResourceKey::Asset(name.into()), Cursor::new(bytes))
    }

    #[test]
    fn decodes_png_to_rgba8() {
        let lane = TextureLoaderLane::cpu();
        let texture = lane
            .load_resource(&descriptor("tex.png", png_bytes()))
            .unwrap()
            .unwrap();

        assert_eq!((texture.width, texture.height), (2, 1));
        assert_eq!(texture.pixels, vec![255, 0, 0, 255, 0, 0, 255, 128]);
    }

    #[test]
    fn sniffs_the_format_without_an_extension() {
        let lane = TextureLoaderLane::cpu();
        let texture = lane
            .load_resource(&descriptor("no_extension", png_bytes()))
            .unwrap();
        assert!(texture.is_some());
    }

    #[test]
    fn empty_streams_produce_nothing() {
        let lane = TextureLoaderLane::cpu();
        assert!(lane
            .load_resource(&descriptor("tex.png", Vec::new()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let lane = TextureLoaderLane::cpu();
        let error = lane
            .load_resource(&descriptor("tex.png", b"not an image".to_vec()))
            .unwrap_err();
        assert!(error.to_string().contains("asset:tex.png"));
    }

    #[test]
    fn upload_runs_in_convert() {
        struct GpuTexture(u32);
        impl Asset for GpuTexture {}

        let lane =
            TextureLoaderLane::with_upload(|cpu: CpuTexture| GpuTexture(cpu.width * cpu.height));
        let cpu = lane
            .load_resource(&descriptor("tex.png", png_bytes()))
            .unwrap()
            .unwrap();
        assert_eq!(lane.convert(cpu).0, 2);
    }
}
