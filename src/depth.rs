// SPDX-License-Identifier: GPL-3.0-only

//! Hue-encoded depth decoding
//!
//! The device packs a colour image and a depth image side by side into one
//! composite video frame. Depth is written into the hue of the depth half,
//! wrapped over [`HUE_DEPTH_CYCLES`] cycles. Decoding samples the off-screen
//! raster snapshot of that half.
//!
//! Captured pixels are read with a one byte shift ([`CAPTURE_CHANNEL_OFFSET`]):
//! red, green and blue are taken from bytes 1..=3 of each 4-byte pixel. The
//! shader does the same, so this must not be "fixed" here.

use crate::backends::{FrameSize, VideoFrame};
use crate::constants::depth::{CAPTURE_CHANNEL_OFFSET, HUE_DEPTH_CYCLES, HUE_EPSILON};
use image::{ImageBuffer, Rgba, RgbaImage};

/// Off-screen raster snapshot of the depth half of the latest frame
#[derive(Debug, Clone, Default)]
pub struct RasterBuffer {
    image: RgbaImage,
}

impl RasterBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Wrap raw 4-byte pixels. Returns None when the length does not match.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, data).map(Self::from_image)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Copy the left (depth) half of a composite frame into this buffer
    ///
    /// Frames with a zero dimension are ignored and leave the previous
    /// snapshot untouched. Returns whether a snapshot was taken.
    pub fn rasterize(&mut self, frame: &VideoFrame) -> bool {
        let logical = frame.size().logical();
        if logical.is_empty() {
            return false;
        }

        let Some(composite) = ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(
            frame.width,
            frame.height,
            &frame.data[..],
        ) else {
            tracing::warn!(
                width = frame.width,
                height = frame.height,
                len = frame.data.len(),
                "Frame buffer does not match its dimensions, skipping snapshot"
            );
            return false;
        };

        self.image = RgbaImage::from_fn(logical.width, logical.height, |x, y| {
            *composite.get_pixel(x, y)
        });
        true
    }

    /// Shifted RGB triple (0..1) of the pixel at `(x, y)`
    ///
    /// Bytes past the end of the buffer read as 0.
    fn shifted_rgb(&self, x: u32, y: u32) -> [f32; 3] {
        let data = self.image.as_raw();
        let base = (y as usize * self.width() as usize + x as usize) * 4 + CAPTURE_CHANNEL_OFFSET;
        let channel = |i: usize| data.get(base + i).copied().unwrap_or(0) as f32 / 255.0;
        [channel(0), channel(1), channel(2)]
    }
}

/// Hue (0..1) of an RGB triple, branch-free formulation shared with the shader
pub fn rgb_to_hue(r: f32, g: f32, b: f32) -> f32 {
    const K: [f32; 4] = [0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0];

    let p = mix4(
        [b, g, K[3], K[2]],
        [g, b, K[0], K[1]],
        step(b, g),
    );
    let q = mix4(
        [p[0], p[1], p[3], r],
        [r, p[1], p[2], p[0]],
        step(p[0], r),
    );

    let d = q[0] - q[3].min(q[1]);
    (q[2] + (q[3] - q[1]) / (6.0 * d + HUE_EPSILON)).abs()
}

fn step(edge: f32, x: f32) -> f32 {
    if x < edge { 0.0 } else { 1.0 }
}

fn mix4(x: [f32; 4], y: [f32; 4], a: f32) -> [f32; 4] {
    std::array::from_fn(|i| (1.0 - a) * x[i] + a * y[i])
}

/// Sample the hue at normalized coordinates `(u, v)`
///
/// Coordinates are clamped to [0, 1] and mapped to the nearest pixel at or
/// below them. An empty raster samples as hue 0.
pub fn sample_hue(raster: &RasterBuffer, u: f32, v: f32) -> f32 {
    if raster.is_empty() {
        return 0.0;
    }

    let u = u.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);
    let x = ((u * raster.width() as f32).floor() as u32).min(raster.width() - 1);
    let y = ((v * raster.height() as f32).floor() as u32).min(raster.height() - 1);

    let [r, g, b] = raster.shifted_rgb(x, y);
    rgb_to_hue(r, g, b)
}

/// Decode the depth stored at a pixel of the logical (depth) frame
///
/// Samples at the pixel centre `(pixel + 0.5) / frame_size` and unwraps the
/// hue over [`HUE_DEPTH_CYCLES`] cycles.
pub fn decode_depth(raster: &RasterBuffer, pixel_x: f32, pixel_y: f32, frame_size: FrameSize) -> f32 {
    let u = (pixel_x + 0.5) / frame_size.width as f32;
    let v = (pixel_y + 0.5) / frame_size.height as f32;
    HUE_DEPTH_CYCLES * sample_hue(raster, u, v)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::RasterBuffer;

    /// RGB (0..1) with the given hue at full saturation and value
    pub fn hue_to_rgb(hue: f32) -> [f32; 3] {
        let h = hue.rem_euclid(1.0) * 6.0;
        let x = 1.0 - ((h % 2.0) - 1.0).abs();
        match h as u32 {
            0 => [1.0, x, 0.0],
            1 => [x, 1.0, 0.0],
            2 => [0.0, 1.0, x],
            3 => [0.0, x, 1.0],
            4 => [x, 0.0, 1.0],
            _ => [1.0, 0.0, x],
        }
    }

    /// Raster whose every pixel decodes to `rgb`, honouring the capture shift
    pub fn uniform_raster(width: u32, height: u32, rgb: [u8; 3]) -> RasterBuffer {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[255, rgb[0], rgb[1], rgb[2]]);
        }
        RasterBuffer::from_raw(width, height, data).unwrap()
    }
}
