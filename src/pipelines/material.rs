// SPDX-License-Identifier: GPL-3.0-only

//! Point cloud material
//!
//! The shader consumes a fixed uniform block; every uniform is a named,
//! typed field of [`PointCloudUniforms`] so the block can be uploaded as raw
//! bytes with `bytemuck::bytes_of`.

use crate::backends::{FrameSize, VideoFrame};
use crate::calibration::InverseProjection;
use crate::constants::rendering::MAX_NOISE_SEED;
use rand::Rng;
use std::sync::Arc;

/// Uniform block of the point cloud shader
///
/// Only 4-byte members, laid out in vec4-sized groups.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointCloudUniforms {
    /// `iK`: [ifx, ify, itx, ity]
    pub inverse_projection: [f32; 4],
    /// `singleColorVec` (linear RGB)
    pub single_color: [f32; 3],
    pub scale: f32,
    /// `texSize`: composite frame size
    pub tex_size: [i32; 2],
    pub point_size: f32,
    pub opacity: f32,
    pub saturation: f32,
    pub use_single_color: u32,
    pub render_nth_point: i32,
    pub depth_threshold_filter: f32,
    /// Absolute depth range (near, far)
    pub absolute_depth_range_filter: [f32; 2],
    pub use_noise: u32,
    pub noise_strength: f32,
    pub seeds: [f32; 3],
    pub _padding: f32,
}

impl Default for PointCloudUniforms {
    fn default() -> Self {
        Self {
            inverse_projection: [0.0; 4],
            single_color: [1.0, 1.0, 1.0],
            scale: 1.0,
            tex_size: [0, 0],
            point_size: 0.1,
            opacity: 0.5,
            saturation: 3.0,
            use_single_color: 1,
            render_nth_point: 1,
            depth_threshold_filter: 1.0,
            absolute_depth_range_filter: [0.1, 2.8],
            use_noise: 0,
            noise_strength: 0.0,
            seeds: [0.0; 3],
            _padding: 0.0,
        }
    }
}

impl PointCloudUniforms {
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Shader material shared by the renderables of one video
#[derive(Debug, Clone, Default)]
pub struct PointCloudMaterial {
    pub uniforms: PointCloudUniforms,
    /// `texImg`: the latest composite frame
    pub texture: Option<Arc<VideoFrame>>,
    pub wireframe: bool,
}

impl PointCloudMaterial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the size and calibration of a freshly (re)sized stream
    pub fn set_video(&mut self, texture_size: FrameSize, inverse_projection: InverseProjection) {
        self.uniforms.tex_size = [texture_size.width as i32, texture_size.height as i32];
        self.uniforms.inverse_projection = inverse_projection.to_array();
    }

    pub fn set_texture(&mut self, frame: Option<Arc<VideoFrame>>) {
        self.texture = frame;
    }

    pub fn set_scale(&mut self, value: f32) {
        self.uniforms.scale = value;
    }

    pub fn set_point_size(&mut self, value: f32) {
        self.uniforms.point_size = value;
    }

    pub fn set_opacity(&mut self, value: f32) {
        self.uniforms.opacity = value;
    }

    pub fn set_saturation(&mut self, value: f32) {
        self.uniforms.saturation = value;
    }

    /// Set the single colour from a `#rrggbb` string
    ///
    /// Returns false (and keeps the colour) when the string does not parse.
    pub fn set_single_color(&mut self, hex: &str) -> bool {
        match parse_hex_color(hex) {
            Some(rgb) => {
                self.uniforms.single_color = rgb.map(|c| (c * 1000.0).round() / 1000.0);
                true
            }
            None => false,
        }
    }

    pub fn set_use_single_color(&mut self, value: bool) {
        self.uniforms.use_single_color = value as u32;
    }

    pub fn set_render_nth_point(&mut self, value: i32) {
        self.uniforms.render_nth_point = value.max(1);
    }

    pub fn set_depth_threshold_filter(&mut self, value: f32) {
        self.uniforms.depth_threshold_filter = value;
    }

    pub fn set_absolute_depth_range_filter_x(&mut self, value: f32) {
        self.uniforms.absolute_depth_range_filter[0] = value;
    }

    pub fn set_absolute_depth_range_filter_y(&mut self, value: f32) {
        self.uniforms.absolute_depth_range_filter[1] = value;
    }

    pub fn set_use_noise(&mut self, value: bool) {
        self.uniforms.use_noise = value as u32;
    }

    pub fn set_noise_strength(&mut self, value: f32) {
        self.uniforms.noise_strength = value;
    }

    /// Draw three fresh noise seeds in `[0, 0.1)`
    pub fn reseed(&mut self, rng: &mut impl Rng) {
        self.uniforms.seeds = std::array::from_fn(|_| rng.random::<f32>() * MAX_NOISE_SEED);
    }
}

/// `#rrggbb` (or `rrggbb`) to linear RGB in 0..1
pub fn parse_hex_color(hex: &str) -> Option<[f32; 3]> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }

    let mut rgb = [0.0; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        let byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16).ok()?;
        *channel = srgb_to_linear(byte as f32 / 255.0);
    }
    Some(rgb)
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_block_has_no_padding_holes() {
        assert_eq!(std::mem::size_of::<PointCloudUniforms>() % 16, 0);
        assert_eq!(
            PointCloudUniforms::default().as_bytes().len(),
            std::mem::size_of::<PointCloudUniforms>()
        );
    }

    #[test]
    fn test_defaults() {
        let u = PointCloudUniforms::default();
        assert_eq!(u.scale, 1.0);
        assert_eq!(u.point_size, 0.1);
        assert_eq!(u.opacity, 0.5);
        assert_eq!(u.saturation, 3.0);
        assert_eq!(u.single_color, [1.0, 1.0, 1.0]);
        assert_eq!(u.use_single_color, 1);
        assert_eq!(u.render_nth_point, 1);
        assert_eq!(u.absolute_depth_range_filter, [0.1, 2.8]);
        assert_eq!(u.use_noise, 0);
    }

    #[test]
    fn test_single_color_is_linear_and_rounded() {
        let mut material = PointCloudMaterial::new();
        assert!(material.set_single_color("#ff8000"));
        let [r, g, b] = material.uniforms.single_color;
        assert_eq!(r, 1.0);
        assert_eq!(g, 0.216);
        assert_eq!(b, 0.0);

        assert!(!material.set_single_color("orange"));
        assert_eq!(material.uniforms.single_color[1], 0.216);
    }

    #[test]
    fn test_reseed_stays_in_range() {
        let mut material = PointCloudMaterial::new();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..100 {
            material.reseed(&mut rng);
            assert!(
                material
                    .uniforms
                    .seeds
                    .iter()
                    .all(|s| (0.0..MAX_NOISE_SEED).contains(s))
            );
        }
    }

    #[test]
    fn test_set_video_publishes_size_and_ik() {
        let mut material = PointCloudMaterial::new();
        let ik = InverseProjection {
            ifx: 0.5,
            ify: 0.25,
            itx: -1.0,
            ity: -2.0,
        };
        material.set_video(FrameSize::new(1280, 480), ik);
        assert_eq!(material.uniforms.tex_size, [1280, 480]);
        assert_eq!(material.uniforms.inverse_projection, [0.5, 0.25, -1.0, -2.0]);
    }
}
