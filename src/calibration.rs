// SPDX-License-Identifier: GPL-3.0-only

//! Camera intrinsics for depth-to-3D unprojection
//!
//! The streamed calibration payload is a flat 3x3 pinhole matrix in column-major
//! order, calibrated against some original resolution. Before use it is
//! transposed into row-major order and rescaled to the live video height. Only
//! the focal lengths (`[0]`, `[4]`) and principal point (`[2]`, `[5]`) take part
//! in unprojection; `[8]` is pinned to 1.
//!
//! These functions do not trap degenerate input: a zero live height or a zero
//! focal length produces NaN/infinite values. Callers gate on "metadata
//! received" instead.

use crate::constants::calibration::{
    BASELINE_PROBE_INDEX, BASELINE_THRESHOLD, LARGE_BASELINE_HEIGHT, SMALL_BASELINE_HEIGHT,
};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Resolution an intrinsic matrix was calibrated against
///
/// Either fully known or absent; never half set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalSize {
    pub width: u32,
    pub height: u32,
}

/// Row-major 3x3 intrinsic matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntrinsicMatrix {
    pub elements: [f32; 9],
}

impl IntrinsicMatrix {
    pub const IDENTITY: Self = Self {
        elements: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
    };

    /// Build from a column-major payload (as sent by the device)
    pub fn from_column_major(raw: &[f32; 9]) -> Self {
        Self { elements: *raw }.transpose()
    }

    pub fn transpose(&self) -> Self {
        let e = &self.elements;
        Self {
            elements: [e[0], e[3], e[6], e[1], e[4], e[7], e[2], e[5], e[8]],
        }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            elements: self.elements.map(|v| v * factor),
        }
    }

    pub fn fx(&self) -> f32 {
        self.elements[0]
    }

    pub fn fy(&self) -> f32 {
        self.elements[4]
    }

    pub fn cx(&self) -> f32 {
        self.elements[2]
    }

    pub fn cy(&self) -> f32 {
        self.elements[5]
    }
}

/// Inverse projection coefficients `[ifx, ify, itx, ity]`
///
/// Uploaded to the point cloud shader as `iK`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InverseProjection {
    pub ifx: f32,
    pub ify: f32,
    pub itx: f32,
    pub ity: f32,
}

impl InverseProjection {
    pub fn to_array(self) -> [f32; 4] {
        [self.ifx, self.ify, self.itx, self.ity]
    }

    /// Whether every coefficient is finite (false for degenerate calibrations)
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Height the raw matrix was calibrated against
///
/// Uses the reported original size when known, otherwise falls back to the
/// 256/640 compatibility heuristic on the raw (untransposed) payload.
pub fn reference_height(raw: &[f32; 9], original_size: Option<OriginalSize>) -> f32 {
    match original_size {
        Some(size) => size.height as f32,
        None if raw[BASELINE_PROBE_INDEX] < BASELINE_THRESHOLD => SMALL_BASELINE_HEIGHT,
        None => LARGE_BASELINE_HEIGHT,
    }
}

/// Transpose the raw payload and rescale it to the live video height
///
/// Must not be called before the first frame is decoded: a zero
/// `live_video_height` yields a zero matrix (and NaN coefficients downstream).
pub fn correct_intrinsic_matrix(
    raw: &[f32; 9],
    original_size: Option<OriginalSize>,
    live_video_height: u32,
) -> IntrinsicMatrix {
    let factor = live_video_height as f32 / reference_height(raw, original_size);
    let mut matrix = IntrinsicMatrix::from_column_major(raw).scaled(factor);
    matrix.elements[8] = 1.0;
    matrix
}

pub fn inverse_projection_coefficients(matrix: &IntrinsicMatrix) -> InverseProjection {
    let m = &matrix.elements;
    InverseProjection {
        ifx: 1.0 / m[0],
        ify: 1.0 / m[4],
        itx: -m[2] / m[0],
        ity: -m[5] / m[4],
    }
}

/// Pixel + depth to camera space; the camera looks down -Z
pub fn unproject(pixel_x: f32, pixel_y: f32, depth: f32, coeffs: &InverseProjection) -> Vec3 {
    Vec3::new(
        (coeffs.ifx * pixel_x + coeffs.itx) * depth,
        (coeffs.ify * pixel_y + coeffs.ity) * depth,
        -depth,
    )
}

/// Camera space back to pixel coordinates (inverse of [`unproject`])
pub fn project(point: Vec3, coeffs: &InverseProjection) -> (f32, f32) {
    let depth = -point.z;
    (
        (point.x / depth - coeffs.itx) / coeffs.ifx,
        (point.y / depth - coeffs.ity) / coeffs.ify,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: [f32; 9] = [500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0];

    #[test]
    fn test_known_original_size_scales_by_height_ratio() {
        let size = OriginalSize {
            width: 640,
            height: 480,
        };
        let matrix = correct_intrinsic_matrix(&RAW, Some(size), 960);

        let expected = IntrinsicMatrix::from_column_major(&RAW).scaled(2.0);
        for i in 0..8 {
            assert_eq!(matrix.elements[i], expected.elements[i], "element {}", i);
        }
        assert_eq!(matrix.elements[8], 1.0);
    }

    #[test]
    fn test_unknown_size_uses_small_baseline_below_threshold() {
        // raw[5] = 240 < 256
        assert_eq!(reference_height(&RAW, None), 256.0);

        let mut raw = RAW;
        raw[5] = 256.0;
        assert_eq!(reference_height(&raw, None), 640.0);
    }

    #[test]
    fn test_bottom_right_forced_to_one() {
        for height in [1, 3, 480, 1920] {
            let matrix = correct_intrinsic_matrix(&RAW, None, height);
            assert_eq!(matrix.elements[8], 1.0);
        }
    }

    #[test]
    fn test_transpose_moves_principal_point() {
        // Column-major payload: principal point lives in the last column slots
        let raw = [600.0, 0.0, 0.0, 0.0, 610.0, 0.0, 320.0, 240.0, 1.0];
        let matrix = IntrinsicMatrix::from_column_major(&raw);
        assert_eq!(matrix.cx(), 320.0);
        assert_eq!(matrix.cy(), 240.0);
        assert_eq!(matrix.fx(), 600.0);
        assert_eq!(matrix.fy(), 610.0);
    }

    #[test]
    fn test_inverse_coefficients() {
        let matrix = IntrinsicMatrix {
            elements: [500.0, 0.0, 250.0, 0.0, 400.0, 100.0, 0.0, 0.0, 1.0],
        };
        let ik = inverse_projection_coefficients(&matrix);
        assert_eq!(ik.ifx, 1.0 / 500.0);
        assert_eq!(ik.ify, 1.0 / 400.0);
        assert_eq!(ik.itx, -0.5);
        assert_eq!(ik.ity, -0.25);
        assert!(ik.is_finite());
    }

    #[test]
    fn test_degenerate_matrix_is_not_finite() {
        let matrix = correct_intrinsic_matrix(&RAW, None, 0);
        assert!(!inverse_projection_coefficients(&matrix).is_finite());
    }

    #[test]
    fn test_unproject_then_project_recovers_pixel() {
        let matrix = correct_intrinsic_matrix(&RAW, None, 480);
        let ik = inverse_projection_coefficients(&matrix);

        let point = unproject(123.0, 45.0, 1.7, &ik);
        assert_eq!(point.z, -1.7);

        let (x, y) = project(point, &ik);
        assert!((x - 123.0).abs() < 1e-3, "x = {}", x);
        assert!((y - 45.0).abs() < 1e-3, "y = {}", y);
    }
}
