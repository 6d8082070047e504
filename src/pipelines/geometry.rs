// SPDX-License-Identifier: GPL-3.0-only

//! Index/attribute buffers for the per-pixel renderables
//!
//! Vertex positions are never stored: the shader reconstructs each vertex from
//! its `vertexIdx` attribute, the depth texture and `iK`. Buffers are sized to
//! the logical video resolution and always rebuilt from scratch.

use crate::backends::FrameSize;

/// Primitive a geometry is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Points,
    Triangles,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry {
    pub size: FrameSize,
    pub topology: Topology,
    /// Flat ascending per-vertex index (`vertexIdx`)
    pub vertex_index: Vec<f32>,
    pub indices: Vec<u32>,
}

impl GridGeometry {
    pub fn vertex_count(&self) -> usize {
        self.vertex_index.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        match self.topology {
            Topology::Triangles => self.indices.len() / 3,
            Topology::Points => 0,
        }
    }
}

fn vertex_index(size: FrameSize) -> Vec<f32> {
    (0..size.pixel_count()).map(|i| i as f32).collect()
}

/// One point per pixel, index buffer `i -> i`
pub fn build_points(width: u32, height: u32) -> GridGeometry {
    let size = FrameSize::new(width, height);
    GridGeometry {
        size,
        topology: Topology::Points,
        vertex_index: vertex_index(size),
        indices: (0..size.pixel_count() as u32).collect(),
    }
}

/// Two triangles per grid cell
///
/// For the cell whose lower-left corner is `(row, col)`:
/// `{bl, tr, tl}` then `{bl, br, tr}`. The winding is relied upon by
/// back-face culling downstream. A zero dimension yields no triangles.
pub fn build_mesh(width: u32, height: u32) -> GridGeometry {
    let size = FrameSize::new(width, height);
    let cols = width as usize;
    let rows = height as usize;

    let cells = cols.saturating_sub(1) * rows.saturating_sub(1);
    let mut indices = Vec::with_capacity(cells * 6);

    for row in 1..rows {
        for col in 0..cols.saturating_sub(1) {
            let tl = ((row - 1) * cols + col) as u32;
            let tr = tl + 1;
            let bl = (row * cols + col) as u32;
            let br = bl + 1;

            indices.extend_from_slice(&[bl, tr, tl, bl, br, tr]);
        }
    }

    GridGeometry {
        size,
        topology: Topology::Triangles,
        vertex_index: vertex_index(size),
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_index_count_and_bounds() {
        for (w, h) in [(2, 2), (4, 3), (7, 5), (64, 48)] {
            let mesh = build_mesh(w, h);
            assert_eq!(mesh.index_count(), ((w - 1) * (h - 1) * 6) as usize);
            assert!(mesh.indices.iter().all(|&i| i < w * h));
            assert_eq!(mesh.vertex_count(), (w * h) as usize);
        }
    }

    #[test]
    fn test_mesh_winding() {
        // 2x2 grid: tl=0 tr=1 bl=2 br=3
        let mesh = build_mesh(2, 2);
        assert_eq!(mesh.indices, vec![2, 1, 0, 2, 3, 1]);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_empty_sizes_build_nothing() {
        for (w, h) in [(0, 0), (0, 5), (5, 0)] {
            assert!(build_mesh(w, h).indices.is_empty());
            assert!(build_points(w, h).indices.is_empty());
        }
        // A single row or column has no cells
        assert!(build_mesh(1, 9).indices.is_empty());
        assert!(build_mesh(9, 1).indices.is_empty());
    }

    #[test]
    fn test_points_are_identity() {
        let points = build_points(3, 2);
        assert_eq!(points.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(points.vertex_index, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(points.triangle_count(), 0);
    }
}
