// SPDX-License-Identifier: GPL-3.0-only

//! Container of the renderables of one video
//!
//! Children are never patched in place: a rebuild detaches every child and
//! attaches new ones, so buffers sized for an old resolution cannot survive.

use super::geometry::GridGeometry;
use crate::constants::rendering::SPHERE_RADIUS;
use glam::{Mat4, Vec3};
use rand::Rng;
use std::sync::Arc;

/// Instanced spheres placed on sampled points
#[derive(Debug, Clone, PartialEq)]
pub struct SphereInstances {
    pub radius: f32,
    pub transforms: Vec<Mat4>,
}

impl SphereInstances {
    /// `count` instances scattered in the unit cube until the first update
    pub fn scattered(count: usize, rng: &mut impl Rng) -> Self {
        let transforms = (0..count)
            .map(|_| Mat4::from_translation(Vec3::new(rng.random(), rng.random(), rng.random())))
            .collect();
        Self {
            radius: SPHERE_RADIUS,
            transforms,
        }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn set_position(&mut self, index: usize, position: Vec3) {
        if let Some(transform) = self.transforms.get_mut(index) {
            *transform = Mat4::from_translation(position);
        }
    }

    pub fn position(&self, index: usize) -> Option<Vec3> {
        self.transforms.get(index).map(|t| t.w_axis.truncate())
    }
}

#[derive(Debug, Clone)]
pub enum Renderable {
    Points(Arc<GridGeometry>),
    Mesh {
        geometry: Arc<GridGeometry>,
        wireframe: bool,
    },
    Spheres {
        /// Per-pixel points backing the instances
        geometry: Arc<GridGeometry>,
        instances: SphereInstances,
    },
}

impl Renderable {
    pub fn geometry(&self) -> &Arc<GridGeometry> {
        match self {
            Renderable::Points(geometry) => geometry,
            Renderable::Mesh { geometry, .. } => geometry,
            Renderable::Spheres { geometry, .. } => geometry,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneChild {
    pub id: u64,
    pub renderable: Renderable,
}

#[derive(Debug, Default)]
pub struct VideoObject {
    children: Vec<SceneChild>,
    next_id: u64,
}

impl VideoObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, renderable: Renderable) -> u64 {
        self.next_id += 1;
        self.children.push(SceneChild {
            id: self.next_id,
            renderable,
        });
        self.next_id
    }

    /// Detach every child, returning them
    pub fn clear(&mut self) -> Vec<SceneChild> {
        std::mem::take(&mut self.children)
    }

    pub fn children(&self) -> &[SceneChild] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [SceneChild] {
        &mut self.children
    }

    pub fn contains(&self, id: u64) -> bool {
        self.children.iter().any(|child| child.id == id)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn spheres_mut(&mut self) -> Option<&mut SphereInstances> {
        self.children.iter_mut().find_map(|child| match &mut child.renderable {
            Renderable::Spheres { instances, .. } => Some(instances),
            _ => None,
        })
    }
}
