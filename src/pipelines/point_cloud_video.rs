// SPDX-License-Identifier: GPL-3.0-only

//! Renderable point cloud of one video source
//!
//! Whenever the source reports a resolution or calibration change, every child
//! of the [`VideoObject`] is detached and the geometry for the current
//! rendering mode is rebuilt at the new logical size.

use super::geometry::{build_mesh, build_points};
use super::material::PointCloudMaterial;
use super::video_object::{Renderable, SphereInstances, VideoObject};
use crate::constants::rendering::SPHERE_COUNT;
use crate::presets::ViewerOptions;
use crate::video::{SourceUpdate, VideoSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// How the cloud is drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderingMode {
    #[default]
    Points,
    Mesh,
    MeshWireframe,
    Spheres,
}

impl RenderingMode {
    pub const ALL: [RenderingMode; 4] = [
        RenderingMode::Points,
        RenderingMode::Mesh,
        RenderingMode::MeshWireframe,
        RenderingMode::Spheres,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderingMode::Points => "points",
            RenderingMode::Mesh => "mesh",
            RenderingMode::MeshWireframe => "mesh-wireframe",
            RenderingMode::Spheres => "spheres",
        }
    }
}

impl fmt::Display for RenderingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RenderingMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown rendering mode '{}' (expected points, mesh, mesh-wireframe or spheres)",
                    s
                )
            })
    }
}

pub struct PointCloudVideo {
    source: VideoSource,
    material: PointCloudMaterial,
    object: VideoObject,
    mode: RenderingMode,
    sphere_count: usize,
}

impl PointCloudVideo {
    pub fn new(source: VideoSource) -> Self {
        Self {
            source,
            material: PointCloudMaterial::new(),
            object: VideoObject::new(),
            mode: RenderingMode::default(),
            sphere_count: SPHERE_COUNT,
        }
    }

    pub fn with_sphere_count(mut self, count: usize) -> Self {
        self.sphere_count = count;
        self
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut VideoSource {
        &mut self.source
    }

    pub fn material(&self) -> &PointCloudMaterial {
        &self.material
    }

    pub fn material_mut(&mut self) -> &mut PointCloudMaterial {
        &mut self.material
    }

    pub fn object(&self) -> &VideoObject {
        &self.object
    }

    pub fn rendering_mode(&self) -> RenderingMode {
        self.mode
    }

    pub fn set_rendering_mode(&mut self, mode: RenderingMode) {
        if mode == self.mode {
            return;
        }
        debug!(source = %self.source.id(), mode = %mode, "Rendering mode changed");
        self.mode = mode;
        self.rebuild();
    }

    /// Discard all children and build fresh geometry for the current size
    ///
    /// Nothing is attached while the logical size is empty.
    pub fn rebuild(&mut self) {
        let released = self.object.clear();
        let size = self.source.video_size();
        if size.is_empty() {
            debug!(source = %self.source.id(), released = released.len(), "No video size, object left empty");
            return;
        }

        self.material.set_video(
            self.source.texture_size(),
            self.source.inverse_projection().unwrap_or_default(),
        );
        self.material.wireframe = self.mode == RenderingMode::MeshWireframe;

        let renderable = match self.mode {
            RenderingMode::Points => Renderable::Points(Arc::new(build_points(size.width, size.height))),
            RenderingMode::Mesh | RenderingMode::MeshWireframe => Renderable::Mesh {
                geometry: Arc::new(build_mesh(size.width, size.height)),
                wireframe: self.mode == RenderingMode::MeshWireframe,
            },
            RenderingMode::Spheres => Renderable::Spheres {
                geometry: Arc::new(build_points(size.width, size.height)),
                instances: SphereInstances::scattered(self.sphere_count, &mut rand::rng()),
            },
        };

        let indices = renderable.geometry().index_count();
        self.object.add(renderable);
        debug!(
            source = %self.source.id(),
            size = %size,
            mode = %self.mode,
            indices,
            "Geometry rebuilt"
        );
    }

    /// Move every sphere onto its sampled point
    pub fn update_spheres(&mut self) {
        let source = &self.source;
        let Some(spheres) = self.object.spheres_mut() else {
            return;
        };
        if !source.is_ready() {
            return;
        }
        for i in 0..spheres.len() {
            let point = source.get_point(i);
            if point.is_finite() {
                spheres.set_position(i, point);
            }
        }
    }

    /// React to one source update
    pub fn apply_update(&mut self, update: &SourceUpdate) {
        match update {
            SourceUpdate::Changed(_) => self.rebuild(),
            SourceUpdate::Frame(outcome) => {
                // Geometry and texSize follow the frame size; iK catches up
                // once the refetched calibration arrives as `Changed`
                if outcome.resized || outcome.change.is_some() {
                    self.rebuild();
                }
                if outcome.rasterized {
                    self.material.set_texture(self.source.media().current_frame());
                }
                if outcome.tick && self.mode == RenderingMode::Spheres {
                    self.update_spheres();
                }
            }
            SourceUpdate::State(_) => {}
            SourceUpdate::Error(e) => {
                warn!(source = %self.source.id(), error = %e, "Source error");
            }
        }
    }

    /// Drive the source and keep the renderables in step with it
    ///
    /// Returns None once the source has been torn down.
    pub async fn step(&mut self) -> Option<SourceUpdate> {
        let update = self.source.next_update().await?;
        self.apply_update(&update);
        Some(update)
    }

    /// Push panel options into the material and rendering mode
    pub fn apply_options(&mut self, options: &ViewerOptions) {
        let options = options.clamped();
        let material = &mut self.material;
        material.set_scale(options.model_scale);
        material.set_point_size(options.model_point_size);
        material.set_opacity(options.opacity);
        material.set_saturation(options.saturation * 3.0);
        if !material.set_single_color(&options.single_color_vec) {
            warn!(color = %options.single_color_vec, "Ignoring invalid single colour");
        }
        material.set_use_single_color(options.use_single_color);
        material.set_render_nth_point(options.render_nth_point as i32);
        material.set_use_noise(options.use_noise);
        material.set_noise_strength(options.noise_strength);
        material.set_depth_threshold_filter(options.depth_threshold_filter);
        material.set_absolute_depth_range_filter_x(options.absolute_depth_range_filter_x);
        material.set_absolute_depth_range_filter_y(options.absolute_depth_range_filter_y);
        self.set_rendering_mode(options.rendering_mode);
    }

    pub fn toggle(&mut self) -> bool {
        self.source.toggle()
    }

    pub fn toggle_sound(&mut self) -> bool {
        self.source.toggle_audio()
    }

    /// Disconnect the source and drop every renderable
    pub fn remove(&mut self) {
        self.source.disconnect();
        self.object.clear();
        self.material.set_texture(None);
    }
}
