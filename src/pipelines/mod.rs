// SPDX-License-Identifier: GPL-3.0-only

//! Point cloud reconstruction pipeline
//!
//! Turns a calibrated [`VideoSource`](crate::video::VideoSource) into
//! renderables. No vertex positions are computed on the CPU except for the
//! sphere instances; the shader reconstructs points from `vertexIdx`, the
//! depth texture and the inverse-projection uniform.
//!
//! ```text
//! ┌──────────────┐  change   ┌───────────────────┐     ┌──────────────┐
//! │ VideoSource  │ ────────▶ │ PointCloudVideo   │ ──▶ │ VideoObject  │
//! │  (size, iK)  │           │  - rebuild        │     │  children    │
//! │              │  frame    │  - material       │     │  (Arc bufs)  │
//! │              │ ────────▶ │  - sphere refresh │     │              │
//! └──────────────┘           └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`geometry`]: point and mesh index buffers
//! - [`material`]: uniform block and option setters
//! - [`video_object`]: child container, rebuilt from scratch on change
//! - [`point_cloud_video`]: one video's renderables and rendering mode
//! - [`scene`]: every video plus shared options and camera view

pub mod geometry;
pub mod material;
pub mod point_cloud_video;
pub mod scene;
pub mod video_object;

pub use geometry::{GridGeometry, Topology, build_mesh, build_points};
pub use material::{PointCloudMaterial, PointCloudUniforms};
pub use point_cloud_video::{PointCloudVideo, RenderingMode};
pub use scene::Scene;
pub use video_object::{Renderable, SceneChild, SphereInstances, VideoObject};
