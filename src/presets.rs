// SPDX-License-Identifier: GPL-3.0-only

//! Viewer options, camera views and named presets
//!
//! Presets are persisted as a single JSON array under
//! [`STORAGE_KEY`](crate::constants::presets::STORAGE_KEY) and written back
//! after every mutation.

use crate::constants::presets::{NONE_PRESET, STORAGE_KEY};
use crate::constants::rendering::PAN_LIMIT;
use crate::errors::{AppError, AppResult};
use crate::pipelines::RenderingMode;
use crate::storage::KeyValueStore;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Options panel state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerOptions {
    pub model_scale: f32,
    pub model_point_size: f32,
    pub opacity: f32,
    /// Panel value; the material receives three times this
    pub saturation: f32,
    pub single_color_vec: String,
    pub use_single_color: bool,
    pub render_nth_point: u32,
    pub use_noise: bool,
    pub noise_strength: f32,
    pub background_color: String,
    pub depth_threshold_filter: f32,
    pub absolute_depth_range_filter_x: f32,
    pub absolute_depth_range_filter_y: f32,
    pub rendering_mode: RenderingMode,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            model_scale: 1.0,
            model_point_size: 1.0,
            opacity: 0.5,
            saturation: 1.0,
            single_color_vec: "#ffffff".to_string(),
            use_single_color: true,
            render_nth_point: 1,
            use_noise: false,
            noise_strength: 0.0,
            background_color: "#57554f".to_string(),
            depth_threshold_filter: 1.0,
            absolute_depth_range_filter_x: 0.1,
            absolute_depth_range_filter_y: 2.8,
            rendering_mode: RenderingMode::Points,
        }
    }
}

impl ViewerOptions {
    /// Copy with every slider value pulled into its panel range
    pub fn clamped(&self) -> Self {
        Self {
            model_scale: self.model_scale.clamp(0.1, 20.0),
            model_point_size: self.model_point_size.clamp(0.1, 20.0),
            opacity: self.opacity.clamp(0.1, 1.0),
            saturation: self.saturation.clamp(0.0, 1.0),
            render_nth_point: self.render_nth_point.clamp(1, 1000),
            noise_strength: self.noise_strength.clamp(0.0, 2.0),
            depth_threshold_filter: self.depth_threshold_filter.clamp(0.001, 1.5),
            absolute_depth_range_filter_x: self.absolute_depth_range_filter_x.clamp(0.005, 5.0),
            absolute_depth_range_filter_y: self.absolute_depth_range_filter_y.clamp(0.005, 5.0),
            ..self.clone()
        }
    }
}

/// `{x, y, z}` triple as stored in presets
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Xyz {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Xyz {
    fn from(v: Vec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

impl From<Xyz> for Vec3 {
    fn from(v: Xyz) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Xyz,
    /// Euler angles in radians
    pub rotation: Xyz,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitControls {
    pub target: Xyz,
}

/// Orbit camera state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraView {
    pub camera: CameraPose,
    pub controls: OrbitControls,
}

impl Default for CameraView {
    fn default() -> Self {
        Self {
            camera: CameraPose {
                position: Xyz { x: 0.0, y: 0.0, z: 1.0 },
                rotation: Xyz::default(),
            },
            controls: OrbitControls {
                target: Xyz::default(),
            },
        }
    }
}

impl CameraView {
    /// Keep the orbit target inside the pan box
    ///
    /// The camera moves by the same correction so the view direction is kept.
    /// Returns true if anything was clamped.
    pub fn clamp_target(&mut self) -> bool {
        let target = Vec3::from(self.controls.target);
        let clamped = target.clamp(Vec3::splat(-PAN_LIMIT), Vec3::splat(PAN_LIMIT));
        let correction = clamped - target;
        if correction == Vec3::ZERO {
            return false;
        }

        self.controls.target = clamped.into();
        self.camera.position = (Vec3::from(self.camera.position) + correction).into();
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub options: ViewerOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<CameraView>,
}

/// Named presets backed by a [`KeyValueStore`]
pub struct PresetRegistry<S: KeyValueStore> {
    store: S,
    presets: Vec<Preset>,
}

impl<S: KeyValueStore> PresetRegistry<S> {
    /// Load the stored presets
    ///
    /// An unreadable entry is logged and treated as empty so a corrupt store
    /// never blocks startup.
    pub fn load(store: S) -> AppResult<Self> {
        let presets = match store.get(STORAGE_KEY)? {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!(key = STORAGE_KEY, error = %e, "Stored presets are unreadable, starting empty");
                Vec::new()
            }),
            None => Vec::new(),
        };
        debug!(count = presets.len(), "Presets loaded");
        Ok(Self { store, presets })
    }

    /// Picker entries: `"None"` followed by every preset name
    pub fn names(&self) -> Vec<&str> {
        std::iter::once(NONE_PRESET)
            .chain(self.presets.iter().map(|p| p.name.as_str()))
            .collect()
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Store a preset, replacing one with the same name
    pub fn add(&mut self, preset: Preset) -> AppResult<()> {
        if preset.name.trim().is_empty() || preset.name == NONE_PRESET {
            return Err(AppError::Config(format!(
                "Invalid preset name: {:?}",
                preset.name
            )));
        }

        match self.presets.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => *existing = preset,
            None => self.presets.push(preset),
        }
        self.save()
    }

    /// Remove a preset; returns whether one existed
    pub fn remove(&mut self, name: &str) -> AppResult<bool> {
        let before = self.presets.len();
        self.presets.retain(|p| p.name != name);
        if self.presets.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn save(&mut self) -> AppResult<()> {
        let json = serde_json::to_string(&self.presets)
            .map_err(|e| AppError::Storage(format!("Failed to encode presets: {}", e)))?;
        self.store.set(STORAGE_KEY, &json)?;
        info!(count = self.presets.len(), "Presets saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn preset(name: &str, scale: f32) -> Preset {
        Preset {
            name: name.to_string(),
            options: ViewerOptions {
                model_scale: scale,
                ..Default::default()
            },
            view: None,
        }
    }

    #[test]
    fn test_options_json_is_camel_case() {
        let json = serde_json::to_value(ViewerOptions::default()).unwrap();
        assert_eq!(json["modelPointSize"], 1.0);
        assert_eq!(json["singleColorVec"], "#ffffff");
        assert_eq!(json["absoluteDepthRangeFilterY"], 2.8f32 as f64);
        assert_eq!(json["renderingMode"], "points");

        let partial: ViewerOptions = serde_json::from_str(r#"{"opacity": 0.9}"#).unwrap();
        assert_eq!(partial.opacity, 0.9);
        assert_eq!(partial.model_scale, 1.0);
    }

    #[test]
    fn test_clamped() {
        let options = ViewerOptions {
            model_scale: 100.0,
            opacity: 0.0,
            render_nth_point: 0,
            absolute_depth_range_filter_x: 0.0,
            ..Default::default()
        }
        .clamped();
        assert_eq!(options.model_scale, 20.0);
        assert_eq!(options.opacity, 0.1);
        assert_eq!(options.render_nth_point, 1);
        assert_eq!(options.absolute_depth_range_filter_x, 0.005);
        assert_eq!(options.single_color_vec, "#ffffff");
    }

    #[test]
    fn test_clamp_target_shifts_camera() {
        let mut view = CameraView::default();
        view.controls.target = Xyz { x: 3.0, y: -0.5, z: -2.5 };
        assert!(view.clamp_target());
        assert_eq!(view.controls.target, Xyz { x: 2.0, y: -0.5, z: -2.0 });
        assert_eq!(view.camera.position, Xyz { x: -1.0, y: 0.0, z: 1.5 });
        assert!(!view.clamp_target());
    }

    #[test]
    fn test_camera_view_json_shape() {
        let json = serde_json::to_value(CameraView::default()).unwrap();
        assert_eq!(json["camera"]["position"]["z"], 1.0);
        assert_eq!(json["controls"]["target"]["x"], 0.0);
    }

    #[test]
    fn test_registry_add_replace_remove() {
        let mut registry = PresetRegistry::load(MemoryStore::new()).unwrap();
        assert_eq!(registry.names(), vec!["None"]);

        registry.add(preset("close", 2.0)).unwrap();
        registry.add(preset("far", 0.5)).unwrap();
        registry.add(preset("close", 3.0)).unwrap();
        assert_eq!(registry.names(), vec!["None", "close", "far"]);
        assert_eq!(registry.get("close").unwrap().options.model_scale, 3.0);

        assert!(registry.remove("far").unwrap());
        assert!(!registry.remove("far").unwrap());

        let reloaded = PresetRegistry::load(registry.into_store()).unwrap();
        assert_eq!(reloaded.names(), vec!["None", "close"]);
    }

    #[test]
    fn test_registry_rejects_reserved_name() {
        let mut registry = PresetRegistry::load(MemoryStore::new()).unwrap();
        assert!(registry.add(preset("None", 1.0)).is_err());
        assert!(registry.add(preset("  ", 1.0)).is_err());
    }

    #[test]
    fn test_corrupt_store_starts_empty() {
        let mut store = MemoryStore::new();
        store.set(STORAGE_KEY, "not json").unwrap();
        let registry = PresetRegistry::load(store).unwrap();
        assert!(registry.presets().is_empty());
    }
}
