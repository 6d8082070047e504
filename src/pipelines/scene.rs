// SPDX-License-Identifier: GPL-3.0-only

//! All point cloud videos shown together
//!
//! Options and camera changes fan out to every video; videos are driven
//! concurrently and the first one with something to report wins.

use super::point_cloud_video::{PointCloudVideo, RenderingMode};
use crate::presets::{CameraView, Preset, ViewerOptions};
use crate::video::SourceUpdate;
use futures::future::{FutureExt, select_all};
use rand::Rng;
use tracing::{debug, info};

#[derive(Default)]
pub struct Scene {
    videos: Vec<PointCloudVideo>,
    options: ViewerOptions,
    view: CameraView,
}

impl Scene {
    pub fn new(options: ViewerOptions) -> Self {
        Self {
            videos: Vec::new(),
            options: options.clamped(),
            view: CameraView::default(),
        }
    }

    /// Add a video; it picks up the current options
    pub fn add_video(&mut self, mut video: PointCloudVideo) -> usize {
        video.apply_options(&self.options);
        self.videos.push(video);
        self.videos.len() - 1
    }

    /// Disconnect and drop every video
    pub fn remove_videos(&mut self) {
        for video in &mut self.videos {
            video.remove();
        }
        info!(count = self.videos.len(), "Videos removed");
        self.videos.clear();
    }

    pub fn videos(&self) -> &[PointCloudVideo] {
        &self.videos
    }

    pub fn videos_mut(&mut self) -> &mut [PointCloudVideo] {
        &mut self.videos
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn apply_options(&mut self, options: ViewerOptions) {
        self.options = options.clamped();
        for video in &mut self.videos {
            video.apply_options(&self.options);
        }
    }

    pub fn set_rendering_mode(&mut self, mode: RenderingMode) {
        self.apply_options(ViewerOptions {
            rendering_mode: mode,
            ..self.options.clone()
        });
    }

    pub fn view(&self) -> &CameraView {
        &self.view
    }

    /// Move the camera; the orbit target is kept inside the pan box
    pub fn set_view(&mut self, mut view: CameraView) {
        if view.clamp_target() {
            debug!("Orbit target clamped");
        }
        self.view = view;
    }

    /// Apply a stored preset's options and, when present, its camera view
    pub fn load_preset(&mut self, preset: &Preset) {
        info!(preset = %preset.name, "Loading preset");
        self.apply_options(preset.options.clone());
        if let Some(view) = preset.view {
            self.set_view(view);
        }
    }

    /// Snapshot the current options and view as a named preset
    pub fn to_preset(&self, name: impl Into<String>) -> Preset {
        Preset {
            name: name.into(),
            options: self.options.clone(),
            view: Some(self.view),
        }
    }

    /// Play/pause every video
    pub fn toggle_video(&mut self) {
        for video in &mut self.videos {
            video.toggle();
        }
    }

    /// Mute/unmute every video
    pub fn toggle_sound(&mut self) {
        for video in &mut self.videos {
            video.toggle_sound();
        }
    }

    /// Draw fresh noise seeds for every material
    pub fn reseed(&mut self, rng: &mut impl Rng) {
        for video in &mut self.videos {
            video.material_mut().reseed(rng);
        }
    }

    /// Drive all videos until one reports an update
    ///
    /// Returns the video index with its update, or None when there are no
    /// videos or a video has been torn down.
    pub async fn step(&mut self) -> Option<(usize, SourceUpdate)> {
        if self.videos.is_empty() {
            return None;
        }

        let steps = self.videos.iter_mut().map(|video| video.step().boxed_local());
        let (update, index, _) = select_all(steps).await;
        update.map(|update| (index, update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::IntrinsicMatrix;
    use crate::presets::Xyz;
    use crate::video::{Lifecycle, VideoSource};

    fn video(id: &str, lifecycle: Option<&Lifecycle>) -> PointCloudVideo {
        PointCloudVideo::new(VideoSource::embedded(id, IntrinsicMatrix::IDENTITY, lifecycle))
    }

    #[test]
    fn test_options_fan_out() {
        let mut scene = Scene::new(ViewerOptions::default());
        scene.add_video(video("a", None));
        scene.add_video(video("b", None));

        scene.apply_options(ViewerOptions {
            opacity: 0.8,
            ..Default::default()
        });
        scene.set_rendering_mode(RenderingMode::Spheres);

        for video in scene.videos() {
            assert_eq!(video.material().uniforms.opacity, 0.8);
            assert_eq!(video.rendering_mode(), RenderingMode::Spheres);
        }
    }

    #[test]
    fn test_new_videos_pick_up_options() {
        let mut scene = Scene::new(ViewerOptions {
            model_scale: 4.0,
            ..Default::default()
        });
        let index = scene.add_video(video("a", None));
        assert_eq!(scene.videos()[index].material().uniforms.scale, 4.0);
    }

    #[test]
    fn test_toggles_and_remove() {
        let mut scene = Scene::default();
        scene.add_video(video("a", None));
        scene.toggle_video();
        scene.toggle_sound();
        let media = scene.videos()[0].source().media();
        assert!(media.is_paused());
        assert!(!media.is_muted());

        scene.remove_videos();
        assert!(scene.videos().is_empty());
    }

    #[test]
    fn test_preset_round_trip_through_scene() {
        let mut scene = Scene::default();
        let mut view = CameraView::default();
        view.controls.target = Xyz { x: 0.0, y: 5.0, z: 0.0 };
        scene.set_view(view);
        assert_eq!(scene.view().controls.target.y, 2.0);

        let preset = scene.to_preset("saved");
        let mut other = Scene::default();
        other.load_preset(&preset);
        assert_eq!(other.view(), scene.view());
        assert_eq!(other.options(), scene.options());
    }

    #[tokio::test]
    async fn test_step_ends_on_teardown() {
        let lifecycle = Lifecycle::new();
        let mut scene = Scene::default();
        scene.add_video(video("a", Some(&lifecycle)));
        assert!(Scene::default().step().await.is_none());

        lifecycle.teardown();
        assert!(scene.step().await.is_none());
    }
}
