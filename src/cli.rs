// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Streaming from devices and reporting the reconstructed cloud
//! - Inspecting device and recording calibration
//! - Managing viewer presets

use chrono::Local;
use rgbd_stream::backends::default_transport_factory;
use rgbd_stream::backends::recording::read_embedded_metadata;
use rgbd_stream::calibration::{
    IntrinsicMatrix, OriginalSize, correct_intrinsic_matrix, inverse_projection_coefficients,
    reference_height,
};
use rgbd_stream::config::parse_peer_addresses;
use rgbd_stream::constants::FIRST_FRAME_TIMEOUT;
use rgbd_stream::presets::{CameraView, Preset, PresetRegistry};
use rgbd_stream::signaling::SignalingApi;
use rgbd_stream::storage::JsonFileStore;
use rgbd_stream::video::SourceUpdate;
use rgbd_stream::{
    Config, HttpSignalingClient, Lifecycle, PointCloudVideo, RenderingMode, Scene,
    SignalingSession, VideoSource,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Stream from every configured (or given) device until Ctrl+C or `duration`
pub fn connect(
    ips: Option<String>,
    mode: Option<RenderingMode>,
    duration: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    let addresses = match ips {
        Some(list) => parse_peer_addresses(&list),
        None => config.peer_addresses.clone(),
    };
    if addresses.is_empty() {
        return Err("No device addresses given".into());
    }
    if let Some(mode) = mode {
        config.rendering.rendering_mode = mode;
    }

    let lifecycle = Lifecycle::new();
    lifecycle.install_ctrlc_handler()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let transports = default_transport_factory();
        let mut scene = Scene::new(config.rendering.clone());

        for address in &addresses {
            let client = HttpSignalingClient::with_timeout(address.as_str(), config.request_timeout())?;
            let session = SignalingSession::new(Arc::new(client), transports.clone());
            let source = VideoSource::remote(address.as_str(), session, Some(&lifecycle))
                .with_frame_callback_interval(config.frame_callback_interval());
            let index =
                scene.add_video(PointCloudVideo::new(source).with_sphere_count(config.sphere_count));

            println!("Connecting to {}...", address);
            scene.videos_mut()[index].source_mut().connect()?;
        }

        run_scene(&mut scene, duration).await
    })
}

/// Print a device's calibration, corrected for `height` when given
pub fn print_metadata(ip: &str, height: Option<u32>) -> Result<(), Box<dyn std::error::Error>> {
    let address = parse_peer_addresses(ip)
        .into_iter()
        .next()
        .ok_or("No device address given")?;
    let client = HttpSignalingClient::new(address)?;

    let rt = tokio::runtime::Runtime::new()?;
    let metadata = rt.block_on(client.get_metadata())?;

    println!("Device: {}", client.peer_address());
    println!("Raw K (column-major): {:?}", metadata.k);
    println!("Original size: {}", original_size_label(metadata.original_size));

    let reference = reference_height(&metadata.k, metadata.original_size);
    println!("Calibration height: {}", reference);

    let live_height = height.unwrap_or(reference as u32);
    let matrix = correct_intrinsic_matrix(&metadata.k, metadata.original_size, live_height);
    println!();
    println!("Intrinsics for a {} px high stream:", live_height);
    print_intrinsics(&matrix);

    Ok(())
}

/// Print a recording's embedded calibration, optionally playing it back
pub fn inspect_file(path: &Path, play: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let metadata = read_embedded_metadata(path)?;

    println!("Recording: {}", path.display());
    print_intrinsics(&metadata.intrinsics);
    if !metadata.extra.is_empty() {
        println!();
        println!("Other fields:");
        for (key, value) in &metadata.extra {
            println!("  {}: {}", key, value);
        }
    }

    match play {
        Some(seconds) => play_file(path, seconds),
        None => Ok(()),
    }
}

#[cfg(feature = "gstreamer")]
fn play_file(path: &Path, seconds: u64) -> Result<(), Box<dyn std::error::Error>> {
    use rgbd_stream::backends::file_source::FileMediaSource;

    let config = Config::load()?;
    let lifecycle = Lifecycle::new();
    lifecycle.install_ctrlc_handler()?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let file = FileMediaSource::open(path)?;
        let mut source = VideoSource::embedded(
            path.display().to_string(),
            file.metadata().intrinsics,
            Some(&lifecycle),
        )
        .with_frame_callback_interval(config.frame_callback_interval());
        source.attach_track(file.track());

        let mut scene = Scene::new(config.rendering.clone());
        scene.add_video(PointCloudVideo::new(source).with_sphere_count(config.sphere_count));

        println!();
        println!("Playing for {}s...", seconds);
        run_scene(&mut scene, Some(seconds)).await
    })
}

#[cfg(not(feature = "gstreamer"))]
fn play_file(_path: &Path, _seconds: u64) -> Result<(), Box<dyn std::error::Error>> {
    Err("Playback needs a build with the `gstreamer` feature".into())
}

enum Wake {
    Update(Option<(usize, SourceUpdate)>),
    Deadline,
    NoFrame,
}

/// Drive the scene and print a line per throttled frame tick
async fn run_scene(
    scene: &mut Scene,
    duration: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();
    let deadline = duration.map(|secs| start + Duration::from_secs(secs));
    let first_frame_deadline = start + FIRST_FRAME_TIMEOUT;
    let mut first_frame_seen = false;

    let result = loop {
        let wake = tokio::select! {
            update = scene.step() => Wake::Update(update),
            _ = sleep_until(deadline) => Wake::Deadline,
            _ = tokio::time::sleep_until(first_frame_deadline), if !first_frame_seen => Wake::NoFrame,
        };

        match wake {
            Wake::Update(Some((index, update))) => match update {
                SourceUpdate::Frame(outcome) => {
                    first_frame_seen |= outcome.rasterized;
                    if outcome.tick {
                        print_summary(&scene.videos()[index]);
                    }
                }
                SourceUpdate::Changed(change) => {
                    println!(
                        "{}: calibration updated for {}",
                        scene.videos()[index].source().id(),
                        change.size
                    );
                }
                SourceUpdate::State(state) => {
                    info!(source = %scene.videos()[index].source().id(), state = %state, "Session state");
                }
                SourceUpdate::Error(e) => {
                    let source = scene.videos()[index].source();
                    warn!(source = %source.id(), error = %e, "Session error");
                    // Nothing is retried; a failed session never produces frames
                    let closed = source
                        .session()
                        .is_some_and(|session| !session.has_link());
                    if closed && scene.videos().len() == 1 {
                        break Err(e.to_string().into());
                    }
                }
            },
            Wake::Update(None) => {
                println!();
                println!("Stopping...");
                break Ok(());
            }
            Wake::Deadline => break Ok(()),
            Wake::NoFrame => {
                break Err(format!(
                    "No frame received within {}s",
                    FIRST_FRAME_TIMEOUT.as_secs()
                )
                .into());
            }
        }
    };

    scene.remove_videos();
    result
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn print_summary(video: &PointCloudVideo) {
    let source = video.source();
    let size = source.video_size();
    let centre = source.get_point((size.height / 2 * size.width + size.width / 2) as usize);
    let indices: usize = video
        .object()
        .children()
        .iter()
        .map(|child| child.renderable.geometry().index_count())
        .sum();

    println!(
        "[{}] {} {} {} indices={} centre=({:.3}, {:.3}, {:.3})",
        Local::now().format("%H:%M:%S"),
        source.id(),
        size,
        video.rendering_mode(),
        indices,
        centre.x,
        centre.y,
        centre.z
    );
}

fn print_intrinsics(matrix: &IntrinsicMatrix) {
    let e = &matrix.elements;
    println!("  K = [{:10.4} {:10.4} {:10.4}]", e[0], e[1], e[2]);
    println!("      [{:10.4} {:10.4} {:10.4}]", e[3], e[4], e[5]);
    println!("      [{:10.4} {:10.4} {:10.4}]", e[6], e[7], e[8]);

    let ik = inverse_projection_coefficients(matrix);
    println!(
        "  iK = [ifx {:.6}, ify {:.6}, itx {:.6}, ity {:.6}]",
        ik.ifx, ik.ify, ik.itx, ik.ity
    );
}

fn open_presets() -> Result<PresetRegistry<JsonFileStore>, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    Ok(PresetRegistry::load(JsonFileStore::new(config.presets_path()))?)
}

pub fn list_presets() -> Result<(), Box<dyn std::error::Error>> {
    let registry = open_presets()?;
    for name in registry.names() {
        println!("{}", name);
    }
    Ok(())
}

pub fn show_preset(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let registry = open_presets()?;
    let preset = registry
        .get(name)
        .ok_or_else(|| format!("No preset named '{}'", name))?;
    println!("{}", serde_json::to_string_pretty(preset)?);
    Ok(())
}

pub fn save_preset(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut registry = PresetRegistry::load(JsonFileStore::new(config.presets_path()))?;
    registry.add(Preset {
        name: name.to_string(),
        options: config.rendering.clamped(),
        view: Some(CameraView::default()),
    })?;
    println!("Saved preset '{}'", name);
    Ok(())
}

pub fn remove_preset(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = open_presets()?;
    if registry.remove(name)? {
        println!("Removed preset '{}'", name);
    } else {
        println!("No preset named '{}'", name);
    }
    Ok(())
}

fn original_size_label(size: Option<OriginalSize>) -> String {
    size.map(|s| format!("{}x{}", s.width, s.height))
        .unwrap_or_else(|| "not reported".to_string())
}
