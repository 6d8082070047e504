// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration and preset persistence

use rgbd_stream::Config;
use rgbd_stream::RenderingMode;
use rgbd_stream::presets::{CameraView, Preset, PresetRegistry, ViewerOptions, Xyz};
use rgbd_stream::storage::JsonFileStore;

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(
        config.peer_addresses,
        vec!["http://192.168.0.18".to_string()],
        "Default device address should be set"
    );
    assert_eq!(config.rendering, ViewerOptions::default());
    assert_eq!(config.frame_callback_interval_ms, 1000);
}

#[test]
fn test_missing_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("missing.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgbd-stream").join("config.json");

    let mut config = Config::default();
    config.peer_addresses = vec!["http://10.0.0.7".to_string()];
    config.rendering.rendering_mode = RenderingMode::MeshWireframe;
    config.sphere_count = 50;
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_config_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"sphere_count": 10, "rendering": {"renderingMode": "spheres"}}"#)
        .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.sphere_count, 10);
    assert_eq!(config.rendering.rendering_mode, RenderingMode::Spheres);
    assert_eq!(config.rendering.opacity, 0.5);
    assert_eq!(config.peer_addresses, Config::default().peer_addresses);
}

#[test]
fn test_invalid_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{").unwrap();
    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_presets_persist_across_registries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("presets.json");

    let mut registry = PresetRegistry::load(JsonFileStore::new(&path)).unwrap();
    let mut view = CameraView::default();
    view.camera.position = Xyz { x: 0.5, y: 0.5, z: 2.0 };
    registry
        .add(Preset {
            name: "overhead".to_string(),
            options: ViewerOptions {
                rendering_mode: RenderingMode::Mesh,
                ..Default::default()
            },
            view: Some(view),
        })
        .unwrap();

    let reloaded = PresetRegistry::load(JsonFileStore::new(&path)).unwrap();
    assert_eq!(reloaded.names(), vec!["None", "overhead"]);
    let preset = reloaded.get("overhead").unwrap();
    assert_eq!(preset.options.rendering_mode, RenderingMode::Mesh);
    assert_eq!(preset.view, Some(view));

    // Stored under the shared key as a JSON array
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let stored: serde_json::Value = serde_json::from_str(raw["bb-gui-presets"].as_str().unwrap()).unwrap();
    assert_eq!(stored[0]["name"], "overhead");
    assert_eq!(stored[0]["options"]["renderingMode"], "mesh");
}
