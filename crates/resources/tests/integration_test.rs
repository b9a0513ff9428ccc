//! Integration tests for model loading from disk.

use std::path::PathBuf;

use ripe_resources::{
    AssetLocation, AssetManager, FileSource, ModelConfig, PartsSelection, ResourceError,
};
use ripe_scene::Scene;

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data")
}

fn config() -> ModelConfig {
    ModelConfig::from_json(
        br##"{ "assets": { "materials": {
            "side": { "default": { "color": "#112233" } },
            "sole": { "default": { "color": "#445566", "roughness": 0.25 } }
        } } }"##,
    )
    .expect("Failed to parse config")
}

#[test]
fn test_load_gltf_model_from_disk() {
    let location = AssetLocation::new("", "swear", "vyner").with_model_path("shoe.gltf");
    let mut assets = AssetManager::new(location, config(), FileSource::new(data_dir()));
    let mut scene = Scene::new();

    assets
        .load_assets(&mut scene, &PartsSelection::new())
        .expect("Failed to load glTF model");

    let root = assets.mesh_root().expect("Model should have a root");
    let bounds = scene.bounding_box(root);
    assert!(
        bounds.min.x < bounds.max.x,
        "AABB min x should be less than max x, got {:?}",
        bounds
    );
    assert_eq!(assets.part_index().nodes("side").len(), 1);
    assert_eq!(assets.part_index().nodes("sole").len(), 1);

    // every mesh received its part default
    for (_, node) in scene.nodes() {
        let Some(mesh) = node.as_mesh() else { continue };
        let material = scene.material(mesh.material.expect("Mesh should have a material"));
        assert!(material.is_some_and(|m| m.name.ends_with(":default:default")));
    }
}

#[test]
fn test_missing_model_file_is_not_found() {
    let location = AssetLocation::new("", "swear", "vyner").with_model_path("missing.glb");
    let mut assets = AssetManager::new(location, config(), FileSource::new(data_dir()));
    let mut scene = Scene::new();

    let result = assets.load_assets(&mut scene, &PartsSelection::new());
    assert!(
        matches!(result, Err(ResourceError::NotFound(_))),
        "Expected NotFound, got {:?}",
        result
    );
}

#[test]
fn test_fbx_models_are_rejected() {
    let location = AssetLocation::new("", "swear", "vyner").with_model_path("shoe.fbx");
    let mut assets = AssetManager::new(location, config(), FileSource::new(data_dir()));
    let result = assets.load_assets(&mut Scene::new(), &PartsSelection::new());
    assert!(matches!(result, Err(ResourceError::UnsupportedFormat(_))));
}
