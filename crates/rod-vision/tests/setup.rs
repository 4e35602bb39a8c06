mod common;

use common::{anchor, FixedEngine};
use rod_vision::config::DetectorConfig;
use rod_vision::engine::{EngineLoader, EngineOptions, InferenceEngine};
use rod_vision::pipeline::DistanceStrategy;
use rod_vision::registry::ModelRegistry;
use rod_vision::{ObstaclePipeline, VisionError};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Records what it was asked to load and hands back a fixed engine.
#[derive(Default)]
struct RecordingLoader {
    seen: Mutex<Vec<(PathBuf, EngineOptions)>>,
}

impl EngineLoader for RecordingLoader {
    fn load(
        &self,
        model_path: &Path,
        opts: &EngineOptions,
    ) -> anyhow::Result<Box<dyn InferenceEngine>> {
        anyhow::ensure!(model_path.exists(), "model file missing: {}", model_path.display());
        self.seen.lock().unwrap().push((model_path.to_path_buf(), *opts));
        Ok(Box::new(FixedEngine::new(&[anchor(0.5, 0.5, 0.2, 0.4, &[0.0, 0.0, 0.8])])))
    }
}

fn write_assets(dir: &Path, labels: &str) -> PathBuf {
    std::fs::write(dir.join("obstacles.tflite"), b"model").unwrap();
    std::fs::write(dir.join("labels.txt"), labels).unwrap();
    let manifest = dir.join("models.toml");
    std::fs::write(
        &manifest,
        r#"
default = "obstacles"

[[model]]
id = "obstacles"
display_name = "Obstacles FP32"
model_path = "obstacles.tflite"
label_path = "labels.txt"
"#,
    )
    .unwrap();
    manifest
}

#[test]
fn setup_from_manifest_loads_model_and_labels() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write_assets(dir.path(), "person\ncar\ntree\n\nnot a class\n");

    let reg = ModelRegistry::load(&manifest).unwrap();
    let model = reg.resolve(None).unwrap().clone();
    let cfg = DetectorConfig { threads: 2, use_acceleration: false, ..DetectorConfig::default() };
    let mut p = ObstaclePipeline::new(model, cfg, DistanceStrategy::Disabled);

    let loader = RecordingLoader::default();
    p.setup(&loader).unwrap();
    assert!(p.is_ready());

    let seen = loader.seen.lock().unwrap();
    assert_eq!(seen[0].0, dir.path().join("obstacles.tflite"));
    assert_eq!(seen[0].1, EngineOptions { threads: 2, use_acceleration: false });

    let meta = p.metadata().unwrap();
    assert_eq!(meta.labels, ["person", "car", "tree"]);
    assert_eq!((meta.tensor_width, meta.tensor_height), (640, 640));

    let out = p.detect(&common::frame()).unwrap();
    assert_eq!(out.detections()[0].class_name, "tree");
}

#[test]
fn missing_label_file_leaves_pipeline_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write_assets(dir.path(), "person\ncar\ntree\n");
    std::fs::remove_file(dir.path().join("labels.txt")).unwrap();

    let reg = ModelRegistry::load(&manifest).unwrap();
    let mut p = ObstaclePipeline::new(
        reg.default_model().clone(),
        DetectorConfig::default(),
        DistanceStrategy::Disabled,
    );
    let err = p.setup(&RecordingLoader::default()).unwrap_err();
    assert!(matches!(err, VisionError::Setup(_)));
    assert!(!p.is_ready());
}

#[test]
fn too_few_labels_for_the_model_fails_setup() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write_assets(dir.path(), "person\ncar\n");

    let reg = ModelRegistry::load(&manifest).unwrap();
    let mut p = ObstaclePipeline::new(
        reg.default_model().clone(),
        DetectorConfig::default(),
        DistanceStrategy::Disabled,
    );
    assert!(matches!(p.setup(&RecordingLoader::default()), Err(VisionError::Metadata(_))));
    assert!(!p.is_ready());
}
