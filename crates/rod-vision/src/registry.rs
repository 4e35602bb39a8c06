//! Model registry: identifier -> model/label file pair.
//!
//! Loaded from a `models.toml` manifest:
//!
//! ```toml
//! default = "yolo8-18-fp32"
//!
//! [[model]]
//! id = "yolo8-18-fp32"
//! display_name = "18 Obstacles YOLOv8 FP32"
//! model_path = "18Obstacles_yolov8_float32.tflite"
//! label_path = "18Obstacles_labels.txt"
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub display_name: String,
    pub model_path: PathBuf,
    pub label_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    default: String,
    #[serde(default, rename = "model")]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelEntry>,
    default_id: String,
}

impl ModelRegistry {
    pub fn from_toml(text: &str, base_dir: &Path) -> Result<Self> {
        let manifest: Manifest = toml::from_str(text).context("parse model manifest")?;
        anyhow::ensure!(!manifest.models.is_empty(), "model manifest lists no models");

        let mut seen = HashSet::new();
        for m in &manifest.models {
            anyhow::ensure!(seen.insert(m.id.as_str()), "duplicate model id: {}", m.id);
        }
        anyhow::ensure!(
            seen.contains(manifest.default.as_str()),
            "default model '{}' is not listed in the manifest",
            manifest.default
        );

        let models = manifest
            .models
            .into_iter()
            .map(|mut m| {
                m.model_path = base_dir.join(&m.model_path);
                m.label_path = base_dir.join(&m.label_path);
                m
            })
            .collect();
        Ok(Self { models, default_id: manifest.default })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read model manifest {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml(&text, base)
    }

    /// Model SKUs shipped with the mobile app, relative to `asset_dir`.
    pub fn builtin(asset_dir: &Path) -> Self {
        const O18: &str = "18Obstacles_labels.txt";
        const O15: &str = "15Obstacles_labels.txt";
        #[rustfmt::skip]
        let table: [(&str, &str, &str, &str); 13] = [
            ("yolo8-18-fp16", "18 Obstacles YOLOv8 FP16", "18Obstacles_yolov8_float16.tflite", O18),
            ("yolo8-18-fp32", "18 Obstacles YOLOv8 FP32", "18Obstacles_yolov8_float32.tflite", O18),
            ("yolo8-18-full-int", "18 Obstacles YOLOv8 Full Integer Quant", "18Obstacles_yolov8_full_integer_quant.tflite", O18),
            ("yolo8-18-int8", "18 Obstacles YOLOv8 INT8", "18Obstacles_yolov8_int8.tflite", O18),
            ("yolo8-18-int-quant", "18 Obstacles YOLOv8 Integer Quant", "18Obstacles_yolov8_integer_quant.tflite", O18),
            ("yolo12-18-fp16", "18 Obstacles YOLOv12 FP16", "18Obstacles_yolov12_float16.tflite", O18),
            ("yolo12-18-fp32", "18 Obstacles YOLOv12 FP32", "18Obstacles_yolov12_float32.tflite", O18),
            ("yolo8-15-fp16", "15 Obstacles YOLOv8 FP16", "15Obstacles_yolov8_float16.tflite", O15),
            ("yolo8-15-fp32", "15 Obstacles YOLOv8 FP32", "15Obstacles_yolov8_float32.tflite", O15),
            ("yolo8-15-full-int", "15 Obstacles YOLOv8 Full Integer Quant", "15Obstacles_yolov8_full_integer_quant.tflite", O15),
            ("yolo8-15-int8", "15 Obstacles YOLOv8 INT8", "15Obstacles_yolov8_int8.tflite", O15),
            ("yolo8-15-int-quant", "15 Obstacles YOLOv8 Integer Quant", "15Obstacles_yolov8_integer_quant.tflite", O15),
            ("yolo8-coco-fp32", "YOLOv8 Float32", "yoloV8_float32.tflite", "yoloV8_labels.txt"),
        ];
        let models = table
            .iter()
            .map(|(id, name, model, labels)| ModelEntry {
                id: id.to_string(),
                display_name: name.to_string(),
                model_path: asset_dir.join(model),
                label_path: asset_dir.join(labels),
            })
            .collect();
        Self { models, default_id: "yolo8-18-fp32".into() }
    }

    pub fn get(&self, id: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn default_model(&self) -> &ModelEntry {
        // from_toml/builtin guarantee the default id is present
        self.get(&self.default_id).unwrap_or(&self.models[0])
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// `id`, or the default model when `id` is `None`.
    pub fn resolve(&self, id: Option<&str>) -> Result<&ModelEntry> {
        match id {
            None => Ok(self.default_model()),
            Some(id) => self
                .get(id)
                .with_context(|| format!("unknown model id '{}' (see `rod models`)", id)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelEntry> {
        self.models.iter()
    }
}
