#![allow(dead_code)]

use image::DynamicImage;
use rod_vision::engine::{InferenceEngine, InputShape, OutputShape};
use rod_vision::registry::ModelEntry;
use std::path::PathBuf;

pub const LABELS: [&str; 3] = ["person", "car", "tree"];

pub fn labels() -> Vec<String> {
    LABELS.iter().map(|s| s.to_string()).collect()
}

/// One anchor: center box plus one score per class.
pub struct Anchor {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
    pub scores: Vec<f32>,
}

pub fn anchor(cx: f32, cy: f32, w: f32, h: f32, scores: &[f32]) -> Anchor {
    Anchor { cx, cy, w, h, scores: scores.to_vec() }
}

/// Lays anchors out channel-major, `[1, 4 + classes, anchors]`.
pub fn tensor(anchors: &[Anchor], classes: usize) -> (Vec<f32>, usize, usize) {
    let channels = 4 + classes;
    let elements = anchors.len();
    let mut data = vec![0.0; channels * elements];
    for (a, an) in anchors.iter().enumerate() {
        let mut row = vec![an.cx, an.cy, an.w, an.h];
        row.extend_from_slice(&an.scores);
        row.resize(channels, 0.0);
        for (c, v) in row.into_iter().enumerate() {
            data[a + elements * c] = v;
        }
    }
    (data, channels, elements)
}

/// Returns the same output for every frame.
pub struct FixedEngine {
    pub output: Vec<f32>,
    pub channels: usize,
    pub elements: usize,
}

impl FixedEngine {
    pub fn new(anchors: &[Anchor]) -> Self {
        let (output, channels, elements) = tensor(anchors, LABELS.len());
        Self { output, channels, elements }
    }
}

impl InferenceEngine for FixedEngine {
    fn input_shape(&self) -> InputShape {
        InputShape { width: 640, height: 640 }
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape { channels: self.channels, elements: self.elements }
    }

    fn run(&mut self, _image: &DynamicImage) -> anyhow::Result<Vec<f32>> {
        Ok(self.output.clone())
    }
}

pub fn entry() -> ModelEntry {
    ModelEntry {
        id: "test".into(),
        display_name: "Test model".into(),
        model_path: PathBuf::from("test.tflite"),
        label_path: PathBuf::from("labels.txt"),
    }
}

pub fn frame() -> DynamicImage {
    DynamicImage::new_rgb8(1280, 960)
}
