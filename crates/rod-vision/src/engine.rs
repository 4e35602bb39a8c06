use anyhow::Result;
use image::DynamicImage;
use std::path::Path;

/// Model input size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
    pub width: u32,
    pub height: u32,
}

/// Output `[1, channels, elements]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputShape {
    pub channels: usize,
    pub elements: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub threads: u32,
    pub use_acceleration: bool,
}

/// A loaded detector network. Resizing/normalisation of the frame is the engine's job.
pub trait InferenceEngine: Send {
    fn input_shape(&self) -> InputShape;
    fn output_shape(&self) -> OutputShape;
    /// Runs one frame; returns the flat output tensor.
    fn run(&mut self, image: &DynamicImage) -> Result<Vec<f32>>;
}

pub trait EngineLoader {
    fn load(&self, model_path: &Path, opts: &EngineOptions) -> Result<Box<dyn InferenceEngine>>;
}
