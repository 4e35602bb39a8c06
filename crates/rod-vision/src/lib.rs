mod error;
mod geometry;
mod nms;
pub mod alert;
pub mod ar;
pub mod camera;
pub mod config;
pub mod decode;
pub mod distance;
pub mod engine;
pub mod labels;
pub mod pipeline;
pub mod registry;
pub mod tensor;
pub mod throttle;
pub mod worker;

#[cfg(feature = "tflite")]
pub mod tflite;

use serde::{Deserialize, Serialize};

pub use distance::Distance;
pub use error::VisionError;
pub use geometry::{iou, iou_corners};
pub use nms::non_max_suppression;
pub use pipeline::{DetectOutcome, DetectionSink, ModelMetadata, ObstaclePipeline};

/// One decoded obstacle. Box corners are normalized to the model input (0..1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    // normalized, kept next to the corners so IoU does not recompute them
    pub width: f32,
    pub height: f32,

    pub confidence: f32,
    pub class_id: usize,
    pub class_name: String,

    /// `None` when no distance model fired or no AR surface was hit.
    pub distance: Option<Distance>,
}

impl Detection {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Box center, normalized.
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn with_distance(mut self, distance: Option<Distance>) -> Self {
        self.distance = distance;
        self
    }
}
