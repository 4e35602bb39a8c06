use serde::Serialize;
use std::time::Duration;

use crate::Detection;

/// Haptic pulse length for an obstacle alert.
pub const VIBRATION: Duration = Duration::from_millis(500);

/// Box colour buckets used by the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn of(confidence: f32) -> Self {
        if confidence >= 0.7 {
            ConfidenceBand::High
        } else if confidence >= 0.4 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    /// Overlay colour name (green / yellow / red).
    pub fn colour(self) -> &'static str {
        match self {
            ConfidenceBand::High => "green",
            ConfidenceBand::Medium => "yellow",
            ConfidenceBand::Low => "red",
        }
    }
}

/// What the presentation layer needs to warn the user about one detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub speech: String,
    pub overlay: String,
    pub band: ConfidenceBand,
    pub vibrate_ms: u64,
}

impl Alert {
    pub fn for_detection(det: &Detection) -> Self {
        Self {
            speech: format!("You are approaching to {}", det.class_name),
            overlay: overlay_label(det),
            band: ConfidenceBand::of(det.confidence),
            vibrate_ms: VIBRATION.as_millis() as u64,
        }
    }
}

/// `"car (0.82) in 3.40 m"`, or `"car (0.82) in N/A"` without a distance.
pub fn overlay_label(det: &Detection) -> String {
    let distance = match det.distance {
        Some(d) => format!("{:.2} m", d.meters()),
        None => "N/A".to_string(),
    };
    format!("{} ({:.2}) in {}", det.class_name, det.confidence, distance)
}
