use serde::{Deserialize, Serialize};

use rod_vision::alert::{overlay_label, ConfidenceBand};
use rod_vision::{DetectOutcome, Detection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    NotReady,
    Empty,
    Detected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// `[x1, y1, x2, y2]`, normalized.
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class_id: usize,
    pub class: String,
    pub distance_m: Option<f32>,
    pub band: String,
    pub overlay: String,
}

impl From<&Detection> for DetectionRecord {
    fn from(d: &Detection) -> Self {
        Self {
            bbox: [d.x1, d.y1, d.x2, d.y2],
            confidence: d.confidence,
            class_id: d.class_id,
            class: d.class_name.clone(),
            distance_m: d.distance.map(|m| m.meters()),
            band: ConfidenceBand::of(d.confidence).colour().to_string(),
            overlay: overlay_label(d),
        }
    }
}

/// One analysed frame, as emitted to the presentation layer (one JSON line each).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub ts_unix_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub outcome: ReportOutcome,
    pub detections: Vec<DetectionRecord>,
}

impl FrameReport {
    pub fn new(ts_unix_ms: i64, outcome: &DetectOutcome) -> Self {
        let kind = match outcome {
            DetectOutcome::NotReady => ReportOutcome::NotReady,
            DetectOutcome::Empty => ReportOutcome::Empty,
            DetectOutcome::Detected(_) => ReportOutcome::Detected,
        };
        Self {
            ts_unix_ms,
            source: None,
            outcome: kind,
            detections: outcome.detections().iter().map(DetectionRecord::from).collect(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rod_vision::Distance;

    fn det() -> Detection {
        Detection {
            x1: 0.1, y1: 0.2, x2: 0.3, y2: 0.6,
            width: 0.2, height: 0.4,
            confidence: 0.5, class_id: 6, class_name: "person".into(),
            distance: Some(Distance::from_millimeters(2500.0)),
        }
    }

    #[test]
    fn record_carries_presentation_fields() {
        let r = DetectionRecord::from(&det());
        assert_eq!(r.bbox, [0.1, 0.2, 0.3, 0.6]);
        assert_eq!(r.class, "person");
        assert_eq!(r.band, "yellow");
        assert_eq!(r.overlay, "person (0.50) in 2.50 m");
        assert!((r.distance_m.unwrap() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn report_json_shape() {
        let report = FrameReport::new(1_700_000_000_000, &DetectOutcome::Detected(vec![det()]));
        let v = serde_json::to_value(&report).unwrap();
        assert_eq!(v["outcome"], "detected");
        assert_eq!(v["detections"][0]["class"], "person");
        assert!(v.get("source").is_none());

        let empty = FrameReport::new(0, &DetectOutcome::Empty).with_source("frame.jpg");
        let v = serde_json::to_value(&empty).unwrap();
        assert_eq!(v["outcome"], "empty");
        assert_eq!(v["source"], "frame.jpg");
        assert!(v["detections"].as_array().unwrap().is_empty());
    }
}
