use crate::distance::{DistanceEstimator, FrameGeometry};
use crate::tensor::OutputTensor;
use crate::{Detection, VisionError};

/// Turns a raw `[1, 4 + classes, anchors]` output into candidate detections.
///
/// Per anchor: best class by strict `>` (lower index wins ties), rejected unless
/// its score is strictly above `conf_th`, center-form box converted to corners,
/// rejected if its size is negative or any corner leaves `[0, 1]` (boxes are
/// dropped, never clamped).
/// `estimator`, when given, attaches a distance to each emitted candidate.
pub fn decode(
    tensor: &OutputTensor<'_>,
    labels: &[String],
    conf_th: f32,
    estimator: Option<(&dyn DistanceEstimator, &FrameGeometry)>,
) -> Result<Vec<Detection>, VisionError> {
    let mut out = Vec::new();

    for anchor in 0..tensor.elements() {
        let (class_id, conf) = tensor.best_class(anchor);
        if conf.is_nan() || conf <= conf_th {
            continue;
        }

        let (cx, cy, w, h) = tensor.box_at(anchor);
        if w < 0.0 || h < 0.0 {
            continue;
        }
        let x1 = cx - w / 2.0;
        let y1 = cy - h / 2.0;
        let x2 = cx + w / 2.0;
        let y2 = cy + h / 2.0;
        if [x1, y1, x2, y2].iter().any(|v| !(0.0..=1.0).contains(v)) {
            continue;
        }

        let class_name = labels
            .get(class_id)
            .ok_or(VisionError::ClassOutOfRange { index: class_id, labels: labels.len() })?
            .clone();

        let det = Detection {
            x1, y1, x2, y2,
            width: w,
            height: h,
            confidence: conf,
            class_id,
            class_name,
            distance: None,
        };
        let distance = estimator.and_then(|(e, geom)| e.estimate(&det, geom));
        out.push(det.with_distance(distance));
    }
    Ok(out)
}
