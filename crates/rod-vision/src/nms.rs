use crate::{geometry, Detection};

/// Greedy class-agnostic NMS.
///
/// Keeps the most confident remaining box, drops everything overlapping it with
/// `IoU >= iou_th`, repeats. Result is in descending confidence order; equal
/// confidences keep their input order. `max_det == 0` means no cap.
pub fn non_max_suppression(
    mut dets: Vec<Detection>,
    iou_th: f32,
    max_det: usize,
) -> Vec<Detection> {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::new();

    'outer: for d in dets {
        for k in &kept {
            if geometry::iou(&d, k) >= iou_th {
                continue 'outer;
            }
        }
        kept.push(d);
        if max_det > 0 && kept.len() >= max_det {
            break;
        }
    }
    kept
}
