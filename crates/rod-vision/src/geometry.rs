use crate::Detection;

/// IoU of two corner-form boxes `(x1, y1, x2, y2)`.
///
/// A non-positive union (both boxes zero-area) yields 0 instead of NaN.
pub fn iou_corners(a: (f32, f32, f32, f32), b: (f32, f32, f32, f32)) -> f32 {
    let (ax1, ay1, ax2, ay2) = a;
    let (bx1, by1, bx2, by2) = b;

    let ix_a = ax1.max(bx1);
    let iy_a = ay1.max(by1);
    let ix_b = ax2.min(bx2);
    let iy_b = ay2.min(by2);

    let iw = (ix_b - ix_a).max(0.0);
    let ih = (iy_b - iy_a).max(0.0);
    let inter = iw * ih;
    let a1 = (ax2 - ax1).max(0.0) * (ay2 - ay1).max(0.0);
    let a2 = (bx2 - bx1).max(0.0) * (by2 - by1).max(0.0);
    let union = a1 + a2 - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

/// IoU of two detections, using their stored width/height for the areas.
pub fn iou(a: &Detection, b: &Detection) -> f32 {
    let iw = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let ih = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = iw * ih;
    let union = a.area() + b.area() - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}
