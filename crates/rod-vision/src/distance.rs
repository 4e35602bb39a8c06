//! Distance to a detected obstacle.
//!
//! Two independent models sit behind [`DistanceEstimator`]:
//! - [`PinholeEstimator`]: monocular, uses an assumed real-world height per class
//!   and the camera intrinsics.
//! - [`HitTestEstimator`]: ray-casts the box center into the AR scene and measures
//!   camera-to-hit distance.
//!
//! A pipeline runs at most one of them.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::ar::ArSnapshot;
use crate::camera::CameraIntrinsics;
use crate::Detection;

/// Length in meters; serialized as meters. The estimators only produce positive
/// values.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distance(f32);

impl Distance {
    pub fn from_meters(m: f32) -> Self {
        Self(m)
    }

    pub fn from_millimeters(mm: f32) -> Self {
        Self(mm / 1000.0)
    }

    pub fn meters(self) -> f32 {
        self.0
    }

    pub fn millimeters(self) -> f32 {
        self.0 * 1000.0
    }
}

/// Assumed real-world height (meters) per obstacle class.
static REAL_WORLD_SIZES: Lazy<HashMap<&'static str, f32>> = Lazy::new(|| {
    HashMap::from([
        ("bicycle", 0.6),
        ("bus", 2.5),
        ("car", 1.8),
        ("dog", 0.5),
        ("electric pole", 0.3),
        ("motorcycle", 0.8),
        ("person", 0.5),
        ("traffic sign", 0.7),
        ("tree", 1.5),
        ("uncovered manhole", 0.7),
    ])
});

/// Case-insensitive lookup in the real-world size table.
pub fn real_world_height_m(class_name: &str) -> Option<f32> {
    REAL_WORLD_SIZES.get(class_name.to_lowercase().as_str()).copied()
}

/// Pixel sizes the estimators need to interpret a normalized box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Model input size.
    pub tensor_width: u32,
    pub tensor_height: u32,
    /// Full camera frame the boxes are projected back onto.
    pub frame_width: u32,
    pub frame_height: u32,
}

pub trait DistanceEstimator {
    fn estimate(&self, det: &Detection, geom: &FrameGeometry) -> Option<Distance>;
}

/// `distance_mm = f_mm * H_mm * image_px / (object_px * sensor_mm)`.
///
/// Returns `None` unless every input is positive and the result is finite.
pub fn pinhole_distance_mm(
    focal_length_mm: f32,
    real_height_mm: f32,
    image_height_px: f32,
    object_height_px: f32,
    sensor_height_mm: f32,
) -> Option<f32> {
    let inputs = [
        focal_length_mm,
        real_height_mm,
        image_height_px,
        object_height_px,
        sensor_height_mm,
    ];
    // also rejects NaN
    if !inputs.iter().all(|v| *v > 0.0) {
        return None;
    }
    let d = (focal_length_mm * real_height_mm * image_height_px)
        / (object_height_px * sensor_height_mm);
    (d.is_finite() && d > 0.0).then_some(d)
}

#[derive(Debug, Clone, Copy)]
pub struct PinholeEstimator {
    intrinsics: CameraIntrinsics,
}

impl PinholeEstimator {
    pub fn new(intrinsics: CameraIntrinsics) -> Self {
        Self { intrinsics }
    }
}

impl DistanceEstimator for PinholeEstimator {
    fn estimate(&self, det: &Detection, geom: &FrameGeometry) -> Option<Distance> {
        if !self.intrinsics.is_complete() {
            return None;
        }
        let real_m = real_world_height_m(&det.class_name)?;
        let focal = self.intrinsics.focal_length_mm?;
        let sensor = self.intrinsics.sensor_height_mm?;
        let image_px = geom.tensor_height as f32;
        let object_px = det.height * image_px;
        pinhole_distance_mm(focal, real_m * 1000.0, image_px, object_px, sensor)
            .map(Distance::from_millimeters)
    }
}

/// Measures against one AR snapshot; build a new one per detect cycle.
pub struct HitTestEstimator<'a> {
    snapshot: &'a ArSnapshot,
}

impl<'a> HitTestEstimator<'a> {
    pub fn new(snapshot: &'a ArSnapshot) -> Self {
        Self { snapshot }
    }
}

impl DistanceEstimator for HitTestEstimator<'_> {
    fn estimate(&self, det: &Detection, geom: &FrameGeometry) -> Option<Distance> {
        let (cx, cy) = det.center();
        let x = cx * geom.frame_width as f32;
        let y = cy * geom.frame_height as f32;

        let hits = match self.snapshot.frame.hit_test(x, y) {
            Ok(h) => h,
            Err(e) => {
                warn!("ar: hit test failed at ({:.1}, {:.1}): {:#}", x, y, e);
                return None;
            }
        };
        let Some(hit) = hits.first() else {
            debug!("ar: no surface at ({:.1}, {:.1}) for {}", x, y, det.class_name);
            return None;
        };
        Some(Distance::from_meters(self.snapshot.camera_pose.distance_to(hit)))
    }
}
