use serde::Deserialize;

/// Optics of the back camera, as reported by the platform camera service.
///
/// Either value may be missing on devices that do not expose it; pinhole distance
/// estimation is skipped in that case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct CameraIntrinsics {
    /// First reported focal length (mm). Multi-lens devices report several.
    pub focal_length_mm: Option<f32>,
    /// Physical sensor height (mm).
    pub sensor_height_mm: Option<f32>,
}

impl CameraIntrinsics {
    pub fn new(focal_length_mm: f32, sensor_height_mm: f32) -> Self {
        Self {
            focal_length_mm: Some(focal_length_mm),
            sensor_height_mm: Some(sensor_height_mm),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(
            (self.focal_length_mm, self.sensor_height_mm),
            (Some(f), Some(s)) if f > 0.0 && s > 0.0
        )
    }
}
