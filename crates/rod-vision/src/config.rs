use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Registry id; the registry default when unset.
    pub model: Option<String>,
    /// Path to `models.toml`. Falls back to the built-in registry rooted at `asset_dir`.
    pub registry: Option<PathBuf>,
    pub asset_dir: PathBuf,

    pub threads: u32,
    pub use_acceleration: bool,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// 0 = unlimited
    pub max_detections: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model: None,
            registry: None,
            asset_dir: PathBuf::from("assets"),
            threads: 3,
            use_acceleration: true,
            confidence_threshold: 0.35,
            iou_threshold: 0.3,
            max_detections: 0,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.threads >= 1, "detector.threads must be >= 1");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.confidence_threshold),
            "detector.confidence_threshold must be in [0, 1], got {}",
            self.confidence_threshold
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.iou_threshold),
            "detector.iou_threshold must be in [0, 1], got {}",
            self.iou_threshold
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceKind {
    Disabled,
    #[default]
    Pinhole,
    HitTest,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    pub strategy: DistanceKind,
}
