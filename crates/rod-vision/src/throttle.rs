use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Run inference on every n-th camera frame (1 = every frame).
    pub infer_every_n: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self { infer_every_n: 1 }
    }
}

/// Skips a fixed fraction of camera frames to bound inference load.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    every_n: u64,
    frame_counter: u64,
    skipped: u64,
}

impl FrameThrottle {
    pub fn new(cfg: &ThrottleConfig) -> Self {
        Self { every_n: cfg.infer_every_n.max(1) as u64, frame_counter: 0, skipped: 0 }
    }

    /// Call once per incoming frame; `true` when this frame should be analysed.
    pub fn tick_should_infer(&mut self) -> bool {
        self.frame_counter += 1;
        let run = self.frame_counter % self.every_n == 0;
        if !run {
            self.skipped += 1;
        }
        run
    }

    pub fn frames_seen(&self) -> u64 {
        self.frame_counter
    }

    pub fn frames_skipped(&self) -> u64 {
        self.skipped
    }
}
