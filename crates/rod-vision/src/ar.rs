//! Handoff of AR tracking state to the detection thread.
//!
//! The AR session updates at its own rate. It publishes immutable snapshots here
//! and the pipeline reads exactly one snapshot per detect cycle, so every box of a
//! frame is measured against the same camera pose.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;

/// World-space position (meters). Orientation is not needed for straight-line distance.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub tx: f32,
    pub ty: f32,
    pub tz: f32,
}

impl Pose {
    pub fn new(tx: f32, ty: f32, tz: f32) -> Self {
        Self { tx, ty, tz }
    }

    pub fn distance_to(&self, other: &Pose) -> f32 {
        let dx = other.tx - self.tx;
        let dy = other.ty - self.ty;
        let dz = other.tz - self.tz;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// One tracked AR frame.
pub trait ArFrame: Send + Sync {
    /// Casts a ray through the screen point `(x, y)` (camera-frame pixels) and
    /// returns the hit poses nearest first. Empty when nothing was hit.
    fn hit_test(&self, x: f32, y: f32) -> Result<Vec<Pose>>;
}

#[derive(Clone)]
pub struct ArSnapshot {
    pub frame: Arc<dyn ArFrame>,
    pub camera_pose: Pose,
}

impl std::fmt::Debug for ArSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArSnapshot").field("camera_pose", &self.camera_pose).finish_non_exhaustive()
    }
}

/// Writer side, owned by the AR session callback.
#[derive(Debug)]
pub struct ArFramePublisher {
    tx: watch::Sender<Option<Arc<ArSnapshot>>>,
}

/// Reader side, handed to the pipeline. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ArFrameReceiver {
    rx: watch::Receiver<Option<Arc<ArSnapshot>>>,
}

pub fn ar_channel() -> (ArFramePublisher, ArFrameReceiver) {
    let (tx, rx) = watch::channel(None);
    (ArFramePublisher { tx }, ArFrameReceiver { rx })
}

impl ArFramePublisher {
    pub fn publish(&self, frame: Arc<dyn ArFrame>, camera_pose: Pose) {
        self.tx.send_replace(Some(Arc::new(ArSnapshot { frame, camera_pose })));
    }

    /// Drops the current snapshot, e.g. when tracking is lost.
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn subscribe(&self) -> ArFrameReceiver {
        ArFrameReceiver { rx: self.tx.subscribe() }
    }
}

impl ArFrameReceiver {
    /// Latest published snapshot, or `None` before the first AR frame.
    pub fn latest(&self) -> Option<Arc<ArSnapshot>> {
        self.rx.borrow().clone()
    }
}
