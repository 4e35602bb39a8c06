//! Background detection thread.
//!
//! The worker owns the pipeline and processes one frame at a time. Frames are
//! handed over through a single latest-wins slot: a frame submitted while another
//! is still waiting replaces it, so the worker always picks up the newest camera
//! image and results never lag behind the camera.

use image::DynamicImage;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, warn};

use crate::pipeline::{DetectionSink, ObstaclePipeline};

#[derive(Default)]
struct Slot {
    frame: Option<DynamicImage>,
    closed: bool,
}

#[derive(Default)]
struct Handoff {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Handoff {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        // a panicking sink must not wedge the camera side
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until a frame is waiting. `None` once closed and drained.
    fn next_frame(&self) -> Option<DynamicImage> {
        let mut slot = self.lock();
        loop {
            if let Some(frame) = slot.frame.take() {
                return Some(frame);
            }
            if slot.closed {
                return None;
            }
            slot = self.ready.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }
}

pub struct FrameWorker {
    handoff: Arc<Handoff>,
    handle: Option<JoinHandle<ObstaclePipeline>>,
    dropped: u64,
}

impl FrameWorker {
    /// Starts the worker thread. The pipeline should already be set up; frames that
    /// arrive while it is not ready are ignored by the pipeline itself.
    pub fn spawn<S>(mut pipeline: ObstaclePipeline, mut sink: S) -> std::io::Result<Self>
    where
        S: DetectionSink + Send + 'static,
    {
        let handoff = Arc::new(Handoff::default());
        let worker_side = handoff.clone();
        let handle = std::thread::Builder::new()
            .name("rod-detect".into())
            .spawn(move || {
                while let Some(frame) = worker_side.next_frame() {
                    if let Err(e) = pipeline.detect_into(&frame, &mut sink) {
                        warn!("worker: frame failed: {:#}", anyhow::Error::from(e));
                    }
                }
                debug!("worker: handoff closed, exiting");
                pipeline
            })?;
        Ok(Self { handoff, handle: Some(handle), dropped: 0 })
    }

    /// Hands a frame to the worker. A frame still waiting from an earlier call is
    /// replaced and counted as dropped. Returns `false` when the worker has stopped.
    pub fn submit(&mut self, frame: DynamicImage) -> bool {
        let finished = self.handle.as_ref().map_or(true, |h| h.is_finished());
        let mut slot = self.handoff.lock();
        if slot.closed || finished {
            warn!("worker: thread gone, frame dropped");
            self.dropped += 1;
            return false;
        }
        if slot.frame.replace(frame).is_some() {
            debug!("worker: busy, replaced waiting frame");
            self.dropped += 1;
        }
        drop(slot);
        self.handoff.ready.notify_one();
        true
    }

    /// Frames that were never analysed: superseded while waiting, or submitted
    /// after the worker stopped.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    /// Finishes the frame in flight and the one waiting, stops the thread and
    /// returns the pipeline.
    pub fn shutdown(mut self) -> Option<ObstaclePipeline> {
        self.handoff.close();
        self.handle.take().and_then(|h| h.join().ok())
    }
}

impl Drop for FrameWorker {
    fn drop(&mut self) {
        self.handoff.close();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}
