//! Detection pipeline: inference -> decode -> NMS -> distance -> outcome.
//!
//! ```text
//! Uninitialized --setup() ok--> Ready --detect()--> Ready
//!       ^                         |
//!       +------setup() err--------+
//! ```

use image::DynamicImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::ar::{ArFrameReceiver, ArSnapshot};
use crate::camera::CameraIntrinsics;
use crate::config::DetectorConfig;
use crate::decode::decode;
use crate::distance::{DistanceEstimator, FrameGeometry, HitTestEstimator, PinholeEstimator};
use crate::engine::{EngineLoader, EngineOptions, InferenceEngine};
use crate::labels::load_labels;
use crate::registry::ModelEntry;
use crate::tensor::{OutputTensor, BOX_CHANNELS};
use crate::{non_max_suppression, Detection, VisionError};

/// Everything needed to interpret one model's output. Fixed after `setup()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMetadata {
    pub tensor_width: u32,
    pub tensor_height: u32,
    pub channels: usize,
    pub elements: usize,
    /// Index = class id.
    pub labels: Vec<String>,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub threads: u32,
    pub use_acceleration: bool,
}

impl ModelMetadata {
    /// Zero sizes mean the model was never (fully) loaded.
    pub fn is_usable(&self) -> bool {
        self.tensor_width > 0 && self.tensor_height > 0 && self.channels > 0 && self.elements > 0
    }

    pub fn num_classes(&self) -> usize {
        self.channels.saturating_sub(BOX_CHANNELS)
    }

    pub fn validate(&self) -> Result<(), VisionError> {
        if !self.is_usable() {
            return Err(VisionError::Metadata(format!(
                "zero-sized model: input {}x{}, output {}x{}",
                self.tensor_width, self.tensor_height, self.channels, self.elements
            )));
        }
        if self.channels <= BOX_CHANNELS {
            return Err(VisionError::TooFewChannels(self.channels));
        }
        if self.labels.len() < self.num_classes() {
            return Err(VisionError::Metadata(format!(
                "model has {} classes but only {} labels",
                self.num_classes(),
                self.labels.len()
            )));
        }
        Ok(())
    }

    pub fn geometry_for(&self, frame_width: u32, frame_height: u32) -> FrameGeometry {
        FrameGeometry {
            tensor_width: self.tensor_width,
            tensor_height: self.tensor_height,
            frame_width,
            frame_height,
        }
    }
}

/// Which distance model a pipeline runs. At most one per pipeline.
#[derive(Debug, Clone, Default)]
pub enum DistanceStrategy {
    #[default]
    Disabled,
    /// Monocular estimate, attached while decoding.
    Pinhole(CameraIntrinsics),
    /// AR hit test, attached to the NMS survivors.
    HitTest(ArFrameReceiver),
}

impl DistanceStrategy {
    /// Freezes per-cycle inputs. For `HitTest` this reads the AR snapshot once so all
    /// boxes of a frame share one camera pose.
    pub fn begin_cycle(&self) -> CycleDistance {
        match self {
            DistanceStrategy::Disabled => CycleDistance::Disabled,
            DistanceStrategy::Pinhole(i) => CycleDistance::Pinhole(PinholeEstimator::new(*i)),
            DistanceStrategy::HitTest(rx) => CycleDistance::HitTest(rx.latest()),
        }
    }
}

#[derive(Debug)]
pub enum CycleDistance {
    Disabled,
    Pinhole(PinholeEstimator),
    /// `None` until the AR session has produced its first frame.
    HitTest(Option<Arc<ArSnapshot>>),
}

/// Decode + NMS + distance over one raw output tensor.
pub fn postprocess(
    meta: &ModelMetadata,
    raw: &[f32],
    distance: &CycleDistance,
    geom: &FrameGeometry,
) -> Result<Vec<Detection>, VisionError> {
    let tensor = OutputTensor::new(raw, meta.channels, meta.elements)?;

    let decode_estimator = match distance {
        CycleDistance::Pinhole(p) => Some((p as &dyn DistanceEstimator, geom)),
        _ => None,
    };
    let candidates = decode(&tensor, &meta.labels, meta.confidence_threshold, decode_estimator)?;
    let n_candidates = candidates.len();
    let mut selected = non_max_suppression(candidates, meta.iou_threshold, meta.max_detections);

    match distance {
        CycleDistance::HitTest(Some(snap)) => {
            let est = HitTestEstimator::new(snap);
            for d in &mut selected {
                d.distance = est.estimate(d, geom);
            }
        }
        CycleDistance::HitTest(None) if !selected.is_empty() => {
            debug!("ar: no frame available yet, distances omitted");
        }
        _ => {}
    }

    debug!("postprocess: {} candidates -> {} after nms", n_candidates, selected.len());
    Ok(selected)
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectOutcome {
    /// `setup()` has not completed; nothing was run.
    NotReady,
    /// Ran, nothing survived filtering.
    Empty,
    /// NMS survivors, most confident first.
    Detected(Vec<Detection>),
}

impl DetectOutcome {
    pub fn detections(&self) -> &[Detection] {
        match self {
            DetectOutcome::Detected(d) => d,
            _ => &[],
        }
    }
}

/// Push-style consumer of detect results (overlay, speech, vibration).
pub trait DetectionSink {
    fn on_empty_detect(&mut self);
    fn on_detect(&mut self, detections: Vec<Detection>, image: &DynamicImage);
}

/// Shared view of a pipeline's readiness.
#[derive(Debug, Clone)]
pub struct ReadyHandle(Arc<AtomicBool>);

impl ReadyHandle {
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct Loaded {
    engine: Box<dyn InferenceEngine>,
    meta: ModelMetadata,
}

pub struct ObstaclePipeline {
    model: ModelEntry,
    cfg: DetectorConfig,
    distance: DistanceStrategy,
    loaded: Option<Loaded>,
    ready: Arc<AtomicBool>,
}

impl ObstaclePipeline {
    pub fn new(model: ModelEntry, cfg: DetectorConfig, distance: DistanceStrategy) -> Self {
        Self {
            model,
            cfg,
            distance,
            loaded: None,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions { threads: self.cfg.threads, use_acceleration: self.cfg.use_acceleration }
    }

    /// Loads the model and labels. Blocking; run it off the UI thread. On error the
    /// pipeline stays (or becomes) not ready.
    pub fn setup(&mut self, loader: &dyn EngineLoader) -> Result<(), VisionError> {
        self.reset();
        let engine = loader
            .load(&self.model.model_path, &self.engine_options())
            .map_err(VisionError::Setup)?;
        let labels = load_labels(&self.model.label_path).map_err(VisionError::Setup)?;
        self.install(engine, labels)
    }

    /// Same as [`setup`](Self::setup) with an engine and labels the caller already has.
    pub fn setup_with(
        &mut self,
        engine: Box<dyn InferenceEngine>,
        labels: Vec<String>,
    ) -> Result<(), VisionError> {
        self.reset();
        self.install(engine, labels)
    }

    fn reset(&mut self) {
        self.ready.store(false, Ordering::Release);
        self.loaded = None;
    }

    fn install(
        &mut self,
        engine: Box<dyn InferenceEngine>,
        labels: Vec<String>,
    ) -> Result<(), VisionError> {
        let input = engine.input_shape();
        let output = engine.output_shape();
        let meta = ModelMetadata {
            tensor_width: input.width,
            tensor_height: input.height,
            channels: output.channels,
            elements: output.elements,
            labels,
            confidence_threshold: self.cfg.confidence_threshold,
            iou_threshold: self.cfg.iou_threshold,
            max_detections: self.cfg.max_detections,
            threads: self.cfg.threads,
            use_acceleration: self.cfg.use_acceleration,
        };
        meta.validate()?;

        info!(
            "pipeline: ready model={} input={}x{} output={}x{} classes={} conf>{} iou>={}",
            self.model.id,
            meta.tensor_width,
            meta.tensor_height,
            meta.channels,
            meta.elements,
            meta.num_classes(),
            meta.confidence_threshold,
            meta.iou_threshold
        );
        self.loaded = Some(Loaded { engine, meta });
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn ready_handle(&self) -> ReadyHandle {
        ReadyHandle(self.ready.clone())
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.loaded.as_ref().map(|l| &l.meta)
    }

    pub fn model(&self) -> &ModelEntry {
        &self.model
    }

    /// Runs one frame through the whole pipeline.
    ///
    /// Returns `NotReady` without touching the engine when called before `setup()`
    /// finished.
    pub fn detect(&mut self, image: &DynamicImage) -> Result<DetectOutcome, VisionError> {
        if !self.is_ready() {
            debug!("pipeline: detect called before setup, frame ignored");
            return Ok(DetectOutcome::NotReady);
        }
        let Some(loaded) = self.loaded.as_mut() else {
            return Ok(DetectOutcome::NotReady);
        };
        if !loaded.meta.is_usable() {
            return Ok(DetectOutcome::NotReady);
        }

        let cycle = self.distance.begin_cycle();

        let t0 = Instant::now();
        let raw = loaded.engine.run(image).map_err(VisionError::Inference)?;
        let t_infer = t0.elapsed();

        let t1 = Instant::now();
        let geom = loaded.meta.geometry_for(image.width(), image.height());
        let dets = postprocess(&loaded.meta, &raw, &cycle, &geom)?;
        debug!(
            "pipeline: model={} inference={:?} postprocess={:?} detections={}",
            self.model.id,
            t_infer,
            t1.elapsed(),
            dets.len()
        );

        Ok(if dets.is_empty() { DetectOutcome::Empty } else { DetectOutcome::Detected(dets) })
    }

    /// Callback form of [`detect`](Self::detect): exactly one sink method per ready
    /// call, none when not ready. Delivered synchronously on the caller's thread.
    pub fn detect_into(
        &mut self,
        image: &DynamicImage,
        sink: &mut dyn DetectionSink,
    ) -> Result<(), VisionError> {
        match self.detect(image)? {
            DetectOutcome::NotReady => {}
            DetectOutcome::Empty => sink.on_empty_detect(),
            DetectOutcome::Detected(dets) => sink.on_detect(dets, image),
        }
        Ok(())
    }
}
