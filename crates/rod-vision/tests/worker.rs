mod common;

use common::{anchor, entry, frame, labels, tensor};
use image::DynamicImage;
use rod_vision::config::DetectorConfig;
use rod_vision::engine::{InferenceEngine, InputShape, OutputShape};
use rod_vision::pipeline::DistanceStrategy;
use rod_vision::worker::FrameWorker;
use rod_vision::{Detection, DetectionSink, ObstaclePipeline};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Blocks in `run` until the test releases it.
struct GatedEngine {
    started: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
    output: Vec<f32>,
    channels: usize,
    elements: usize,
}

impl InferenceEngine for GatedEngine {
    fn input_shape(&self) -> InputShape {
        InputShape { width: 640, height: 640 }
    }

    fn output_shape(&self) -> OutputShape {
        OutputShape { channels: self.channels, elements: self.elements }
    }

    fn run(&mut self, _image: &DynamicImage) -> anyhow::Result<Vec<f32>> {
        let _ = self.started.send(());
        let _ = self.release.recv();
        Ok(self.output.clone())
    }
}

/// Records which frames reached the sink, identified by their pixel width.
#[derive(Clone, Default)]
struct Seen {
    empty: Arc<Mutex<usize>>,
    detected: Arc<Mutex<Vec<u32>>>,
}

impl DetectionSink for Seen {
    fn on_empty_detect(&mut self) {
        *self.empty.lock().unwrap() += 1;
    }

    fn on_detect(&mut self, _detections: Vec<Detection>, image: &DynamicImage) {
        self.detected.lock().unwrap().push(image.width());
    }
}

/// Frame number `t`, carried as the image width.
fn frame_at(t: u32) -> DynamicImage {
    DynamicImage::new_rgb8(t, 1)
}

fn gated_pipeline() -> (ObstaclePipeline, mpsc::Receiver<()>, mpsc::Sender<()>) {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let (output, channels, elements) =
        tensor(&[anchor(0.5, 0.5, 0.2, 0.2, &[0.9, 0.0, 0.0])], 3);
    let engine = GatedEngine {
        started: started_tx,
        release: release_rx,
        output,
        channels,
        elements,
    };

    let mut pipeline =
        ObstaclePipeline::new(entry(), DetectorConfig::default(), DistanceStrategy::Disabled);
    pipeline.setup_with(Box::new(engine), labels()).unwrap();
    (pipeline, started_rx, release_tx)
}

#[test]
fn busy_worker_analyses_the_newest_frame() {
    let (pipeline, started, release) = gated_pipeline();
    let sink = Seen::default();
    let mut worker = FrameWorker::spawn(pipeline, sink.clone()).unwrap();

    assert!(worker.submit(frame_at(1)));
    started.recv_timeout(Duration::from_secs(5)).unwrap();

    // frame 1 is in flight; frame 3 replaces frame 2 in the waiting slot
    assert!(worker.submit(frame_at(2)));
    assert!(worker.submit(frame_at(3)));
    assert_eq!(worker.dropped_frames(), 1);

    release.send(()).unwrap();
    started.recv_timeout(Duration::from_secs(5)).unwrap();
    release.send(()).unwrap();

    let pipeline = worker.shutdown().unwrap();
    assert!(pipeline.is_ready());
    assert_eq!(*sink.detected.lock().unwrap(), vec![1, 3]);
    assert_eq!(*sink.empty.lock().unwrap(), 0);
}

#[test]
fn every_newer_frame_supersedes_the_waiting_one() {
    let (pipeline, started, release) = gated_pipeline();
    let sink = Seen::default();
    let mut worker = FrameWorker::spawn(pipeline, sink.clone()).unwrap();

    assert!(worker.submit(frame_at(1)));
    started.recv_timeout(Duration::from_secs(5)).unwrap();
    for t in 2..=6 {
        assert!(worker.submit(frame_at(t)));
    }
    assert_eq!(worker.dropped_frames(), 4);

    release.send(()).unwrap();
    started.recv_timeout(Duration::from_secs(5)).unwrap();
    release.send(()).unwrap();

    worker.shutdown().unwrap();
    assert_eq!(*sink.detected.lock().unwrap(), vec![1, 6]);
}

#[test]
fn worker_with_unready_pipeline_reports_nothing() {
    let pipeline =
        ObstaclePipeline::new(entry(), DetectorConfig::default(), DistanceStrategy::Disabled);
    let sink = Seen::default();
    let mut worker = FrameWorker::spawn(pipeline, sink.clone()).unwrap();
    assert!(worker.submit(frame()));

    let pipeline = worker.shutdown().unwrap();
    assert!(!pipeline.is_ready());
    assert_eq!(*sink.empty.lock().unwrap(), 0);
    assert!(sink.detected.lock().unwrap().is_empty());
}
