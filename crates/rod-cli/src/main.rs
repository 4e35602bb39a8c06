use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use rod_proto::FrameReport;
use rod_vision::camera::CameraIntrinsics;
use rod_vision::config::{DetectorConfig, DistanceConfig, DistanceKind};
use rod_vision::distance::PinholeEstimator;
use rod_vision::labels::load_labels;
use rod_vision::pipeline::{postprocess, CycleDistance};
use rod_vision::registry::{ModelEntry, ModelRegistry};
use rod_vision::tensor::f32_from_le_bytes;
use rod_vision::throttle::ThrottleConfig;
use rod_vision::{DetectOutcome, ModelMetadata};

#[cfg(feature = "tflite")]
use rod_vision::tflite::{TfliteEngine, TfliteLoader};

#[derive(Debug, Parser)]
#[command(
    name = "rod",
    version,
    about = "Road obstacle detection for visually impaired pedestrians"
)]
struct Cli {
    #[arg(long)]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate config, model registry and the selected model's labels.
    Doctor,
    /// List the registered models.
    Models,
    /// Post-process a raw little-endian f32 output tensor dump.
    Decode {
        #[arg(long)]
        tensor: PathBuf,
        #[arg(long)]
        channels: usize,
        #[arg(long)]
        elements: usize,
        /// Model input edge length in pixels.
        #[arg(long, default_value_t = 640)]
        input_size: u32,
        #[arg(long)]
        frame_width: Option<u32>,
        #[arg(long)]
        frame_height: Option<u32>,
    },
    /// Run the full pipeline on image files.
    #[cfg(feature = "tflite")]
    Detect {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Print the model's tensor layout.
    #[cfg(feature = "tflite")]
    Inspect,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Config {
    detector: DetectorConfig,
    camera: CameraIntrinsics,
    distance: DistanceConfig,
    throttle: ThrottleConfig,
}

fn load_config(path: &Path) -> Result<Config> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let mut cfg: Config = toml::from_str(&s).context("parse config toml")?;

    // registry and asset paths are relative to the config file
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    if let Some(reg) = cfg.detector.registry.as_mut() {
        *reg = base.join(&*reg);
    }
    cfg.detector.asset_dir = base.join(&cfg.detector.asset_dir);
    Ok(cfg)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Models => models(&cfg)?,
        Command::Decode { tensor, channels, elements, input_size, frame_width, frame_height } => {
            let frame = (frame_width.unwrap_or(input_size), frame_height.unwrap_or(input_size));
            decode_dump(&cfg, &tensor, channels, elements, input_size, frame)?
        }
        #[cfg(feature = "tflite")]
        Command::Detect { images } => detect(&cfg, &images)?,
        #[cfg(feature = "tflite")]
        Command::Inspect => inspect(&cfg)?,
    }
    Ok(())
}

fn registry(cfg: &Config) -> Result<ModelRegistry> {
    match &cfg.detector.registry {
        Some(path) => ModelRegistry::load(path),
        None => Ok(ModelRegistry::builtin(&cfg.detector.asset_dir)),
    }
}

fn selected_model(cfg: &Config) -> Result<ModelEntry> {
    let reg = registry(cfg)?;
    Ok(reg.resolve(cfg.detector.model.as_deref())?.clone())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    cfg.detector.validate()?;
    let model = selected_model(cfg)?;
    info!("doctor: model {} ({})", model.id, model.display_name);

    if !model.model_path.exists() {
        warn!("doctor: model file missing: {}", model.model_path.display());
    }
    let labels = load_labels(&model.label_path)?;
    info!("doctor: {} labels", labels.len());

    match cfg.distance.strategy {
        DistanceKind::Pinhole if !cfg.camera.is_complete() => {
            warn!(
                "doctor: pinhole distance selected but [camera] intrinsics are incomplete; \
                 distances will be N/A"
            );
        }
        DistanceKind::HitTest => {
            info!("doctor: hit_test distance needs a live AR session; offline commands report N/A");
        }
        _ => {}
    }
    anyhow::ensure!(cfg.throttle.infer_every_n >= 1, "throttle.infer_every_n must be >= 1");

    info!("doctor: OK");
    Ok(())
}

fn models(cfg: &Config) -> Result<()> {
    let reg = registry(cfg)?;
    for m in reg.iter() {
        let mark = if m.id == reg.default_id() { "*" } else { " " };
        println!("{} {:<20} {:<40} {}", mark, m.id, m.display_name, m.model_path.display());
    }
    Ok(())
}

fn offline_distance(cfg: &Config) -> CycleDistance {
    match cfg.distance.strategy {
        DistanceKind::Disabled => CycleDistance::Disabled,
        DistanceKind::Pinhole => CycleDistance::Pinhole(PinholeEstimator::new(cfg.camera)),
        DistanceKind::HitTest => {
            warn!("hit_test distance is unavailable without an AR session");
            CycleDistance::HitTest(None)
        }
    }
}

fn now_unix_ms() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn decode_dump(
    cfg: &Config,
    tensor: &Path,
    channels: usize,
    elements: usize,
    input_size: u32,
    (frame_width, frame_height): (u32, u32),
) -> Result<()> {
    cfg.detector.validate()?;
    let model = selected_model(cfg)?;
    let labels = load_labels(&model.label_path)?;

    let bytes = std::fs::read(tensor)
        .with_context(|| format!("read tensor dump {}", tensor.display()))?;
    let raw = f32_from_le_bytes(&bytes)?;

    let meta = ModelMetadata {
        tensor_width: input_size,
        tensor_height: input_size,
        channels,
        elements,
        labels,
        confidence_threshold: cfg.detector.confidence_threshold,
        iou_threshold: cfg.detector.iou_threshold,
        max_detections: cfg.detector.max_detections,
        threads: cfg.detector.threads,
        use_acceleration: cfg.detector.use_acceleration,
    };
    meta.validate()?;

    let geom = meta.geometry_for(frame_width, frame_height);
    let dets = postprocess(&meta, &raw, &offline_distance(cfg), &geom)?;
    let outcome = if dets.is_empty() {
        DetectOutcome::Empty
    } else {
        DetectOutcome::Detected(dets)
    };

    let report =
        FrameReport::new(now_unix_ms(), &outcome).with_source(tensor.display().to_string());
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

#[cfg(feature = "tflite")]
fn detect(cfg: &Config, images: &[PathBuf]) -> Result<()> {
    use rod_vision::alert::Alert;
    use rod_vision::ar::ar_channel;
    use rod_vision::pipeline::DistanceStrategy;
    use rod_vision::throttle::FrameThrottle;
    use rod_vision::ObstaclePipeline;

    cfg.detector.validate()?;
    let model = selected_model(cfg)?;

    // no AR session offline: the receiver never sees a frame
    let (_ar_pub, ar_rx) = ar_channel();
    let distance = match cfg.distance.strategy {
        DistanceKind::Disabled => DistanceStrategy::Disabled,
        DistanceKind::Pinhole => DistanceStrategy::Pinhole(cfg.camera),
        DistanceKind::HitTest => DistanceStrategy::HitTest(ar_rx),
    };

    let mut pipeline = ObstaclePipeline::new(model, cfg.detector.clone(), distance);
    pipeline.setup(&TfliteLoader)?;

    let mut throttle = FrameThrottle::new(&cfg.throttle);
    for path in images {
        if !throttle.tick_should_infer() {
            continue;
        }
        let img = image::open(path).with_context(|| format!("open image {}", path.display()))?;
        let outcome = pipeline.detect(&img)?;
        for det in outcome.detections() {
            let alert = Alert::for_detection(det);
            info!("alert: \"{}\" [{}] {}", alert.speech, alert.band.colour(), alert.overlay);
        }
        let report =
            FrameReport::new(now_unix_ms(), &outcome).with_source(path.display().to_string());
        println!("{}", serde_json::to_string(&report)?);
    }
    info!("detect: {} frames seen, {} skipped", throttle.frames_seen(), throttle.frames_skipped());
    Ok(())
}

#[cfg(feature = "tflite")]
fn inspect(cfg: &Config) -> Result<()> {
    let model = selected_model(cfg)?;
    let engine_opts = rod_vision::engine::EngineOptions {
        threads: cfg.detector.threads,
        use_acceleration: cfg.detector.use_acceleration,
    };
    let engine = TfliteEngine::new(&model.model_path, &engine_opts)?;
    print!("{}", engine.inspect()?);
    Ok(())
}
