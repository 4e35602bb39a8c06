pub mod report;

pub use report::{DetectionRecord, FrameReport, ReportOutcome};
