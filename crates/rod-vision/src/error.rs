use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("output tensor has {len} values, expected {channels}x{elements}")]
    TensorShape {
        len: usize,
        channels: usize,
        elements: usize,
    },

    #[error("output tensor needs at least 5 channels (4 box + 1 class), got {0}")]
    TooFewChannels(usize),

    /// Model and label file disagree. Not expected from a correctly configured model.
    #[error("class index {index} has no label ({labels} labels loaded)")]
    ClassOutOfRange { index: usize, labels: usize },

    #[error("model metadata invalid: {0}")]
    Metadata(String),

    #[error("inference failed")]
    Inference(#[source] anyhow::Error),

    #[error("setup failed")]
    Setup(#[source] anyhow::Error),
}
