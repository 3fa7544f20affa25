use thiserror::Error;

/// All errors produced by myostream-core.
#[derive(Debug, Error)]
pub enum MyoError {
    #[error("frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    #[error("chunk shape mismatch: buffer holds {expected} channels, chunk has {actual}")]
    ChannelShape { expected: usize, actual: usize },

    #[error("channel index {index} out of range (0..{channels})")]
    ChannelRange { index: usize, channels: usize },

    #[error("ingestion service is already running")]
    AlreadyRunning,

    #[error("ingestion service is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MyoError>;
