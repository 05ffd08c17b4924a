use postbox_types::FrameError;
use thiserror::Error;

/// Why a single relay cycle ended without persisting its message.
///
/// Always contained to the connection that produced it.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("decode failed: {0}")]
    Decode(#[source] FrameError),

    #[error("{stage} timed out after {after_ms} ms")]
    Timeout { stage: &'static str, after_ms: u128 },

    #[error("persist failed: {0:#}")]
    Persist(anyhow::Error),

    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FrameError> for RelayError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Io(io) => Self::Io(io),
            other => Self::Decode(other),
        }
    }
}
