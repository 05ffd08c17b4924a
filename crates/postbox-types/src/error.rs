use thiserror::Error;

/// Malformed `application/x-www-form-urlencoded` submission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("form body is not valid UTF-8")]
    InvalidUtf8,

    #[error("form pair {0:?} has no '=' separator")]
    MissingSeparator(String),

    #[error("form field {0:?} given more than once")]
    DuplicateField(&'static str),
}

/// Failure to read or build a relay frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame declares zero-length payload")]
    Empty,

    #[error("frame payload of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },

    #[error("stream closed mid-frame")]
    Truncated,

    #[error("invalid frame payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True for errors caused by the bytes the peer sent, as opposed to the
    /// transport itself failing.
    pub fn is_decode(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}
