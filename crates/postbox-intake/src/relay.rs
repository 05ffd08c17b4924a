use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use postbox_types::{DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER, FrameError, Message, encode_frame};

use crate::config::IntakeConfig;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot connect to relay at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to relay at {addr} timed out after {after_ms} ms")]
    ConnectTimeout { addr: String, after_ms: u128 },

    #[error("cannot encode frame: {0}")]
    Encode(#[source] FrameError),

    #[error("frame payload of {len} bytes exceeds the relay limit of {max}")]
    Oversized { len: usize, max: usize },

    #[error("relay write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("relay write timed out after {after_ms} ms")]
    WriteTimeout { after_ms: u128 },
}

impl TransportError {
    /// The connection was never established, so the sink cannot have the message.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectTimeout { .. })
    }
}

/// Sends one message per fresh connection to the relay sink.
///
/// Fire-and-forget: the sink sends no acknowledgement, so success means the
/// local transport accepted the bytes.
#[derive(Debug, Clone)]
pub struct RelayClient {
    addr: String,
    connect_timeout: Duration,
    write_timeout: Duration,
    max_frame_size: usize,
}

impl RelayClient {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
            write_timeout,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    pub fn from_config(config: &IntakeConfig) -> Self {
        Self::new(
            config.relay_addr.clone(),
            config.connect_timeout,
            config.write_timeout,
        )
        .with_max_frame_size(config.max_frame_size)
    }

    /// Payload ceiling of the sink. Frames above it are refused before connecting.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn send(&self, msg: &Message) -> Result<(), TransportError> {
        let frame = encode_frame(msg).map_err(TransportError::Encode)?;
        let len = frame.len() - FRAME_HEADER;
        if len > self.max_frame_size {
            return Err(TransportError::Oversized {
                len,
                max: self.max_frame_size,
            });
        }

        let mut stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| TransportError::ConnectTimeout {
                addr: self.addr.clone(),
                after_ms: self.connect_timeout.as_millis(),
            })?
            .map_err(|source| TransportError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        stream.set_nodelay(true).ok();

        tokio::time::timeout(self.write_timeout, async {
            stream.write_all(&frame).await?;
            stream.shutdown().await
        })
        .await
        .map_err(|_| TransportError::WriteTimeout {
            after_ms: self.write_timeout.as_millis(),
        })?
        .map_err(TransportError::Write)
    }
}
