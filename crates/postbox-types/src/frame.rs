//! Relay frame format, one frame per TCP connection.
//!
//! ```text
//! [0..4]   Payload length (u32 BE)
//! [4..]    JSON payload: {"username": "...", "message": "..."}
//! ```
//!
//! The sender closes its write half after the frame; nothing is sent back.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::FrameError;
use crate::models::Message;

/// Header size in bytes.
pub const FRAME_HEADER: usize = 4;

/// Default ceiling on the payload length (512 KiB).
///
/// JSON escapes a control byte as `\u00XX`, so a 64 KiB form body can grow
/// to six times its size on the wire.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024;

/// Serialize a message into a complete frame (header + payload).
pub fn encode_frame(msg: &Message) -> Result<Bytes, FrameError> {
    let payload = serde_json::to_vec(msg)?;
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER + payload.len());
    buf.put_u32(len);
    buf.put_slice(&payload);
    Ok(buf.freeze())
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, msg: &Message) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(msg)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame.
///
/// Returns `Ok(None)` when the peer closes before sending a single byte.
/// The payload of an oversized frame is never read.
pub async fn read_frame<R>(reader: &mut R, max_size: usize) -> Result<Option<Message>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER];
    let mut filled = 0;
    while filled < FRAME_HEADER {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(FrameError::Truncated)
            };
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header) as usize;
    if len == 0 {
        return Err(FrameError::Empty);
    }
    if len > max_size {
        return Err(FrameError::TooLarge { len, max: max_size });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => FrameError::Truncated,
        _ => FrameError::Io(e),
    })?;

    Ok(Some(serde_json::from_slice(&payload)?))
}
