//! Length/type/sequence framing over a byte stream
//!
//! Every frame is `[payload_len u32 LE][wire_id u16 LE][seq u32 LE][payload]`.
//! The length is validated against a cap before any allocation happens, so a
//! corrupt or hostile peer cannot make us reserve arbitrary memory.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Bytes in the fixed frame header
pub const FRAME_HEADER_LEN: usize = 10;

/// Default cap on a single frame's payload
pub const MAX_FRAME_BYTES: usize = 256 * 1024;

/// One framed message as it travels on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message type id resolved through the schema registry
    pub wire_id: u16,

    /// Correlation sequence number (0 for unsolicited pushes)
    pub seq: u32,

    /// Encoded message payload
    pub payload: Vec<u8>,
}

/// Errors from reading or writing frames
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame too large: max {max} got {got}")]
    TooLarge { max: usize, got: usize },
}

/// Serialize a frame into a fresh buffer
pub fn encode_frame(frame: &Frame, max_payload: usize) -> Result<Vec<u8>, FrameError> {
    if frame.payload.len() > max_payload {
        return Err(FrameError::TooLarge {
            max: max_payload,
            got: frame.payload.len(),
        });
    }

    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + frame.payload.len());
    buf.extend_from_slice(&(frame.payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&frame.wire_id.to_le_bytes());
    buf.extend_from_slice(&frame.seq.to_le_bytes());
    buf.extend_from_slice(&frame.payload);
    Ok(buf)
}

/// Read the next frame from the stream
///
/// Returns `Ok(None)` on a clean end-of-stream at a frame boundary; EOF in
/// the middle of a frame is an error.
pub async fn read_frame<R>(reader: &mut R, max_payload: usize) -> Result<Option<Frame>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_LEN];
    let mut read = 0usize;
    while read < header.len() {
        let n = reader.read(&mut header[read..]).await?;
        if n == 0 {
            if read == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "frame header truncated").into());
        }
        read += n;
    }

    let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
    if length > max_payload {
        return Err(FrameError::TooLarge {
            max: max_payload,
            got: length,
        });
    }
    let wire_id = u16::from_le_bytes([header[4], header[5]]);
    let seq = u32::from_le_bytes([header[6], header[7], header[8], header[9]]);

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;

    Ok(Some(Frame { wire_id, seq, payload }))
}

/// Write one frame to the stream
pub async fn write_frame<W>(writer: &mut W, frame: &Frame, max_payload: usize) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let buf = encode_frame(frame, max_payload)?;
    writer.write_all(&buf).await?;
    Ok(())
}
