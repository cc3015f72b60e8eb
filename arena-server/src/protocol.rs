//! Wire codec
//!
//! Every message is one frame: a 4-byte little-endian payload length followed
//! by the bincode encoding of a `ClientPacket` or `ServerPacket`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted payload; bigger frames close the connection
pub const MAX_FRAME_LEN: usize = 64 * 1024;

const HEADER_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("malformed payload: {0}")]
    Codec(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the connection can keep going after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProtocolError::Codec(_))
    }
}

/// Encode `message` as a complete frame, header included
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    let payload = bincode::serialize(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode one frame payload (header already stripped)
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
    Ok(bincode::deserialize(payload)?)
}

/// Read the next frame payload.
///
/// Returns `Ok(None)` on a clean end of stream between frames. A stream
/// that ends mid-frame is an I/O error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        filled += n;
    }

    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

/// Write an already encoded frame
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::snapshot::{ClientPacket, ServerPacket};
    use arena_core::ClientId;

    #[test]
    fn test_header_is_little_endian_length() {
        let frame = encode(&ClientPacket::Respawn).unwrap();
        let len = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - HEADER_LEN);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode::<ServerPacket>(&[0xff, 0xff, 0xff, 0xff, 0x01]).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_decode_payload() {
        let frame = encode(&ServerPacket::Welcome {
            client: ClientId(3),
            world_width: 100.0,
            world_height: 50.0,
        })
        .unwrap();
        let packet: ServerPacket = decode(&frame[HEADER_LEN..]).unwrap();
        assert!(matches!(packet, ServerPacket::Welcome { client: ClientId(3), .. }));
    }

    #[test]
    fn test_oversized_message_not_encoded() {
        let text = "x".repeat(MAX_FRAME_LEN + 1);
        let err = encode(&ClientPacket::Chat { text }).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { .. }));
        assert!(!err.is_recoverable());
    }
}
