//! Length-prefixed frame encoding and decoding
//!
//! A frame is a 4-byte unsigned big-endian payload length followed by the
//! payload itself. Senders compute the exact byte length before writing;
//! receivers read exactly four length bytes, then exactly that many payload
//! bytes, looping on partial reads. A connection that closes before a full
//! frame has arrived is a [`ProtocolError::ConnectionBroken`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single frame payload. The original protocol carried no
/// bound; this guards the receiver against corrupt or hostile length
/// prefixes.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Errors raised by the framing layer
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Connection closed before a complete frame arrived
    #[error("connection broken before a complete frame arrived")]
    ConnectionBroken,

    /// Declared payload length exceeds [`MAX_FRAME_LEN`]
    #[error("frame of {0} bytes exceeds the maximum of {MAX_FRAME_LEN}")]
    FrameTooLarge(usize),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Message could not be serialized to a frame payload
    #[error("message encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Frame payload could not be deserialized
    #[error("message decoding failed: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Read one frame payload from the stream
///
/// Returns `Ok(None)` on a clean close at a frame boundary (no length bytes
/// read). EOF after a partial length prefix or mid-payload is
/// [`ProtocolError::ConnectionBroken`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    // Read the 4-byte length prefix byte by byte so a close at the frame
    // boundary can be told apart from a close mid-prefix.
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtocolError::ConnectionBroken);
        }
        filled += n;
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::ConnectionBroken
        } else {
            ProtocolError::Io(e)
        }
    })?;

    Ok(Some(payload))
}

/// Write one frame: length prefix followed by the payload
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }

    let prefix = (payload.len() as u32).to_be_bytes();
    writer.write_all(&prefix).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and decode its JSON payload
///
/// Returns `Ok(None)` on a clean close at a frame boundary.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(payload) => {
            let message = serde_json::from_slice(&payload).map_err(ProtocolError::Decode)?;
            Ok(Some(message))
        }
        None => Ok(None),
    }
}

/// Encode a message as JSON and write it as one frame
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message).map_err(ProtocolError::Encode)?;
    write_frame(writer, &payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        write_frame(&mut client, b"hello").await.unwrap();
        let payload = read_frame(&mut server).await.unwrap().unwrap();
        assert_eq!(payload, b"hello");
    }

    #[tokio::test]
    async fn test_message_round_trip() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let original = json!({
            "action": "submit_result",
            "task_id": "abc",
            "result": {"title": "Example", "links": 12, "nested": [1, null, "x"]},
        });

        write_message(&mut client, &original).await.unwrap();
        let decoded: Value = read_message(&mut server).await.unwrap().unwrap();
        assert_eq!(decoded, original);
    }

    #[tokio::test]
    async fn test_clean_close_returns_none() {
        let (client, mut server) = tokio::io::duplex(1024);
        drop(client);

        let result = read_frame(&mut server).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_eof_mid_prefix_is_broken() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        // Two of the four length bytes, then close.
        tokio::io::AsyncWriteExt::write_all(&mut client, &[0u8, 0])
            .await
            .unwrap();
        drop(client);

        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionBroken));
    }

    #[tokio::test]
    async fn test_eof_mid_payload_is_broken() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        // Declare 10 payload bytes, deliver 3, then close.
        tokio::io::AsyncWriteExt::write_all(&mut client, &10u32.to_be_bytes())
            .await
            .unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut client, b"abc")
            .await
            .unwrap();
        drop(client);

        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionBroken));
    }

    #[tokio::test]
    async fn test_oversized_prefix_rejected() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        let huge = (MAX_FRAME_LEN as u32) + 1;
        tokio::io::AsyncWriteExt::write_all(&mut client, &huge.to_be_bytes())
            .await
            .unwrap();

        let err = read_frame(&mut server).await.unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge(_)));
    }

    #[tokio::test]
    async fn test_multiple_frames_in_sequence() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        write_frame(&mut client, b"first").await.unwrap();
        write_frame(&mut client, b"second").await.unwrap();
        write_frame(&mut client, b"").await.unwrap();

        assert_eq!(read_frame(&mut server).await.unwrap().unwrap(), b"first");
        assert_eq!(read_frame(&mut server).await.unwrap().unwrap(), b"second");
        assert_eq!(read_frame(&mut server).await.unwrap().unwrap(), b"");
    }
}
