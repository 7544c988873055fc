//! Framed transport.
//!
//! Every message on the wire is one frame: a 4-byte big-endian unsigned
//! length followed by that many bytes of UTF-8 JSON. A frame is encoded
//! completely before any byte is written, so a failed send never leaves the
//! stream with a half frame that would desynchronize later messages.
//!
//! A connection closing cleanly before the length prefix is a normal
//! [`TransportError::EndOfStream`]; closing mid-frame or sending a frame
//! over the size cap is a hard error that terminates the connection.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest frame accepted or produced, in bytes.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Width of the length prefix.
const PREFIX_LEN: usize = 4;

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection closed cleanly between frames. Normal shutdown.
    #[error("end of stream")]
    EndOfStream,

    /// Connection closed in the middle of a frame.
    #[error("connection closed mid-frame")]
    Truncated,

    /// Frame length exceeds [`MAX_FRAME_LEN`].
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    Oversized(usize),

    /// Payload was not valid JSON.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Underlying stream error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// True for the clean-shutdown case that is not worth an error log.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, TransportError::EndOfStream)
    }
}

/// Read one raw frame payload.
pub async fn recv_frame<R>(reader: &mut R) -> Result<Vec<u8>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; PREFIX_LEN];
    let mut filled = 0;
    while filled < PREFIX_LEN {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            return Err(if filled == 0 {
                TransportError::EndOfStream
            } else {
                TransportError::Truncated
            });
        }
        filled += n;
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::Oversized(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            TransportError::Truncated
        } else {
            TransportError::Io(e)
        }
    })?;
    Ok(payload)
}

/// Read one frame and decode it as JSON.
pub async fn recv_message<R, T>(reader: &mut R) -> Result<T, TransportError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let payload = recv_frame(reader).await?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Read one frame and decode it as a JSON value, leaving shape validation
/// to the caller. Invalid JSON is still a transport error.
pub async fn recv_value<R>(reader: &mut R) -> Result<serde_json::Value, TransportError>
where
    R: AsyncRead + Unpin,
{
    recv_message(reader).await
}

/// Encode a message and write it as one frame.
pub async fn send_message<W, T>(writer: &mut W, message: &T) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(TransportError::Oversized(payload.len()));
    }

    let mut frame = Vec::with_capacity(PREFIX_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    async fn roundtrip(value: &Value) -> Value {
        let mut buf = Vec::new();
        send_message(&mut buf, value).await.unwrap();
        recv_message(&mut buf.as_slice()).await.unwrap()
    }

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let msg = json!({
            "request": "update_state",
            "ypos": 120,
            "ballx": 320,
            "sync": 99,
        });
        assert_eq!(roundtrip(&msg).await, msg);
    }

    #[tokio::test]
    async fn test_clean_eof_before_prefix() {
        let mut empty: &[u8] = &[];
        let err = recv_frame(&mut empty).await.unwrap_err();
        assert!(err.is_end_of_stream());
    }

    #[tokio::test]
    async fn test_eof_inside_prefix_is_truncation() {
        let mut partial: &[u8] = &[0, 0];
        let err = recv_frame(&mut partial).await.unwrap_err();
        assert!(matches!(err, TransportError::Truncated));
    }

    #[tokio::test]
    async fn test_eof_inside_payload_is_truncation() {
        let mut buf = Vec::new();
        send_message(&mut buf, &json!({"request": "sync"})).await.unwrap();
        buf.truncate(buf.len() - 3);

        let err = recv_frame(&mut buf.as_slice()).await.unwrap_err();
        assert!(matches!(err, TransportError::Truncated));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_on_read() {
        let len = (MAX_FRAME_LEN as u32 + 1).to_be_bytes();
        let mut stream: &[u8] = &len;
        let err = recv_frame(&mut stream).await.unwrap_err();
        assert!(matches!(err, TransportError::Oversized(_)));
    }

    #[tokio::test]
    async fn test_oversized_message_never_partially_written() {
        let big = json!({ "blob": "x".repeat(MAX_FRAME_LEN) });
        let mut buf = Vec::new();
        let err = send_message(&mut buf, &big).await.unwrap_err();
        assert!(matches!(err, TransportError::Oversized(_)));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_is_malformed() {
        let payload = b"not json";
        let mut buf = Vec::new();
        buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(payload);

        let err = recv_value(&mut buf.as_slice()).await.unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_back_to_back_frames_stay_aligned() {
        let mut buf = Vec::new();
        let first = json!({"request": "sync"});
        let second = json!({"request": "play_again"});
        send_message(&mut buf, &first).await.unwrap();
        send_message(&mut buf, &second).await.unwrap();

        let mut stream = buf.as_slice();
        assert_eq!(recv_value(&mut stream).await.unwrap(), first);
        assert_eq!(recv_value(&mut stream).await.unwrap(), second);
        assert!(recv_frame(&mut stream)
            .await
            .unwrap_err()
            .is_end_of_stream());
    }

    proptest! {
        #[test]
        fn prop_json_object_roundtrips(
            keys in proptest::collection::vec("[a-z_]{1,12}", 1..8),
            ints in proptest::collection::vec(any::<i64>(), 1..8),
        ) {
            let mut obj = serde_json::Map::new();
            for (k, v) in keys.iter().zip(ints.iter()) {
                obj.insert(k.clone(), json!(v));
            }
            let value = Value::Object(obj);

            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            let back = rt.block_on(roundtrip(&value));
            prop_assert_eq!(back, value);
        }

        #[test]
        fn prop_truncation_never_yields_a_message(cut in 1usize..40) {
            let value = json!({"request": "update_state", "ypos": 42, "sync": 7});
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();

            let mut buf = Vec::new();
            rt.block_on(send_message(&mut buf, &value)).unwrap();
            let keep = buf.len().saturating_sub(cut);
            buf.truncate(keep);

            let result: Result<Value, _> = rt.block_on(recv_message(&mut buf.as_slice()));
            prop_assert!(matches!(
                result,
                Err(TransportError::EndOfStream) | Err(TransportError::Truncated)
            ));
        }
    }
}
