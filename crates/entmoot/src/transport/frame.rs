//! Line-delimited JSON framing

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ExecutorError, Result};

/// Longest frame either side accepts, newline excluded
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// A request or response tagged with its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Correlation id chosen by the client
    pub id: u64,
    /// The message
    pub body: T,
}

/// Envelope whose body has not been decoded yet.
#[derive(Debug, Deserialize)]
pub(crate) struct RawEnvelope {
    pub id: u64,
    pub body: serde_json::Value,
}

pub(crate) fn encode<T: Serialize>(frame: &T) -> Result<String> {
    serde_json::to_string(frame)
        .map_err(|e| ExecutorError::Transport(format!("failed to encode frame: {}", e)))
}

pub(crate) fn decode<T: DeserializeOwned>(line: &str) -> Result<T> {
    serde_json::from_str(line)
        .map_err(|e| ExecutorError::invalid_argument(format!("malformed frame: {}", e)))
}

/// One line read off the wire.
#[derive(Debug, PartialEq)]
pub(crate) enum Frame {
    Line(String),
    /// The line exceeded the limit and was skipped up to its newline
    Oversized,
}

/// Read the next frame, buffering at most `max_len` bytes of it.
///
/// Returns `None` at end of stream.
pub(crate) async fn read_frame<R>(reader: &mut R, max_len: usize) -> std::io::Result<Option<Frame>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = u64::try_from(max_len).unwrap_or(u64::MAX).saturating_add(1);
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > max_len {
        skip_line(reader).await?;
        return Ok(Some(Frame::Oversized));
    }
    Ok(Some(Frame::Line(String::from_utf8_lossy(&buf).into_owned())))
}

/// Discard input through the next newline without buffering it.
async fn skip_line<R>(reader: &mut R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

pub(crate) async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
