//! Line and length-prefixed framing over async streams.

use crate::error::{ServerError, ServerResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads one `\n`-terminated UTF-8 line, without the terminator.
///
/// A trailing `\r` is stripped. Returns `Ok(None)` on a clean end of stream.
/// Exceeding `max_len`, invalid UTF-8 and end of stream mid-line are
/// framing errors.
pub async fn read_line<R>(reader: &mut R, max_len: usize) -> ServerResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(ServerError::Frame("stream ended mid-line".into()));
        }

        match available.iter().position(|&b| b == b'\n') {
            Some(i) => {
                buf.extend_from_slice(&available[..i]);
                reader.consume(i + 1);
                break;
            }
            None => {
                let n = available.len();
                buf.extend_from_slice(available);
                reader.consume(n);
            }
        }

        // `+ 1` leaves room for a `\r` that is stripped once the line ends.
        if buf.len() > max_len + 1 {
            return Err(ServerError::Frame(format!("line exceeds {max_len} bytes")));
        }
    }

    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    if buf.len() > max_len {
        return Err(ServerError::Frame(format!("line exceeds {max_len} bytes")));
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| ServerError::Frame("line is not valid UTF-8".into()))
}

/// Writes `line` followed by `\n` and flushes.
pub async fn write_line<W>(writer: &mut W, line: &str) -> ServerResult<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame: a 4-byte big-endian length, then that many bytes.
///
/// Returns `Ok(None)` if the stream ends before a header starts.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> ServerResult<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ServerError::Frame("stream ended inside frame header".into()));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_len {
        return Err(ServerError::Frame(format!(
            "frame of {len} bytes exceeds {max_len}"
        )));
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| ServerError::Frame(format!("truncated frame: {e}")))?;
    Ok(Some(payload))
}

/// Writes one length-prefixed frame and flushes.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> ServerResult<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len())
        .map_err(|_| ServerError::Frame(format!("frame of {} bytes is too large", payload.len())))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
