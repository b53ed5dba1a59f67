//! Line framing shared by the async server and the blocking client
//!
//! Lines end at `\n`. Every `\r` is dropped and the bytes are decoded as
//! lossy UTF-8. Reads are bounded so a peer that never sends a newline cannot
//! grow the buffer without limit.

use std::io::{self, BufRead, Read};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Outcome of reading one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// A complete `\n`-terminated line, terminator removed
    Line(String),
    /// Bytes that reached EOF before a `\n`
    Partial(String),
    /// The stream ended cleanly between lines
    Eof,
    /// The line was longer than the limit and has been skipped
    TooLong,
}

/// Strip the terminator and all carriage returns
pub fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let cleaned: Vec<u8> = bytes.iter().copied().filter(|&b| b != b'\r').collect();
    String::from_utf8_lossy(&cleaned).into_owned()
}

fn classify(buf: &[u8], limit: usize) -> Option<LineRead> {
    if buf.is_empty() {
        return Some(LineRead::Eof);
    }
    let complete = buf.last() == Some(&b'\n');
    // The window holds `limit` bytes plus an optional `\r\n`
    if !complete && buf.len() > limit.saturating_add(1) {
        return None;
    }
    let body = buf.strip_suffix(b"\n").unwrap_or(buf);
    let body = body.strip_suffix(b"\r").unwrap_or(body);
    if body.len() > limit {
        Some(LineRead::TooLong)
    } else if complete {
        Some(LineRead::Line(decode_line(buf)))
    } else {
        Some(LineRead::Partial(decode_line(buf)))
    }
}

/// Read one line of at most `limit` bytes (`\n` or `\r\n` excluded)
pub fn read_line<R: BufRead>(reader: &mut R, limit: usize) -> io::Result<LineRead> {
    let mut buf = Vec::new();
    reader
        .by_ref()
        .take(limit.saturating_add(2) as u64)
        .read_until(b'\n', &mut buf)?;

    match classify(&buf, limit) {
        Some(read) => Ok(read),
        None => {
            skip_line(reader)?;
            Ok(LineRead::TooLong)
        }
    }
}

fn skip_line<R: BufRead>(reader: &mut R) -> io::Result<()> {
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(());
        }
        if let Some(i) = available.iter().position(|&b| b == b'\n') {
            reader.consume(i + 1);
            return Ok(());
        }
        let len = available.len();
        reader.consume(len);
    }
}

/// Async counterpart of [`read_line`]
pub async fn read_line_async<R>(reader: &mut R, limit: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    (&mut *reader)
        .take(limit.saturating_add(2) as u64)
        .read_until(b'\n', &mut buf)
        .await?;

    match classify(&buf, limit) {
        Some(read) => Ok(read),
        None => {
            skip_line_async(reader).await?;
            Ok(LineRead::TooLong)
        }
    }
}

async fn skip_line_async<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        if let Some(i) = available.iter().position(|&b| b == b'\n') {
            reader.consume(i + 1);
            return Ok(());
        }
        let len = available.len();
        reader.consume(len);
    }
}
