//! Newline-delimited JSON framing over a byte stream.

use crate::protocol::Packet;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound for a single frame, newline excluded.
pub const MAX_FRAME_LEN: usize = 256 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame exceeds {} bytes", MAX_FRAME_LEN)]
    TooLong,
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Serializes `packet` into one frame, trailing newline included.
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec(packet)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Splits an incoming byte stream into packets.
///
/// A frame that fails to parse is consumed and reported, so one bad line
/// never poisons the ones after it.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Set while skipping the remainder of an oversized frame.
    discarding: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the next complete frame, or None if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Result<Packet, FrameError>> {
        loop {
            let newline = self.buffer.iter().position(|b| *b == b'\n');

            let Some(end) = newline else {
                if self.buffer.len() > MAX_FRAME_LEN {
                    self.buffer.clear();
                    if !self.discarding {
                        self.discarding = true;
                        return Some(Err(FrameError::TooLong));
                    }
                }
                return None;
            };

            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            if self.discarding {
                // Tail of a frame already reported as too long.
                self.discarding = false;
                continue;
            }

            let body = trim_line(&line[..line.len() - 1]);
            if body.is_empty() {
                continue;
            }
            if body.len() > MAX_FRAME_LEN {
                return Some(Err(FrameError::TooLong));
            }
            return Some(serde_json::from_slice(body).map_err(FrameError::from));
        }
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

/// Reads packets from an async byte stream.
pub struct FramedReader<R> {
    inner: R,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FramedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(),
            chunk: vec![0u8; 8192],
        }
    }

    /// Waits for the next frame.
    ///
    /// `Ok(None)` means the peer closed the stream. Malformed frames come
    /// back as `Ok(Some(Err(_)))` so the caller can decide how many to
    /// tolerate; only I/O failures are `Err`.
    pub async fn next_packet(&mut self) -> std::io::Result<Option<Result<Packet, FrameError>>> {
        loop {
            if let Some(frame) = self.decoder.next_frame() {
                return Ok(Some(frame));
            }
            let read = self.inner.read(&mut self.chunk).await?;
            if read == 0 {
                return Ok(None);
            }
            self.decoder.extend(&self.chunk[..read]);
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Encodes and writes one packet, flushing afterwards.
pub async fn write_packet<W: AsyncWrite + Unpin>(
    writer: &mut W,
    packet: &Packet,
) -> std::io::Result<()> {
    let frame = encode_frame(packet).map_err(std::io::Error::from)?;
    writer.write_all(&frame).await?;
    writer.flush().await
}

/// Tracks consecutive malformed frames from one peer.
#[derive(Debug, Clone)]
pub struct MalformedBudget {
    limit: u32,
    consecutive: u32,
}

impl MalformedBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            consecutive: 0,
        }
    }

    /// Records a bad frame; returns true once the limit is reached.
    pub fn strike(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive >= self.limit
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}
