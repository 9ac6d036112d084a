// src/hal/frame.rs
//! Frame accumulation and little-endian float decoding for the data ports
//!
//! The TCU streams `total_channels` little-endian `f32` values per sample with
//! no header or delimiter. TCP delivers arbitrary chunks, so [`FrameReader`]
//! keeps reading until the exact frame length is available, and [`decode`]
//! turns that buffer into a (channel × sample) matrix.

use crate::config::constants::protocol::{BYTES_PER_CHANNEL, MAX_FRAME_BYTES};
use crate::error::{TrignoError, TrignoResult};
use crate::hal::types::SampleMatrix;
use ndarray::Array2;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;
use tracing::{error, trace};

/// Byte length of a frame of `samples` samples over `total_channels` channels
///
/// Fails with [`TrignoError::Configuration`] when the length overflows or
/// exceeds [`MAX_FRAME_BYTES`].
pub fn frame_len(samples: usize, total_channels: usize) -> TrignoResult<usize> {
    samples
        .checked_mul(total_channels)
        .and_then(|values| values.checked_mul(BYTES_PER_CHANNEL))
        .filter(|&len| len <= MAX_FRAME_BYTES)
        .ok_or_else(|| {
            TrignoError::Configuration(format!(
                "frame of {} samples over {} channels exceeds {} bytes",
                samples, total_channels, MAX_FRAME_BYTES
            ))
        })
}

/// Accumulates data-socket bytes into complete frames
#[derive(Debug)]
pub struct FrameReader<R> {
    stream: R,
    recv_timeout: Duration,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(stream: R, recv_timeout: Duration) -> Self {
        Self {
            stream,
            recv_timeout,
        }
    }

    /// Read exactly one frame
    ///
    /// Each receive call is bounded by the receive timeout. A timeout, EOF, or
    /// reset before the frame is complete discards the partial buffer and
    /// returns [`TrignoError::DeviceDisconnected`].
    pub async fn read_frame(&mut self, samples: usize, total_channels: usize) -> TrignoResult<Vec<u8>> {
        let expected = frame_len(samples, total_channels)?;
        let mut packet = vec![0u8; expected];
        let mut received = 0;

        while received < expected {
            match timeout(self.recv_timeout, self.stream.read(&mut packet[received..])).await {
                Ok(Ok(0)) => {
                    error!("Data socket closed after {} of {} bytes", received, expected);
                    return Err(TrignoError::DeviceDisconnected { received, expected });
                }
                Ok(Ok(n)) => {
                    received += n;
                    trace!("Frame progress {}/{}", received, expected);
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) if is_disconnect(&e) => {
                    error!("Data socket failed after {} of {} bytes: {}", received, expected, e);
                    return Err(TrignoError::DeviceDisconnected { received, expected });
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    error!(
                        "Data socket stalled for {:?} after {} of {} bytes",
                        self.recv_timeout, received, expected
                    );
                    return Err(TrignoError::DeviceDisconnected { received, expected });
                }
            }
        }

        Ok(packet)
    }

    pub fn recv_timeout(&self) -> Duration {
        self.recv_timeout
    }

    pub fn into_inner(self) -> R {
        self.stream
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::TimedOut
    )
}

/// Decode a frame into a (total_channels, samples) matrix
///
/// Values are read at `f32` precision and widened to `f64`; nothing is
/// rounded or clamped.
pub fn decode(buffer: &[u8], total_channels: usize, samples: usize) -> TrignoResult<SampleMatrix> {
    let expected = frame_len(samples, total_channels)?;
    if buffer.len() != expected {
        return Err(TrignoError::InvalidFrame {
            expected,
            actual: buffer.len(),
        });
    }

    let values: Vec<f64> = buffer
        .chunks_exact(BYTES_PER_CHANNEL)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
        .collect();

    // Wire order is one channel tuple per sample
    let by_sample = Array2::from_shape_vec((samples, total_channels), values).map_err(|_| {
        TrignoError::InvalidFrame {
            expected,
            actual: buffer.len(),
        }
    })?;

    Ok(by_sample.reversed_axes().as_standard_layout().into_owned())
}

/// Encode a (channel × sample) matrix in wire order
pub fn encode_frame(matrix: &SampleMatrix) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(matrix.len() * BYTES_PER_CHANNEL);
    for value in matrix.t().iter() {
        bytes.extend_from_slice(&(*value as f32).to_le_bytes());
    }
    bytes
}
