//! Frame codec for streamed responses
//!
//! Each frame is `[u32 BE length][u32 BE crc32][payload]` where the payload
//! is one JSON-encoded response and the checksum covers the payload only.

use crc32fast::Hasher;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub const FRAME_HEADER_LEN: usize = 8;

/// Largest accepted payload; base64 inflates a full page by a third
pub const MAX_FRAME_PAYLOAD: usize = 128 * 1024 * 1024;

pub type FrameResult<T> = Result<T, FrameError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Truncated frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("Frame payload of {0} bytes exceeds the limit")]
    TooLarge(usize),

    #[error("Frame checksum mismatch: header {expected:#010x}, payload {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Invalid frame payload: {0}")]
    Payload(String),
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Serializes `message` into one frame
pub fn encode_frame<T: Serialize>(message: &T) -> FrameResult<Vec<u8>> {
    let payload = serde_json::to_vec(message).map_err(|e| FrameError::Payload(e.to_string()))?;
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(FrameError::TooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&checksum(&payload).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes the frame at the start of `bytes`; returns it with its length
pub fn decode_frame<T: DeserializeOwned>(bytes: &[u8]) -> FrameResult<(T, usize)> {
    if bytes.len() < FRAME_HEADER_LEN {
        return Err(FrameError::Truncated {
            needed: FRAME_HEADER_LEN,
            available: bytes.len(),
        });
    }

    let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let expected = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if len > MAX_FRAME_PAYLOAD {
        return Err(FrameError::TooLarge(len));
    }

    let end = FRAME_HEADER_LEN + len;
    if bytes.len() < end {
        return Err(FrameError::Truncated {
            needed: end,
            available: bytes.len(),
        });
    }

    let payload = &bytes[FRAME_HEADER_LEN..end];
    let actual = checksum(payload);
    if actual != expected {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    let message = serde_json::from_slice(payload).map_err(|e| FrameError::Payload(e.to_string()))?;
    Ok((message, end))
}

/// Decodes a whole body of back-to-back frames
pub fn decode_frames<T: DeserializeOwned>(mut bytes: &[u8]) -> FrameResult<Vec<T>> {
    let mut messages = Vec::new();
    while !bytes.is_empty() {
        let (message, used) = decode_frame(bytes)?;
        messages.push(message);
        bytes = &bytes[used..];
    }
    Ok(messages)
}
