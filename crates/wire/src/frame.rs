// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed framing with optional HMAC authentication.

use crate::envelope::{WireEnvelope, PROTOCOL_VERSION};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 output size.
pub const MAC_LEN: usize = 32;

/// Upper bound on a single frame; anything larger closes the
/// connection instead of allocating unbounded memory.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("failed to serialize message: {message}")]
    Serialization { message: String },

    #[error("failed to deserialize message: {message}")]
    Deserialization { message: String },

    #[error("unsupported protocol version {v}")]
    UnsupportedVersion { v: u32 },

    #[error("frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge { len: usize },

    #[error("frame shorter than its MAC")]
    FrameTooShort,

    #[error("frame MAC mismatch")]
    MacMismatch,

    #[error("connection error: {message}")]
    Io { message: String },
}

impl WireError {
    fn io(err: std::io::Error) -> Self {
        Self::Io { message: err.to_string() }
    }
}

/// Serialize an envelope to its JSON payload (no length prefix).
pub fn encode(envelope: &WireEnvelope) -> Result<Vec<u8>, WireError> {
    serde_json::to_vec(envelope).map_err(|e| WireError::Serialization { message: e.to_string() })
}

/// Parse and version-check a JSON payload.
pub fn decode(payload: &[u8]) -> Result<WireEnvelope, WireError> {
    let envelope: WireEnvelope = serde_json::from_slice(payload)
        .map_err(|e| WireError::Deserialization { message: e.to_string() })?;
    if envelope.v != PROTOCOL_VERSION {
        return Err(WireError::UnsupportedVersion { v: envelope.v });
    }
    Ok(envelope)
}

fn compute_mac(secret: &str, payload: &[u8]) -> [u8; MAC_LEN] {
    // new_from_slice only fails on invalid key lengths; HMAC accepts any.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts any key length"),
    };
    mac.update(payload);
    mac.finalize().into_bytes().into()
}

/// Write one frame: `len:u32be || mac (if secret) || payload`.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
    secret: Option<&str>,
) -> Result<(), WireError> {
    let mac = secret.map(|s| compute_mac(s, payload));
    let total = payload.len() + mac.map_or(0, |m| m.len());
    if total > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge { len: total });
    }
    writer
        .write_all(&(total as u32).to_be_bytes())
        .await
        .map_err(WireError::io)?;
    if let Some(mac) = &mac {
        writer.write_all(mac).await.map_err(WireError::io)?;
    }
    writer.write_all(payload).await.map_err(WireError::io)?;
    writer.flush().await.map_err(WireError::io)
}

/// Read one frame, validating the MAC before handing the payload out.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    secret: Option<&str>,
) -> Result<Vec<u8>, WireError> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await.map_err(WireError::io)?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge { len });
    }
    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame).await.map_err(WireError::io)?;

    match secret {
        None => Ok(frame),
        Some(secret) => {
            if frame.len() < MAC_LEN {
                return Err(WireError::FrameTooShort);
            }
            let (mac, payload) = frame.split_at(MAC_LEN);
            let mut verifier = match HmacSha256::new_from_slice(secret.as_bytes()) {
                Ok(mac) => mac,
                Err(_) => unreachable!("HMAC accepts any key length"),
            };
            verifier.update(payload);
            verifier.verify_slice(mac).map_err(|_| WireError::MacMismatch)?;
            Ok(payload.to_vec())
        }
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
