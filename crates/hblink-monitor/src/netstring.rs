// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Netstring framing: `<length>:<payload>,`. Used for every message
//! exchanged with the monitor sink, in either direction.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Messages larger than this are rejected rather than buffered.
const MAX_FRAME_LEN: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum NetstringError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed length prefix")]
    BadLength,
    #[error("frame length {0} exceeds the {MAX_FRAME_LEN} byte limit")]
    TooLarge(usize),
    #[error("missing trailing comma")]
    MissingTerminator,
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<(), NetstringError> {
    writer.write_all(payload.len().to_string().as_bytes()).await?;
    writer.write_all(b":").await?;
    writer.write_all(payload).await?;
    writer.write_all(b",").await?;
    writer.flush().await?;
    Ok(())
}

/// Read one netstring frame. Returns `Ok(None)` on a clean EOF before any
/// bytes of a new frame arrive.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>, NetstringError> {
    let mut digits = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        match reader.read_exact(&mut byte).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof && digits.is_empty() => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }
        if byte[0] == b':' {
            break;
        }
        if !byte[0].is_ascii_digit() || digits.len() > 9 {
            return Err(NetstringError::BadLength);
        }
        digits.push(byte[0]);
    }

    let len: usize = std::str::from_utf8(&digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(NetstringError::BadLength)?;
    if len > MAX_FRAME_LEN {
        return Err(NetstringError::TooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    let mut terminator = [0u8; 1];
    reader.read_exact(&mut terminator).await?;
    if terminator[0] != b',' {
        return Err(NetstringError::MissingTerminator);
    }

    Ok(Some(payload))
}
