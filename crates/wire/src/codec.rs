// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Newline-delimited JSON framing for the stdio transport.

use crate::message::JsonRpcMessage;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on one framed message; larger lines are a protocol error.
pub const MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Wire-level failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("message exceeds {MAX_MESSAGE_BYTES} bytes")]
    TooLarge,

    #[error("embedded newline in encoded message")]
    EmbeddedNewline,
}

/// Encode a message as a single line (no trailing newline).
pub fn encode(message: &JsonRpcMessage) -> Result<String, ProtocolError> {
    let line = serde_json::to_string(message)?;
    if line.contains('\n') {
        return Err(ProtocolError::EmbeddedNewline);
    }
    Ok(line)
}

/// Decode one line into a message.
pub fn decode(line: &str) -> Result<JsonRpcMessage, ProtocolError> {
    if line.len() > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::TooLarge);
    }
    Ok(serde_json::from_str(line)?)
}

/// Read the next message, skipping blank lines. `None` on clean EOF.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<JsonRpcMessage>, ProtocolError>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        if n > MAX_MESSAGE_BYTES {
            return Err(ProtocolError::TooLarge);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return Ok(Some(decode(trimmed)?));
    }
}

/// Write one message followed by a newline and flush.
pub async fn write_message<W>(
    writer: &mut W,
    message: &JsonRpcMessage,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = encode(message)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
