// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Length-prefixed framing over a byte stream.

use super::wire::FaceMessage;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default cap on a single frame.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Reading half of a framed connection.
pub struct FrameReader<R> {
    inner: R,
    max_message_size: usize,
    read_buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, max_message_size: usize) -> Self {
        Self {
            inner,
            max_message_size,
            read_buffer: Vec::with_capacity(4096),
        }
    }

    /// Read one message.
    ///
    /// Returns `Ok(None)` if the peer closed the connection gracefully.
    pub async fn read_message(&mut self) -> Result<Option<FaceMessage>, ConnectionError> {
        // Read length prefix (4 bytes, big-endian)
        let mut len_buf = [0u8; 4];
        match self.inner.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(e) => return Err(ConnectionError::Io(e.to_string())),
        }

        let len = u32::from_be_bytes(len_buf) as usize;

        if len == 0 {
            return Err(ConnectionError::Protocol("Empty message".into()));
        }
        if len > self.max_message_size {
            return Err(ConnectionError::Protocol(format!(
                "Message too large: {} > {}",
                len, self.max_message_size
            )));
        }

        self.read_buffer.clear();
        self.read_buffer.resize(len, 0);

        self.inner
            .read_exact(&mut self.read_buffer)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        let msg: FaceMessage = serde_json::from_slice(&self.read_buffer)
            .map_err(|e| ConnectionError::Protocol(format!("Invalid JSON: {}", e)))?;

        Ok(Some(msg))
    }
}

/// Writing half of a framed connection.
pub struct FrameWriter<W> {
    inner: W,
    max_message_size: usize,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W, max_message_size: usize) -> Self {
        Self {
            inner,
            max_message_size,
        }
    }

    /// Send one message and flush.
    pub async fn send_message(&mut self, msg: &FaceMessage) -> Result<(), ConnectionError> {
        let json = serde_json::to_vec(msg)
            .map_err(|e| ConnectionError::Protocol(format!("Serialize error: {}", e)))?;

        if json.len() > self.max_message_size {
            return Err(ConnectionError::Protocol(format!(
                "Message too large: {} > {}",
                json.len(),
                self.max_message_size
            )));
        }

        let len = json.len() as u32;
        self.inner
            .write_all(&len.to_be_bytes())
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        self.inner
            .write_all(&json)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        self.inner
            .flush()
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        Ok(())
    }

    /// Shut the write side down.
    pub async fn shutdown(&mut self) -> Result<(), ConnectionError> {
        self.inner
            .shutdown()
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))
    }
}

/// Connection error types.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<ConnectionError> for super::FaceError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::Io(s) => Self::Io(std::io::Error::other(s)),
            ConnectionError::Protocol(s) => Self::Protocol(s),
        }
    }
}
