// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Face abstraction.
//!
//! A face is the protocol layer's only window onto the network: it
//! publishes data, expresses interests, installs interest filters and opens
//! byte streams over named content. Name matching, segmentation and signing
//! all happen behind this trait.
//!
//! # Implementations
//!
//! - [`TcpFace`] -- talks to a local forwarder over length-prefixed JSON
//! - [`MemoryFace`] -- in-process content store, used by tests and embedders

use crate::name::Name;
use crate::packet::{Data, Interest};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub mod connection;
pub mod memory;
mod table;
pub mod tcp;
pub mod wire;

pub use memory::MemoryFace;
pub use tcp::TcpFace;
pub use wire::FaceMessage;

/// Readable content stream.
pub type ByteReader = Box<dyn AsyncRead + Send + Unpin>;

/// Writable content stream; shutting it down finalizes the content.
pub type ByteWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Face errors.
#[derive(Debug, Error)]
pub enum FaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Face closed")]
    Closed,
}

/// Receives interests delivered to an installed filter.
#[async_trait]
pub trait InterestHandler: Send + Sync {
    /// Returns `true` when the interest was answered or taken over.
    ///
    /// A `false` lets the face offer the interest to the next, shorter
    /// matching filter.
    async fn handle_interest(&self, interest: Interest) -> bool;
}

/// Receives the data satisfying an expressed interest.
pub trait ContentHandler: Send + Sync {
    fn handle_content(&self, data: Data, interest: &Interest);
}

impl<F> ContentHandler for F
where
    F: Fn(Data, &Interest) + Send + Sync,
{
    fn handle_content(&self, data: Data, interest: &Interest) {
        self(data, interest)
    }
}

/// Transport and stream I/O consumed by the protocol layer.
#[async_trait]
pub trait Face: Send + Sync {
    /// Publish a content object.
    async fn put(&self, data: Data) -> Result<(), FaceError>;

    /// Express an interest; `handler` is called once with the first match.
    async fn express_interest(
        &self,
        interest: Interest,
        handler: Arc<dyn ContentHandler>,
    ) -> Result<(), FaceError>;

    /// Deliver interests under `prefix` to `handler`.
    async fn register_filter(
        &self,
        prefix: &Name,
        handler: Arc<dyn InterestHandler>,
    ) -> Result<(), FaceError>;

    /// Stop delivering interests under `prefix`.
    async fn unregister_filter(&self, prefix: &Name) -> Result<(), FaceError>;

    /// Open the content answering `interest` for reading.
    ///
    /// Waits until the content is available; callers bound the wait.
    async fn open_read(&self, interest: &Interest) -> Result<ByteReader, FaceError>;

    /// Open a stream that publishes its bytes under `name` once shut down.
    async fn open_write(&self, name: &Name) -> Result<ByteWriter, FaceError>;
}

/// Copy `reader` into `writer` in chunks of at most `chunk_size` bytes,
/// flushing after each chunk. Returns the number of bytes copied.
///
/// The writer is not shut down.
pub async fn copy_chunked<R, W>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut total = 0u64;
    copy_chunked_counting(reader, writer, chunk_size, &mut total).await?;
    Ok(total)
}

/// Same as [`copy_chunked`], but `total` holds the bytes handed to the
/// writer so far even when the copy fails part way.
pub async fn copy_chunked_counting<R, W>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    total: &mut u64,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..read]).await?;
        *total += read as u64;
        writer.flush().await?;
    }
}
