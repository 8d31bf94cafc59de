// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Face over a TCP connection to a local forwarder.
//!
//! One reader task decodes inbound frames: interests go to the installed
//! filters, data satisfies pending interests and read streams. All outbound
//! frames go through a channel to a single writer task so callers never
//! contend on the socket.

use super::connection::{FrameReader, FrameWriter, DEFAULT_MAX_MESSAGE_SIZE};
use super::table::{deliver, dispatch, FaceTable};
use super::wire::FaceMessage;
use super::{ByteReader, ByteWriter, ContentHandler, Face, FaceError, InterestHandler};
use crate::name::Name;
use crate::packet::{Data, Interest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Cursor;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

struct Shared {
    table: Mutex<FaceTable>,
    outbound: mpsc::UnboundedSender<FaceMessage>,
    closed: AtomicBool,
}

impl Shared {
    fn send(&self, msg: FaceMessage) -> Result<(), FaceError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FaceError::Closed);
        }
        self.outbound.send(msg).map_err(|_| FaceError::Closed)
    }

    fn on_data(&self, data: Data) {
        let satisfied = self.table.lock().satisfy(&data);
        deliver(satisfied);
    }

    fn on_interest(&self, interest: Interest) {
        let handlers = self.table.lock().filters_for(interest.name());
        dispatch(handlers, interest);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.table.lock().close_reads();
    }
}

/// Face connected to a forwarder.
#[derive(Clone)]
pub struct TcpFace {
    shared: Arc<Shared>,
    peer: SocketAddr,
}

impl TcpFace {
    /// Connect to the forwarder at `addr`.
    pub async fn connect(addr: SocketAddr) -> Result<Self, FaceError> {
        let stream = TcpStream::connect(addr).await?;
        info!("Connected to forwarder at {}", addr);
        Self::from_stream(stream, DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: TcpStream, max_message_size: usize) -> Result<Self, FaceError> {
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<FaceMessage>();

        let shared = Arc::new(Shared {
            table: Mutex::new(FaceTable::default()),
            outbound: outbound_tx,
            closed: AtomicBool::new(false),
        });

        let mut writer = FrameWriter::new(write_half, max_message_size);
        let writer_shared = Arc::downgrade(&shared);
        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if let Err(e) = writer.send_message(&msg).await {
                    warn!("Failed to send to forwarder {}: {}", peer, e);
                    break;
                }
            }
            if let Some(shared) = writer_shared.upgrade() {
                shared.close();
            }
            let _ = writer.shutdown().await;
            debug!("Face writer for {} stopped", peer);
        });

        let mut reader = FrameReader::new(read_half, max_message_size);
        let reader_shared = shared.clone();
        tokio::spawn(async move {
            loop {
                match reader.read_message().await {
                    Ok(Some(FaceMessage::Interest(interest))) => {
                        debug!("Inbound interest {}", interest.name());
                        reader_shared.on_interest(interest);
                    }
                    Ok(Some(FaceMessage::Data(data))) => {
                        debug!("Inbound data {}", data.name());
                        reader_shared.on_data(data);
                    }
                    Ok(Some(FaceMessage::Error { code, message })) => {
                        warn!("Forwarder error {}: {}", code, message);
                    }
                    Ok(Some(other)) => {
                        debug!("Ignoring unexpected message from forwarder: {:?}", other);
                    }
                    Ok(None) => {
                        info!("Forwarder {} closed the connection", peer);
                        break;
                    }
                    Err(e) => {
                        warn!("Read error from forwarder {}: {}", peer, e);
                        break;
                    }
                }
            }
            reader_shared.close();
        });

        Ok(Self { shared, peer })
    }

    /// Forwarder address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// True once either direction of the connection has failed.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Face for TcpFace {
    async fn put(&self, data: Data) -> Result<(), FaceError> {
        self.shared.send(FaceMessage::Data(data))
    }

    async fn express_interest(
        &self,
        interest: Interest,
        handler: Arc<dyn ContentHandler>,
    ) -> Result<(), FaceError> {
        self.shared
            .table
            .lock()
            .add_pending(interest.clone(), handler);
        self.shared.send(FaceMessage::Interest(interest))
    }

    async fn register_filter(
        &self,
        prefix: &Name,
        handler: Arc<dyn InterestHandler>,
    ) -> Result<(), FaceError> {
        self.shared.table.lock().add_filter(prefix, handler);
        self.shared.send(FaceMessage::RegisterPrefix {
            prefix: prefix.clone(),
        })
    }

    async fn unregister_filter(&self, prefix: &Name) -> Result<(), FaceError> {
        self.shared.table.lock().remove_filter(prefix);
        self.shared.send(FaceMessage::UnregisterPrefix {
            prefix: prefix.clone(),
        })
    }

    async fn open_read(&self, interest: &Interest) -> Result<ByteReader, FaceError> {
        let rx = self.shared.table.lock().add_read(interest);
        self.shared.send(FaceMessage::Interest(interest.clone()))?;
        let data = rx.await.map_err(|_| FaceError::Closed)?;
        Ok(Box::new(Cursor::new(data.into_payload())))
    }

    async fn open_write(&self, name: &Name) -> Result<ByteWriter, FaceError> {
        if self.is_closed() {
            return Err(FaceError::Closed);
        }
        Ok(Box::new(TcpWriter {
            shared: self.shared.clone(),
            name: name.clone(),
            buffer: Vec::new(),
            finished: false,
        }))
    }
}

/// Buffers written bytes and sends them as one data frame on shutdown.
struct TcpWriter {
    shared: Arc<Shared>,
    name: Name,
    buffer: Vec<u8>,
    finished: bool,
}

impl AsyncWrite for TcpWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        if self.finished {
            return Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()));
        }
        self.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        if self.finished {
            return Poll::Ready(Ok(()));
        }
        self.finished = true;
        let payload = std::mem::take(&mut self.buffer);
        let data = Data::new(self.name.clone(), payload);
        let result = self
            .shared
            .send(FaceMessage::Data(data))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::BrokenPipe, e.to_string()));
        Poll::Ready(result)
    }
}
