// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process face.
//!
//! Keeps a content store, a pending-interest table and the installed
//! filters behind one lock. Several agents sharing a `MemoryFace` see each
//! other's content exactly as peers on one forwarder would, which is what the
//! integration tests rely on. Every interest expressed (including the ones
//! implied by [`Face::open_read`]) is recorded for inspection.

use super::table::{deliver, dispatch, FaceTable};
use super::{ByteReader, ByteWriter, ContentHandler, Face, FaceError, InterestHandler};
use crate::name::Name;
use crate::packet::{Data, Interest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

#[derive(Default)]
struct MemoryState {
    table: FaceTable,
    store: Vec<Data>,
    expressed: Vec<Interest>,
}

impl MemoryState {
    fn lookup(&self, interest: &Interest) -> Option<Data> {
        self.store
            .iter()
            .rev()
            .find(|d| interest.matches(d))
            .cloned()
    }
}

/// Shared in-memory face.
#[derive(Clone, Default)]
pub struct MemoryFace {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFace {
    /// Create an empty face.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` and satisfy whatever was waiting for it.
    pub fn publish(&self, data: Data) {
        let satisfied = {
            let mut state = self.state.lock();
            let satisfied = state.table.satisfy(&data);
            state.store.push(data);
            satisfied
        };
        deliver(satisfied);
    }

    /// Deliver `interest` to the installed filters as if it came from a peer.
    ///
    /// Returns `false` if no filter covers its name.
    pub fn inject_interest(&self, interest: Interest) -> bool {
        let handlers = self.state.lock().table.filters_for(interest.name());
        let found = !handlers.is_empty();
        dispatch(handlers, interest);
        found
    }

    /// Every interest expressed so far, in order.
    pub fn expressed(&self) -> Vec<Interest> {
        self.state.lock().expressed.clone()
    }

    /// Every content object published so far, in order.
    pub fn published(&self) -> Vec<Data> {
        self.state.lock().store.clone()
    }

    /// Most recent content under `prefix`.
    pub fn content(&self, prefix: &Name) -> Option<Data> {
        self.state.lock().lookup(&Interest::new(prefix.clone()))
    }

    /// True if a filter is installed for exactly `prefix`.
    pub fn has_filter(&self, prefix: &Name) -> bool {
        self.state.lock().table.has_filter(prefix)
    }
}

#[async_trait]
impl Face for MemoryFace {
    async fn put(&self, data: Data) -> Result<(), FaceError> {
        self.publish(data);
        Ok(())
    }

    async fn express_interest(
        &self,
        interest: Interest,
        handler: Arc<dyn ContentHandler>,
    ) -> Result<(), FaceError> {
        let handlers = {
            let mut state = self.state.lock();
            state.expressed.push(interest.clone());
            if let Some(data) = state.lookup(&interest) {
                drop(state);
                handler.handle_content(data, &interest);
                return Ok(());
            }
            state.table.add_pending(interest.clone(), handler);
            state.table.filters_for(interest.name())
        };
        dispatch(handlers, interest);
        Ok(())
    }

    async fn register_filter(
        &self,
        prefix: &Name,
        handler: Arc<dyn InterestHandler>,
    ) -> Result<(), FaceError> {
        self.state.lock().table.add_filter(prefix, handler);
        Ok(())
    }

    async fn unregister_filter(&self, prefix: &Name) -> Result<(), FaceError> {
        self.state.lock().table.remove_filter(prefix);
        Ok(())
    }

    async fn open_read(&self, interest: &Interest) -> Result<ByteReader, FaceError> {
        let (rx, handlers) = {
            let mut state = self.state.lock();
            state.expressed.push(interest.clone());
            if let Some(data) = state.lookup(interest) {
                return Ok(Box::new(Cursor::new(data.into_payload())));
            }
            let rx = state.table.add_read(interest);
            (rx, state.table.filters_for(interest.name()))
        };
        dispatch(handlers, interest.clone());

        let data = rx.await.map_err(|_| FaceError::Closed)?;
        Ok(Box::new(Cursor::new(data.into_payload())))
    }

    async fn open_write(&self, name: &Name) -> Result<ByteWriter, FaceError> {
        Ok(Box::new(MemoryWriter {
            face: self.clone(),
            name: name.clone(),
            buffer: Vec::new(),
            finished: false,
        }))
    }
}

/// Buffers written bytes and publishes them as one object on shutdown.
struct MemoryWriter {
    face: MemoryFace,
    name: Name,
    buffer: Vec<u8>,
    finished: bool,
}

impl AsyncWrite for MemoryWriter {
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
        if !self.finished {
            self.finished = true;
            let payload = std::mem::take(&mut self.buffer);
            let data = Data::new(self.name.clone(), payload);
            self.face.publish(data);
        }
        Poll::Ready(Ok(()))
    }
}
