// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relay of redirected content back under its original name.
//!
//! A relay reads the content answering a redirected interest and republishes
//! it under a fresh version of the original interest's name, so whoever asked
//! for the original name gets an answer. Relays run on a bounded pool: each
//! one holds a semaphore permit for its whole lifetime.
//!
//! # Flow
//!
//! 1. Record `redirected -> original` in the in-flight mapping
//! 2. Open a read stream on the redirected name (bounded by the open timeout)
//! 3. Open a write stream on `original/<new version>`
//! 4. Copy fixed-size chunks, flushing after each, until end of stream
//! 5. Finalize the write stream and clear the mapping
//!
//! A copy that fails after some bytes went out still finalizes the write
//! stream, so the partial content is published before the error is reported.

use crate::face::{copy_chunked_counting, Face, FaceError};
use crate::name::Name;
use crate::packet::Interest;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Default relay copy buffer.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default number of concurrent relays.
pub const DEFAULT_WORKERS: usize = 8;

/// Default bound on opening either stream.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Relay errors.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("timed out opening {0}")]
    OpenTimeout(Name),

    #[error("face error: {0}")]
    Face(#[from] FaceError),

    #[error("I/O error while relaying: {0}")]
    Io(#[from] std::io::Error),

    #[error("relay pool shut down")]
    PoolClosed,
}

/// Relay counters.
#[derive(Debug)]
pub struct RelayStats {
    /// Relays dispatched.
    pub started: AtomicU64,

    /// Relays that republished their content.
    pub completed: AtomicU64,

    /// Relays that failed.
    pub failed: AtomicU64,

    /// Payload bytes republished.
    pub bytes: AtomicU64,

    created: Instant,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            started: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of relay statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub bytes: u64,
    pub uptime_secs: u64,
}

impl RelayStatsSnapshot {
    /// Relays still running.
    pub fn in_flight(&self) -> u64 {
        self.started
            .saturating_sub(self.completed)
            .saturating_sub(self.failed)
    }
}

/// Redirected names currently being relayed, with the original names each
/// one stands in for.
#[derive(Debug, Default)]
pub struct PendingRelayMapping {
    inner: Mutex<HashMap<Name, Vec<Name>>>,
}

impl PendingRelayMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, redirected: &Name, original: &Name) {
        self.inner
            .lock()
            .entry(redirected.clone())
            .or_default()
            .push(original.clone());
    }

    /// Forget one `redirected -> original` pair.
    pub fn remove(&self, redirected: &Name, original: &Name) {
        let mut inner = self.inner.lock();
        if let Some(originals) = inner.get_mut(redirected) {
            if let Some(pos) = originals.iter().position(|o| o == original) {
                originals.remove(pos);
            }
            if originals.is_empty() {
                inner.remove(redirected);
            }
        }
    }

    /// True if an interest named exactly `redirected` is being relayed.
    pub fn contains(&self, redirected: &Name) -> bool {
        self.inner.lock().contains_key(redirected)
    }

    /// Original names the relay of `redirected` stands in for.
    pub fn originals(&self, redirected: &Name) -> Vec<Name> {
        self.inner
            .lock()
            .get(redirected)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of redirected names in flight.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Bounded pool of relay copies over a face.
#[derive(Clone)]
pub struct RelayEngine {
    face: Arc<dyn Face>,
    permits: Arc<Semaphore>,
    open_timeout: Duration,
    chunk_size: usize,
    mapping: Arc<PendingRelayMapping>,
    stats: Arc<RelayStats>,
}

impl RelayEngine {
    /// Create an engine running at most `workers` relays at once.
    pub fn new(
        face: Arc<dyn Face>,
        workers: usize,
        chunk_size: usize,
        open_timeout: Duration,
    ) -> Self {
        Self {
            face,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            open_timeout,
            chunk_size: chunk_size.max(1),
            mapping: Arc::new(PendingRelayMapping::new()),
            stats: Arc::new(RelayStats::new()),
        }
    }

    /// Relay the answer to `redirected` back under `original`'s name.
    ///
    /// Waits for a free worker first. Returns the number of bytes relayed.
    pub async fn relay(&self, redirected: &Interest, original: &Interest) -> Result<u64, RelayError> {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RelayError::PoolClosed)?;

        self.stats.started.fetch_add(1, Ordering::Relaxed);
        self.mapping.insert(redirected.name(), original.name());

        let result = self.copy(redirected, original).await;

        self.mapping.remove(redirected.name(), original.name());
        match &result {
            Ok(bytes) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                self.stats.bytes.fetch_add(*bytes, Ordering::Relaxed);
                debug!(
                    "Relayed {} -> {} ({} bytes)",
                    redirected.name(),
                    original.name(),
                    bytes
                );
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Relay {} -> {} failed: {}",
                    redirected.name(),
                    original.name(),
                    e
                );
            }
        }
        result
    }

    async fn copy(&self, redirected: &Interest, original: &Interest) -> Result<u64, RelayError> {
        let mut reader = tokio::time::timeout(self.open_timeout, self.face.open_read(redirected))
            .await
            .map_err(|_| RelayError::OpenTimeout(redirected.name().clone()))??;

        let target = original.name().versioned_now();
        let mut writer = tokio::time::timeout(self.open_timeout, self.face.open_write(&target))
            .await
            .map_err(|_| RelayError::OpenTimeout(target.clone()))??;

        let mut bytes = 0;
        let copied =
            copy_chunked_counting(&mut reader, &mut writer, self.chunk_size, &mut bytes).await;
        match copied {
            Ok(()) => {
                writer.shutdown().await?;
                Ok(bytes)
            }
            Err(e) => {
                if bytes > 0 {
                    if let Err(close) = writer.shutdown().await {
                        debug!("Failed to finalize partial {}: {}", target, close);
                    } else {
                        warn!("Published {} partial bytes under {}", bytes, target);
                    }
                }
                Err(e.into())
            }
        }
    }

    /// In-flight mapping.
    pub fn mapping(&self) -> &PendingRelayMapping {
        &self.mapping
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Workers currently idle.
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{ByteReader, ByteWriter, ContentHandler, InterestHandler, MemoryFace};
    use crate::packet::Data;
    use async_trait::async_trait;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, ReadBuf};

    fn n(uri: &str) -> Name {
        Name::parse(uri).unwrap()
    }

    fn engine(face: &MemoryFace, timeout: Duration) -> RelayEngine {
        RelayEngine::new(Arc::new(face.clone()), 2, 4, timeout)
    }

    #[tokio::test]
    async fn test_relay_republishes_under_original() {
        let face = MemoryFace::new();
        face.publish(Data::new(n("/b/file1/v1"), b"hello relay".to_vec()));
        let engine = engine(&face, DEFAULT_OPEN_TIMEOUT);

        let bytes = engine
            .relay(&Interest::new(n("/b/file1")), &Interest::new(n("/a/file1")))
            .await
            .unwrap();

        assert_eq!(bytes, 11);
        let relayed = face.content(&n("/a/file1")).unwrap();
        assert_eq!(relayed.payload(), b"hello relay");
        assert_eq!(relayed.name().len(), 3);
        assert!(relayed.name().version().is_some());

        let stats = engine.stats().snapshot();
        assert_eq!(stats.started, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.bytes, 11);
        assert_eq!(stats.in_flight(), 0);
        assert!(engine.mapping().is_empty());
    }

    #[tokio::test]
    async fn test_relay_open_timeout() {
        let face = MemoryFace::new();
        let engine = engine(&face, Duration::from_millis(20));

        let err = engine
            .relay(&Interest::new(n("/b/missing")), &Interest::new(n("/a/missing")))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::OpenTimeout(_)));
        assert!(face.content(&n("/a/missing")).is_none());
        assert_eq!(engine.stats().snapshot().failed, 1);
        assert!(engine.mapping().is_empty());
        assert_eq!(engine.available_workers(), 2);
    }

    #[tokio::test]
    async fn test_mapping_tracks_in_flight_relay() {
        let face = MemoryFace::new();
        let engine = engine(&face, DEFAULT_OPEN_TIMEOUT);

        let handle = tokio::spawn({
            let engine = engine.clone();
            async move {
                engine
                    .relay(&Interest::new(n("/b/late")), &Interest::new(n("/a/late")))
                    .await
            }
        });
        while engine.mapping().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(engine.mapping().contains(&n("/b/late")));
        assert!(!engine.mapping().contains(&n("/b/late/v9")));
        assert_eq!(engine.mapping().originals(&n("/b/late")), vec![n("/a/late")]);

        face.publish(Data::new(n("/b/late/v9"), b"x".to_vec()));
        assert_eq!(handle.await.unwrap().unwrap(), 1);
        assert!(!engine.mapping().contains(&n("/b/late")));
    }

    /// Yields `data`, then fails as if the peer went away.
    struct BrokenStream {
        data: &'static [u8],
    }

    impl AsyncRead for BrokenStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.data.is_empty() {
                return Poll::Ready(Err(std::io::ErrorKind::ConnectionReset.into()));
            }
            let len = buf.remaining().min(self.data.len());
            buf.put_slice(&self.data[..len]);
            self.data = &self.data[len..];
            Poll::Ready(Ok(()))
        }
    }

    /// Memory face whose read streams yield `data` and then break.
    struct BrokenReadFace {
        face: MemoryFace,
        data: &'static [u8],
    }

    #[async_trait]
    impl Face for BrokenReadFace {
        async fn put(&self, data: Data) -> Result<(), FaceError> {
            self.face.put(data).await
        }

        async fn express_interest(
            &self,
            interest: Interest,
            handler: Arc<dyn ContentHandler>,
        ) -> Result<(), FaceError> {
            self.face.express_interest(interest, handler).await
        }

        async fn register_filter(
            &self,
            prefix: &Name,
            handler: Arc<dyn InterestHandler>,
        ) -> Result<(), FaceError> {
            self.face.register_filter(prefix, handler).await
        }

        async fn unregister_filter(&self, prefix: &Name) -> Result<(), FaceError> {
            self.face.unregister_filter(prefix).await
        }

        async fn open_read(&self, _interest: &Interest) -> Result<ByteReader, FaceError> {
            Ok(Box::new(BrokenStream { data: self.data }))
        }

        async fn open_write(&self, name: &Name) -> Result<ByteWriter, FaceError> {
            self.face.open_write(name).await
        }
    }

    fn broken_engine(face: &MemoryFace, data: &'static [u8]) -> RelayEngine {
        let broken = BrokenReadFace {
            face: face.clone(),
            data,
        };
        RelayEngine::new(Arc::new(broken), 1, 4, DEFAULT_OPEN_TIMEOUT)
    }

    #[tokio::test]
    async fn test_broken_read_still_publishes_partial_content() {
        let face = MemoryFace::new();
        let engine = broken_engine(&face, b"partial");

        let err = engine
            .relay(&Interest::new(n("/b/f")), &Interest::new(n("/a/f")))
            .await
            .unwrap_err();

        assert!(matches!(&err, RelayError::Io(e) if e.kind() == std::io::ErrorKind::ConnectionReset));
        let published = face.content(&n("/a/f")).unwrap();
        assert_eq!(published.payload(), b"partial");
        assert!(published.name().version().is_some());

        let stats = engine.stats().snapshot();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
        assert!(engine.mapping().is_empty());
    }

    #[tokio::test]
    async fn test_broken_read_without_bytes_publishes_nothing() {
        let face = MemoryFace::new();
        let engine = broken_engine(&face, b"");

        let result = engine
            .relay(&Interest::new(n("/b/f")), &Interest::new(n("/a/f")))
            .await;

        assert!(matches!(result, Err(RelayError::Io(_))));
        assert!(face.content(&n("/a/f")).is_none());
        assert_eq!(engine.stats().snapshot().failed, 1);
    }

    #[test]
    fn test_mapping_remove_keeps_other_originals() {
        let mapping = PendingRelayMapping::new();
        mapping.insert(&n("/b/f"), &n("/a/f"));
        mapping.insert(&n("/b/f"), &n("/c/f"));
        mapping.remove(&n("/b/f"), &n("/a/f"));

        assert_eq!(mapping.originals(&n("/b/f")), vec![n("/c/f")]);
        assert_eq!(mapping.len(), 1);

        mapping.remove(&n("/b/f"), &n("/c/f"));
        assert!(mapping.is_empty());
    }
}
