// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Filter and pending-interest bookkeeping shared by the faces.

use super::{ContentHandler, InterestHandler};
use crate::name::Name;
use crate::packet::{Data, Interest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

/// How long an expressed interest waits for data before it is forgotten.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_secs(30);

struct PendingInterest {
    interest: Interest,
    handler: Arc<dyn ContentHandler>,
    expires: Instant,
}

struct PendingRead {
    interest: Interest,
    tx: oneshot::Sender<Data>,
}

/// Content handler invocations owed after a data arrival.
pub(crate) type Satisfied = Vec<(Data, Interest, Arc<dyn ContentHandler>)>;

pub(crate) struct FaceTable {
    filters: Vec<(Name, Arc<dyn InterestHandler>)>,
    pending: Vec<PendingInterest>,
    reads: Vec<PendingRead>,
    interest_lifetime: Duration,
}

impl Default for FaceTable {
    fn default() -> Self {
        Self::with_interest_lifetime(DEFAULT_INTEREST_LIFETIME)
    }
}

impl FaceTable {
    pub fn with_interest_lifetime(interest_lifetime: Duration) -> Self {
        Self {
            filters: Vec::new(),
            pending: Vec::new(),
            reads: Vec::new(),
            interest_lifetime,
        }
    }

    pub fn add_filter(&mut self, prefix: &Name, handler: Arc<dyn InterestHandler>) {
        self.filters.retain(|(p, _)| p != prefix);
        self.filters.push((prefix.clone(), handler));
    }

    pub fn remove_filter(&mut self, prefix: &Name) -> bool {
        let before = self.filters.len();
        self.filters.retain(|(p, _)| p != prefix);
        before != self.filters.len()
    }

    pub fn has_filter(&self, prefix: &Name) -> bool {
        self.filters.iter().any(|(p, _)| p == prefix)
    }

    /// Handlers whose prefix covers `name`, most specific first.
    pub fn filters_for(&self, name: &Name) -> Vec<Arc<dyn InterestHandler>> {
        let mut matching: Vec<_> = self
            .filters
            .iter()
            .filter(|(p, _)| p.is_prefix_of(name))
            .collect();
        matching.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        matching.into_iter().map(|(_, h)| h.clone()).collect()
    }

    /// Wait for data matching `interest`, dropping expired entries first.
    pub fn add_pending(&mut self, interest: Interest, handler: Arc<dyn ContentHandler>) {
        let now = Instant::now();
        self.expire(now);
        self.pending.push(PendingInterest {
            interest,
            handler,
            expires: now + self.interest_lifetime,
        });
    }

    fn expire(&mut self, now: Instant) {
        let before = self.pending.len();
        self.pending.retain(|p| p.expires > now);
        let expired = before - self.pending.len();
        if expired > 0 {
            debug!("{} expressed interests expired unanswered", expired);
        }
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn add_read(&mut self, interest: &Interest) -> oneshot::Receiver<Data> {
        let (tx, rx) = oneshot::channel();
        self.reads.push(PendingRead {
            interest: interest.clone(),
            tx,
        });
        rx
    }

    /// Consume every pending interest and read satisfied by `data`.
    ///
    /// Reads are answered here; content handlers are returned so the caller
    /// can run them without holding its lock.
    pub fn satisfy(&mut self, data: &Data) -> Satisfied {
        self.expire(Instant::now());
        let mut satisfied = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].interest.matches(data) {
                let p = self.pending.swap_remove(i);
                satisfied.push((data.clone(), p.interest, p.handler));
            } else {
                i += 1;
            }
        }

        let mut i = 0;
        while i < self.reads.len() {
            if self.reads[i].tx.is_closed() {
                self.reads.swap_remove(i);
            } else if self.reads[i].interest.matches(data) {
                let r = self.reads.swap_remove(i);
                if r.tx.send(data.clone()).is_err() {
                    debug!("Reader for {} went away", r.interest.name());
                }
            } else {
                i += 1;
            }
        }

        satisfied
    }

    /// Drop every outstanding read so waiting streams observe closure.
    pub fn close_reads(&mut self) {
        self.reads.clear();
    }
}

/// Run content handlers collected by [`FaceTable::satisfy`].
pub(crate) fn deliver(satisfied: Satisfied) {
    for (data, interest, handler) in satisfied {
        handler.handle_content(data, &interest);
    }
}

/// Offer `interest` to `handlers` in order until one takes it.
pub(crate) fn dispatch(handlers: Vec<Arc<dyn InterestHandler>>, interest: Interest) {
    if handlers.is_empty() {
        debug!("No filter for {}", interest.name());
        return;
    }
    tokio::spawn(async move {
        for handler in handlers {
            if handler.handle_interest(interest.clone()).await {
                break;
            }
        }
    });
}
