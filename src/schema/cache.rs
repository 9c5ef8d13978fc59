// Copyright 2025 Bucketdb Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bucket cache invalidation
//!
//! Callers holding a per-connection schema cache must never serve a bucket
//! definition that predates a schema change. Invalidation is a message, not
//! a shared-memory mutation: every cache subscribes to the bus, schema
//! changes broadcast `Invalidation`, and each cache drains its channel
//! before answering a lookup. Best-effort signal, not a lock — a write
//! racing the shootdown fails cleanly downstream rather than corrupting
//! data.

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use super::bucket::Bucket;

/// A schema-change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub bucket: String,

    /// The version after the change, 0 for deletion
    pub version: u64,
}

/// Broadcast hub for schema-change notifications
#[derive(Default)]
pub struct InvalidationBus {
    subscribers: Mutex<Vec<Sender<Invalidation>>>,
}

impl InvalidationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache wired to this bus
    pub fn subscribe(&self) -> BucketCache {
        let (tx, rx) = channel();
        self.subscribers.lock().push(tx);
        BucketCache {
            rx,
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Synchronously deliver an invalidation to every live subscriber
    pub fn broadcast(&self, inv: Invalidation) {
        debug!(bucket = %inv.bucket, version = inv.version, "invalidating cached bucket");
        self.subscribers
            .lock()
            .retain(|tx| tx.send(inv.clone()).is_ok());
    }

    /// Number of live subscribers (drops are swept on the next broadcast)
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl std::fmt::Debug for InvalidationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Per-connection bucket schema cache
///
/// Lookups drain pending invalidations first, so a hit can never return a
/// definition older than the last broadcast schema change.
pub struct BucketCache {
    rx: Receiver<Invalidation>,
    entries: Mutex<FxHashMap<String, Bucket>>,
}

impl BucketCache {
    /// Fetch a cached definition, applying pending invalidations first
    pub fn get(&self, name: &str) -> Option<Bucket> {
        self.drain();
        self.entries.lock().get(name).cloned()
    }

    /// Cache a definition
    pub fn put(&self, bucket: Bucket) {
        self.drain();
        self.entries.lock().insert(bucket.name.clone(), bucket);
    }

    /// Number of cached definitions (after draining invalidations)
    pub fn len(&self) -> usize {
        self.drain();
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn drain(&self) {
        loop {
            match self.rx.try_recv() {
                Ok(inv) => {
                    self.entries.lock().remove(&inv.bucket);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }
}
