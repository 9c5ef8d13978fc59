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

//! Bucket schema storage
//!
//! Holds the authoritative bucket definitions and enforces the schema
//! lifecycle: name validation on create, monotonic versions on update, and
//! reindex generation bookkeeping when an update introduces (or re-types)
//! index fields over existing data. Every successful change broadcasts an
//! invalidation so subscribed caches drop their stale copy.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::info;

use crate::core::{Error, Result};

use super::bucket::{validate_bucket_name, Bucket, BucketConfig, IndexDef};
use super::cache::{Invalidation, InvalidationBus};

/// Authoritative store of bucket definitions
#[derive(Debug)]
pub struct BucketStore {
    buckets: RwLock<BTreeMap<String, Bucket>>,
    bus: Arc<InvalidationBus>,
}

impl BucketStore {
    pub fn new(bus: Arc<InvalidationBus>) -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
            bus,
        }
    }

    pub fn bus(&self) -> &Arc<InvalidationBus> {
        &self.bus
    }

    /// Create a bucket from a validated config
    ///
    /// A freshly created bucket has no rows, so its index fields are usable
    /// immediately and no reindex generation opens.
    pub fn create(&self, name: &str, config: &BucketConfig) -> Result<Bucket> {
        validate_bucket_name(name)?;
        let parsed = config.validate()?;

        let mut buckets = self.buckets.write();
        if buckets.contains_key(name) {
            return Err(Error::invalid_config(format!(
                "bucket \"{}\" already exists",
                name
            )));
        }

        let version = config.options.version;
        let index = parsed
            .into_iter()
            .map(|(field, (ty, unique))| {
                (
                    field,
                    IndexDef {
                        ty,
                        unique,
                        added_version: version,
                    },
                )
            })
            .collect();

        let bucket = Bucket {
            name: name.to_string(),
            index,
            pre: config.pre.clone(),
            post: config.post.clone(),
            options: config.options.clone(),
            reindex_active: BTreeMap::new(),
            mtime: Utc::now(),
        };
        buckets.insert(name.to_string(), bucket.clone());
        drop(buckets);

        info!(bucket = name, version, "bucket created");
        self.bus.broadcast(Invalidation {
            bucket: name.to_string(),
            version,
        });
        Ok(bucket)
    }

    /// Fetch a bucket definition
    pub fn get(&self, name: &str) -> Result<Bucket> {
        self.buckets
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::BucketNotFound(name.to_string()))
    }

    /// All bucket definitions in name order
    pub fn list(&self) -> Vec<Bucket> {
        self.buckets.read().values().cloned().collect()
    }

    /// Replace a bucket's schema
    ///
    /// Versioned buckets (current version > 0) only move forward: the new
    /// version may match or exceed the stored one, never fall behind it.
    /// Fields that are
    /// new, or whose type changed, are treated as added at the new version
    /// and a reindex generation opens so existing rows get backfilled before
    /// the planner trusts them. Version-0 buckets skip the generation
    /// machinery entirely.
    pub fn update(&self, name: &str, config: &BucketConfig) -> Result<Bucket> {
        let parsed = config.validate()?;

        let mut buckets = self.buckets.write();
        let current = buckets
            .get(name)
            .ok_or_else(|| Error::BucketNotFound(name.to_string()))?;

        let old_version = current.options.version;
        let new_version = config.options.version;
        if old_version > 0 && new_version < old_version {
            return Err(Error::BucketVersion {
                bucket: name.to_string(),
                current: old_version,
                requested: new_version,
            });
        }

        let mut needs_reindex = false;
        let mut index = BTreeMap::new();
        for (field, (ty, unique)) in parsed {
            let added_version = match current.index.get(&field) {
                // Same type keeps its history; an altered type must be
                // rebuilt from scratch, so it counts as re-added.
                Some(old) if old.ty == ty => old.added_version,
                Some(_) | None => {
                    if new_version > 0 {
                        needs_reindex = true;
                    }
                    new_version
                }
            };
            index.insert(
                field,
                IndexDef {
                    ty,
                    unique,
                    added_version,
                },
            );
        }

        let mut reindex_active = current.reindex_active.clone();
        if needs_reindex {
            reindex_active.insert(new_version, Utc::now());
        }

        let bucket = Bucket {
            name: name.to_string(),
            index,
            pre: config.pre.clone(),
            post: config.post.clone(),
            options: config.options.clone(),
            reindex_active,
            mtime: Utc::now(),
        };
        buckets.insert(name.to_string(), bucket.clone());
        drop(buckets);

        info!(
            bucket = name,
            version = new_version,
            reindex = needs_reindex,
            "bucket updated"
        );
        self.bus.broadcast(Invalidation {
            bucket: name.to_string(),
            version: new_version,
        });
        Ok(bucket)
    }

    /// Delete a bucket definition
    pub fn delete(&self, name: &str) -> Result<()> {
        let removed = self.buckets.write().remove(name);
        if removed.is_none() {
            return Err(Error::BucketNotFound(name.to_string()));
        }
        info!(bucket = name, "bucket deleted");
        self.bus.broadcast(Invalidation {
            bucket: name.to_string(),
            version: 0,
        });
        Ok(())
    }

    /// Close every open reindex generation up to and including `version`
    ///
    /// Called once a reindex pass finds no rows left behind the generation.
    pub fn retire_reindex(&self, name: &str, version: u64) -> Result<Bucket> {
        let mut buckets = self.buckets.write();
        let bucket = buckets
            .get_mut(name)
            .ok_or_else(|| Error::BucketNotFound(name.to_string()))?;
        bucket.reindex_active.retain(|g, _| *g > version);
        bucket.mtime = Utc::now();
        let snapshot = bucket.clone();
        drop(buckets);

        info!(bucket = name, version, "reindex generation retired");
        self.bus.broadcast(Invalidation {
            bucket: name.to_string(),
            version: snapshot.options.version,
        });
        Ok(snapshot)
    }
}
