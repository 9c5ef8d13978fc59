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

//! Object storage and mutation
//!
//! Rows live per bucket alongside their field indexes. Every mutation is a
//! read-check-write unit under the store lock: etag compare-and-swap,
//! type validation, and unique-constraint checks all pass before anything
//! is written, so a failed put leaves no partial state behind.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::core::{Error, IndexValue, ObjectRecord, Result};
use crate::schema::Bucket;

use super::index::FieldIndex;

/// Etag precondition for a mutation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EtagCheck {
    /// No precondition
    #[default]
    Unconditional,
    /// The key must not currently exist (insert-only)
    IfAbsent,
    /// The current row's etag must match
    IfMatch(String),
}

/// One stored row with its cached canonical index values
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub value: serde_json::Value,
    pub id: u64,
    pub etag: String,
    pub mtime: i64,
    pub txn_snap: u64,

    /// Schema version the row was last written (or reindexed) under
    pub rver: u64,

    /// Canonical values as indexed; kept so removal hits the exact entries
    pub indexed: FxHashMap<String, IndexValue>,
}

/// Rows and indexes of one bucket
#[derive(Debug, Clone, Default)]
pub struct BucketRows {
    pub(super) rows: FxHashMap<String, StoredRow>,
    pub(super) indexes: FxHashMap<String, FieldIndex>,
}

impl BucketRows {
    pub(super) fn unindex_row(&mut self, key: &str, row: &StoredRow) {
        for (field, value) in &row.indexed {
            if let Some(idx) = self.indexes.get_mut(field) {
                idx.remove(value, key);
            }
        }
    }

    pub(super) fn index_row(&mut self, key: &str, row: &StoredRow) {
        for (field, value) in &row.indexed {
            self.indexes
                .entry(field.clone())
                .or_default()
                .insert(value, key);
        }
    }
}

/// Before-images of the rows a batch touches, replayed in reverse order if
/// the batch fails
///
/// Rolling back by key leaves rows the batch never touched alone, so a
/// concurrent writer's commits survive the unwind.
#[derive(Debug, Default)]
pub struct UndoLog {
    entries: Vec<(String, String, Option<StoredRow>)>,
}

/// The value store: all buckets' rows, under one lock
#[derive(Debug, Default)]
pub struct ObjectStore {
    pub(super) buckets: RwLock<FxHashMap<String, BucketRows>>,
    next_id: AtomicU64,
    next_txn: AtomicU64,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an object, enforcing the etag precondition and every unique
    /// constraint atomically
    pub fn put(
        &self,
        bucket: &Bucket,
        key: &str,
        value: serde_json::Value,
        check: &EtagCheck,
    ) -> Result<ObjectRecord> {
        let indexed = canonicalize(bucket, &value)?;

        let mut buckets = self.buckets.write();
        let rows = buckets.entry(bucket.name.clone()).or_default();

        let existing = rows.rows.get(key);
        check_etag(bucket, key, check, existing)?;
        check_unique(bucket, key, &indexed, rows)?;

        let id = match existing {
            Some(row) => row.id,
            None => self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1,
        };
        let row = StoredRow {
            value,
            id,
            etag: new_etag(),
            mtime: Utc::now().timestamp_millis(),
            txn_snap: self.next_txn.fetch_add(1, AtomicOrdering::SeqCst) + 1,
            rver: bucket.options.version,
            indexed,
        };

        if let Some(old) = rows.rows.remove(key) {
            rows.unindex_row(key, &old);
        }
        rows.index_row(key, &row);
        let record = materialize(&bucket.name, key, &row, 1);
        rows.rows.insert(key.to_string(), row);

        debug!(bucket = %bucket.name, key, etag = %record.etag, "object written");
        Ok(record)
    }

    /// Fetch one object
    pub fn get(&self, bucket_name: &str, key: &str) -> Result<ObjectRecord> {
        let buckets = self.buckets.read();
        buckets
            .get(bucket_name)
            .and_then(|rows| rows.rows.get(key))
            .map(|row| materialize(bucket_name, key, row, 1))
            .ok_or_else(|| Error::ObjectNotFound {
                bucket: bucket_name.to_string(),
                key: key.to_string(),
            })
    }

    /// Delete one object, honoring the etag precondition
    pub fn delete(&self, bucket: &Bucket, key: &str, check: &EtagCheck) -> Result<()> {
        let mut buckets = self.buckets.write();
        let rows = buckets
            .get_mut(&bucket.name)
            .ok_or_else(|| Error::ObjectNotFound {
                bucket: bucket.name.clone(),
                key: key.to_string(),
            })?;

        check_etag(bucket, key, check, rows.rows.get(key))?;
        let row = rows.rows.remove(key).ok_or_else(|| Error::ObjectNotFound {
            bucket: bucket.name.clone(),
            key: key.to_string(),
        })?;
        rows.unindex_row(key, &row);
        debug!(bucket = %bucket.name, key, "object deleted");
        Ok(())
    }

    /// Merge field assignments into an existing row and rewrite it
    ///
    /// The caller has already vetted the field set. Supplied values validate
    /// strictly like any write; untouched fields that predate a type change
    /// index as null instead of aborting the update.
    pub fn update_row(
        &self,
        bucket: &Bucket,
        key: &str,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ObjectRecord> {
        let mut buckets = self.buckets.write();
        let rows = buckets
            .get_mut(&bucket.name)
            .ok_or_else(|| Error::ObjectNotFound {
                bucket: bucket.name.clone(),
                key: key.to_string(),
            })?;
        let old = rows.rows.get(key).ok_or_else(|| Error::ObjectNotFound {
            bucket: bucket.name.clone(),
            key: key.to_string(),
        })?;

        let mut value = old.value.clone();
        if let Some(obj) = value.as_object_mut() {
            for (field, v) in fields {
                obj.insert(field.clone(), v.clone());
            }
        }
        let mut indexed = FxHashMap::default();
        for (field, def) in &bucket.index {
            let raw = value.get(field).unwrap_or(&serde_json::Value::Null);
            let canonical = if fields.contains_key(field) {
                IndexValue::validate(field, def.ty, raw)?
            } else {
                IndexValue::validate(field, def.ty, raw).unwrap_or(IndexValue::Null)
            };
            indexed.insert(field.clone(), canonical);
        }
        check_unique(bucket, key, &indexed, rows)?;

        let row = StoredRow {
            value,
            id: old.id,
            etag: new_etag(),
            mtime: Utc::now().timestamp_millis(),
            txn_snap: self.next_txn.fetch_add(1, AtomicOrdering::SeqCst) + 1,
            rver: bucket.options.version,
            indexed,
        };
        let old = rows.rows.remove(key).unwrap();
        rows.unindex_row(key, &old);
        rows.index_row(key, &row);
        let record = materialize(&bucket.name, key, &row, 1);
        rows.rows.insert(key.to_string(), row);
        Ok(record)
    }

    /// Drop every row and index of a bucket
    pub fn drop_bucket(&self, name: &str) {
        self.buckets.write().remove(name);
    }

    /// Number of rows in a bucket
    pub fn row_count(&self, name: &str) -> u64 {
        self.buckets
            .read()
            .get(name)
            .map(|rows| rows.rows.len() as u64)
            .unwrap_or(0)
    }

    /// Record a row's current state ahead of a batch mutation
    ///
    /// Only the first sighting of a key is kept; later mutations of the same
    /// key roll back to the pre-batch row.
    pub fn record_prior(&self, log: &mut UndoLog, bucket: &str, key: &str) {
        if log.entries.iter().any(|(b, k, _)| b == bucket && k == key) {
            return;
        }
        let buckets = self.buckets.read();
        let prior = buckets
            .get(bucket)
            .and_then(|rows| rows.rows.get(key))
            .cloned();
        log.entries
            .push((bucket.to_string(), key.to_string(), prior));
    }

    /// Put every recorded row back, newest first
    ///
    /// Rows the batch created disappear; rows it rewrote or deleted return
    /// with their original value, etag, and index entries.
    pub fn rollback(&self, log: UndoLog) {
        let mut buckets = self.buckets.write();
        for (bucket, key, prior) in log.entries.into_iter().rev() {
            let Some(rows) = buckets.get_mut(&bucket) else {
                continue;
            };
            if let Some(current) = rows.rows.remove(&key) {
                rows.unindex_row(&key, &current);
            }
            if let Some(row) = prior {
                rows.index_row(&key, &row);
                rows.rows.insert(key, row);
            }
        }
    }
}

/// Project a row's canonical index values per the bucket schema
fn canonicalize(
    bucket: &Bucket,
    value: &serde_json::Value,
) -> Result<FxHashMap<String, IndexValue>> {
    let mut indexed = FxHashMap::default();
    for (field, def) in &bucket.index {
        let raw = value.get(field).unwrap_or(&serde_json::Value::Null);
        indexed.insert(field.clone(), IndexValue::validate(field, def.ty, raw)?);
    }
    Ok(indexed)
}

fn check_etag(
    bucket: &Bucket,
    key: &str,
    check: &EtagCheck,
    existing: Option<&StoredRow>,
) -> Result<()> {
    match (check, existing) {
        (EtagCheck::Unconditional, _) => Ok(()),
        (EtagCheck::IfAbsent, None) => Ok(()),
        (EtagCheck::IfAbsent, Some(row)) => Err(Error::etag_conflict(
            &bucket.name,
            key,
            "null",
            row.etag.clone(),
        )),
        (EtagCheck::IfMatch(expected), Some(row)) if *expected == row.etag => Ok(()),
        (EtagCheck::IfMatch(expected), Some(row)) => Err(Error::etag_conflict(
            &bucket.name,
            key,
            expected.clone(),
            row.etag.clone(),
        )),
        (EtagCheck::IfMatch(expected), None) => Err(Error::etag_conflict(
            &bucket.name,
            key,
            expected.clone(),
            "null",
        )),
    }
}

fn check_unique(
    bucket: &Bucket,
    key: &str,
    indexed: &FxHashMap<String, IndexValue>,
    rows: &BucketRows,
) -> Result<()> {
    for (field, def) in &bucket.index {
        if !def.unique {
            continue;
        }
        let Some(value) = indexed.get(field) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if let Some(idx) = rows.indexes.get(field) {
            if idx.holder_of(value, key).is_some() {
                return Err(Error::UniqueAttribute {
                    bucket: bucket.name.clone(),
                    field: field.clone(),
                    value: value.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn materialize(bucket: &str, key: &str, row: &StoredRow, count: u64) -> ObjectRecord {
    ObjectRecord {
        bucket: bucket.to_string(),
        key: key.to_string(),
        value: row.value.clone(),
        id: row.id,
        etag: row.etag.clone(),
        mtime: row.mtime,
        txn_snap: row.txn_snap,
        count,
    }
}

/// A fresh opaque 16-hex-char revision token
fn new_etag() -> String {
    format!("{:016x}", rand::thread_rng().gen::<u64>())
}
