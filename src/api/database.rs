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

//! The database facade
//!
//! Every operation of the store behind one handle: bucket lifecycle,
//! object mutation with optimistic concurrency, filtered queries, bulk
//! update/delete, reindexing, and atomic batches.

use std::sync::Arc;

use tracing::debug;

use crate::config::EngineConfig;
use crate::core::{Error, ObjectRecord, Result};
use crate::engine::{
    execute, reindex_page, EtagCheck, FindOptions, ObjectStore, ReindexResult, UndoLog,
};
use crate::filter;
use crate::planner::plan;
use crate::schema::{
    Bucket, BucketCache, BucketConfig, BucketStore, InvalidationBus, TriggerContext, TriggerOp,
    TriggerRegistry,
};

use super::options::{BulkOptions, DeleteOptions, PutOptions};
use super::stream::RecordStream;

/// One operation of an atomic batch
#[derive(Debug, Clone)]
pub enum BatchRequest {
    Put {
        bucket: String,
        key: String,
        value: serde_json::Value,
        options: PutOptions,
    },
    Delete {
        bucket: String,
        key: String,
        options: DeleteOptions,
    },
    Update {
        bucket: String,
        fields: serde_json::Map<String, serde_json::Value>,
        filter: String,
        options: BulkOptions,
    },
    DeleteMany {
        bucket: String,
        filter: String,
        options: BulkOptions,
    },
}

/// Per-operation outcome of a successful batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchResult {
    Put { key: String, etag: String },
    Delete { key: String },
    Update { count: u64 },
    DeleteMany { count: u64 },
}

/// An embedded schema-driven document store
pub struct Database {
    config: EngineConfig,
    bus: Arc<InvalidationBus>,
    buckets: BucketStore,
    objects: ObjectStore,
    triggers: TriggerRegistry,
}

impl Default for Database {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Database {
    pub fn new(config: EngineConfig) -> Self {
        let bus = Arc::new(InvalidationBus::new());
        Self {
            config,
            buckets: BucketStore::new(Arc::clone(&bus)),
            bus,
            objects: ObjectStore::new(),
            triggers: TriggerRegistry::new(),
        }
    }

    /// Trigger registry for bucket pre/post hooks
    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    /// A bucket schema cache subscribed to this store's invalidations
    pub fn bucket_cache(&self) -> BucketCache {
        self.bus.subscribe()
    }

    // =========================================================================
    // Bucket lifecycle
    // =========================================================================

    /// Create a bucket
    pub fn create_bucket(&self, name: &str, config: &BucketConfig) -> Result<Bucket> {
        self.triggers.resolve(&config.pre)?;
        self.triggers.resolve(&config.post)?;
        self.buckets.create(name, config)
    }

    /// Fetch a bucket definition
    pub fn get_bucket(&self, name: &str) -> Result<Bucket> {
        self.buckets.get(name)
    }

    /// All bucket definitions in name order
    pub fn list_buckets(&self) -> Vec<Bucket> {
        self.buckets.list()
    }

    /// Replace a bucket's schema, opening a reindex generation when the
    /// update adds or re-types index fields
    pub fn update_bucket(&self, name: &str, config: &BucketConfig) -> Result<Bucket> {
        self.triggers.resolve(&config.pre)?;
        self.triggers.resolve(&config.post)?;
        self.buckets.update(name, config)
    }

    /// Delete a bucket and every object in it
    pub fn del_bucket(&self, name: &str) -> Result<()> {
        self.buckets.delete(name)?;
        self.objects.drop_bucket(name);
        Ok(())
    }

    // =========================================================================
    // Single-object operations
    // =========================================================================

    /// Write one object
    pub fn put_object(
        &self,
        bucket: &str,
        key: &str,
        value: serde_json::Value,
        opts: &PutOptions,
    ) -> Result<ObjectRecord> {
        require_key("putObject", key)?;
        let b = self.buckets.get(bucket)?;
        self.run_triggers(&b.pre, &b, key, TriggerOp::Put, Some(&value))?;
        let record = self.objects.put(&b, key, value, &opts.etag)?;
        self.run_triggers(&b.post, &b, key, TriggerOp::Put, Some(&record.value))?;
        Ok(record)
    }

    /// Fetch one object
    pub fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectRecord> {
        require_key("getObject", key)?;
        self.buckets.get(bucket)?;
        self.objects.get(bucket, key)
    }

    /// Delete one object
    pub fn del_object(&self, bucket: &str, key: &str, opts: &DeleteOptions) -> Result<()> {
        require_key("delObject", key)?;
        let b = self.buckets.get(bucket)?;
        self.run_triggers(&b.pre, &b, key, TriggerOp::Delete, None)?;
        self.objects.delete(&b, key, &opts.etag)?;
        self.run_triggers(&b.post, &b, key, TriggerOp::Delete, None)?;
        Ok(())
    }

    // =========================================================================
    // Queries and bulk mutations
    // =========================================================================

    /// Run a filtered query
    ///
    /// Errors (bad filter, inadmissible plan, timeout) arrive through the
    /// stream's error signal.
    pub fn find_objects(&self, bucket: &str, filter_text: &str, opts: &FindOptions) -> RecordStream {
        match self.find_inner(bucket, filter_text, opts) {
            Ok(records) => RecordStream::from_records(records),
            Err(err) => RecordStream::from_error(err),
        }
    }

    fn find_inner(
        &self,
        bucket: &str,
        filter_text: &str,
        opts: &FindOptions,
    ) -> Result<Vec<ObjectRecord>> {
        require_filter("findObjects", filter_text)?;
        let b = self.buckets.get(bucket)?;
        let parsed = filter::parse(filter_text)?;
        let require = opts.require_indexes.unwrap_or(self.config.require_indexes);
        let p = plan(&b, &parsed, require)?;
        execute(
            &self.objects,
            &b,
            &p,
            opts,
            self.config.default_page_limit,
        )
    }

    /// Update fields on every object matching a filter
    ///
    /// Returns the number of rows updated. With `limit`, at most that many
    /// matches (in `_id` order) are touched per call.
    pub fn update_objects(
        &self,
        bucket: &str,
        fields: &serde_json::Map<String, serde_json::Value>,
        filter_text: &str,
        opts: &BulkOptions,
    ) -> Result<u64> {
        self.update_objects_inner(bucket, fields, filter_text, opts, None)
    }

    fn update_objects_inner(
        &self,
        bucket: &str,
        fields: &serde_json::Map<String, serde_json::Value>,
        filter_text: &str,
        opts: &BulkOptions,
        mut undo: Option<&mut UndoLog>,
    ) -> Result<u64> {
        require_filter("updateObjects", filter_text)?;
        let b = self.buckets.get(bucket)?;
        check_update_fields(&b, fields)?;

        let matches = self.bulk_matches(&b, filter_text, opts)?;
        let count = matches.len() as u64;
        for record in matches {
            if let Some(log) = undo.as_deref_mut() {
                self.objects.record_prior(log, bucket, &record.key);
            }
            self.objects.update_row(&b, &record.key, fields)?;
        }
        debug!(bucket, count, "objects updated");
        Ok(count)
    }

    /// Delete every object matching a filter
    pub fn delete_many(&self, bucket: &str, filter_text: &str, opts: &BulkOptions) -> Result<u64> {
        self.delete_many_inner(bucket, filter_text, opts, None)
    }

    fn delete_many_inner(
        &self,
        bucket: &str,
        filter_text: &str,
        opts: &BulkOptions,
        mut undo: Option<&mut UndoLog>,
    ) -> Result<u64> {
        require_filter("deleteMany", filter_text)?;
        let b = self.buckets.get(bucket)?;
        let matches = self.bulk_matches(&b, filter_text, opts)?;
        let count = matches.len() as u64;
        for record in matches {
            if let Some(log) = undo.as_deref_mut() {
                self.objects.record_prior(log, bucket, &record.key);
            }
            self.objects.delete(&b, &record.key, &EtagCheck::Unconditional)?;
        }
        debug!(bucket, count, "objects deleted");
        Ok(count)
    }

    fn bulk_matches(
        &self,
        b: &Bucket,
        filter_text: &str,
        opts: &BulkOptions,
    ) -> Result<Vec<ObjectRecord>> {
        let parsed = filter::parse(filter_text)?;
        let p = plan(b, &parsed, self.config.require_indexes)?;
        let find_opts = FindOptions {
            limit: opts.limit,
            no_limit: opts.limit.is_none(),
            ..FindOptions::default()
        };
        execute(&self.objects, b, &p, &find_opts, self.config.default_page_limit)
    }

    // =========================================================================
    // Reindex, batch, and service surface
    // =========================================================================

    /// Run one reindex page; loop until `processed` is zero
    pub fn reindex_objects(&self, bucket: &str, count: u64) -> Result<ReindexResult> {
        if count == 0 {
            return Err(Error::invocation(
                "reindexObjects",
                "count",
                1,
                "a positive integer",
            ));
        }
        reindex_page(&self.objects, &self.buckets, bucket, count)
    }

    /// Apply a list of mutations as one atomic unit
    ///
    /// Any single request's failure rolls back every row the batch touched
    /// and returns that error. Rows written by other callers in the meantime
    /// are left alone.
    pub fn batch(&self, requests: &[BatchRequest]) -> Result<Vec<BatchResult>> {
        let mut undo = UndoLog::default();
        match self.apply_batch(requests, &mut undo) {
            Ok(results) => Ok(results),
            Err(err) => {
                self.objects.rollback(undo);
                Err(err)
            }
        }
    }

    fn apply_batch(
        &self,
        requests: &[BatchRequest],
        undo: &mut UndoLog,
    ) -> Result<Vec<BatchResult>> {
        let mut results = Vec::with_capacity(requests.len());
        for req in requests {
            let result = match req {
                BatchRequest::Put {
                    bucket,
                    key,
                    value,
                    options,
                } => {
                    self.objects.record_prior(undo, bucket, key);
                    let record = self.put_object(bucket, key, value.clone(), options)?;
                    BatchResult::Put {
                        key: key.clone(),
                        etag: record.etag,
                    }
                }
                BatchRequest::Delete {
                    bucket,
                    key,
                    options,
                } => {
                    self.objects.record_prior(undo, bucket, key);
                    self.del_object(bucket, key, options)?;
                    BatchResult::Delete { key: key.clone() }
                }
                BatchRequest::Update {
                    bucket,
                    fields,
                    filter,
                    options,
                } => BatchResult::Update {
                    count: self
                        .update_objects_inner(bucket, fields, filter, options, Some(&mut *undo))?,
                },
                BatchRequest::DeleteMany {
                    bucket,
                    filter,
                    options,
                } => BatchResult::DeleteMany {
                    count: self.delete_many_inner(bucket, filter, options, Some(&mut *undo))?,
                },
            };
            results.push(result);
        }
        Ok(results)
    }

    /// Raw SQL passthrough is not part of this engine
    pub fn sql(&self, _text: &str, _values: &[serde_json::Value]) -> Result<RecordStream> {
        Err(Error::OperationNotSupported("sql".to_string()))
    }

    /// Liveness check
    pub fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Engine version string
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Shard token listing is not part of this engine
    pub fn get_tokens(&self) -> Result<Vec<String>> {
        Err(Error::OperationNotSupported("getTokens".to_string()))
    }

    fn run_triggers(
        &self,
        names: &[String],
        bucket: &Bucket,
        key: &str,
        op: TriggerOp,
        value: Option<&serde_json::Value>,
    ) -> Result<()> {
        let ctx = TriggerContext {
            bucket: &bucket.name,
            key,
            op,
            value,
        };
        for trigger in self.triggers.resolve(names)? {
            trigger.run(&ctx)?;
        }
        Ok(())
    }
}

/// Field assignments for update must name schema columns and carry
/// non-null values; touching a unique column is refused because a bulk
/// update could stamp the same value onto several rows
fn check_update_fields(
    bucket: &Bucket,
    fields: &serde_json::Map<String, serde_json::Value>,
) -> Result<()> {
    if fields.is_empty() {
        return Err(Error::FieldUpdate);
    }
    for (field, value) in fields {
        let def = bucket.index.get(field).ok_or_else(|| Error::NotIndexed {
            bucket: bucket.name.clone(),
            field: field.clone(),
        })?;
        if value.is_null() {
            return Err(Error::NotNullable(field.clone()));
        }
        if def.unique {
            return Err(Error::UniqueAttribute {
                bucket: bucket.name.clone(),
                field: field.clone(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

fn require_key(method: &str, key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invocation(method, "key", 1, "a non-empty string"));
    }
    Ok(())
}

fn require_filter(method: &str, filter: &str) -> Result<()> {
    if filter.is_empty() {
        return Err(Error::invocation(
            method,
            "filter",
            1,
            "a non-empty string",
        ));
    }
    Ok(())
}
