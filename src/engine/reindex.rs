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

//! Paged, resumable index backfill
//!
//! When a schema update adds or re-types index fields, rows written under
//! the old schema carry a stale `rver`. Each reindex page picks up to
//! `page_size` such rows in `_id` order, recomputes their full index set
//! under the current schema, and stamps them current. A row a concurrent
//! writer already rewrote carries the current `rver` and is skipped, so
//! the backfill never clobbers fresher data. Once a page finds nothing to
//! do, the open generations are retired and the fields flip to usable.

use tracing::info;

use crate::core::{IndexValue, Result};
use crate::schema::{Bucket, BucketStore};

use super::store::{ObjectStore, StoredRow};

/// Outcome of one reindex page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReindexResult {
    /// Rows brought up to the current schema version in this page;
    /// callers loop until this reaches zero
    pub processed: u64,
}

/// Run one reindex page against a bucket
///
/// Idempotent and resumable: repeated calls with a fixed page size walk
/// the stale rows to exhaustion, and the call that finds none retires the
/// bucket's open reindex generations.
pub fn reindex_page(
    objects: &ObjectStore,
    buckets: &BucketStore,
    name: &str,
    page_size: u64,
) -> Result<ReindexResult> {
    let bucket = buckets.get(name)?;
    if !bucket.has_pending_reindex() {
        return Ok(ReindexResult { processed: 0 });
    }
    let version = bucket.options.version;

    let processed = reindex_rows(objects, &bucket, version, page_size);
    if processed == 0 {
        buckets.retire_reindex(name, version)?;
        info!(bucket = name, version, "reindex complete");
    } else {
        info!(bucket = name, version, processed, "reindex page done");
    }
    Ok(ReindexResult { processed })
}

fn reindex_rows(objects: &ObjectStore, bucket: &Bucket, version: u64, page_size: u64) -> u64 {
    let mut store = objects.buckets.write();
    let Some(rows) = store.get_mut(&bucket.name) else {
        return 0;
    };

    // Stale rows in _id order, one page's worth
    let mut stale: Vec<(String, u64)> = rows
        .rows
        .iter()
        .filter(|(_, row)| row.rver < version)
        .map(|(key, row)| (key.clone(), row.id))
        .collect();
    stale.sort_by_key(|(_, id)| *id);
    stale.truncate(page_size as usize);

    for (key, _) in &stale {
        let Some(old) = rows.rows.remove(key) else {
            continue;
        };
        rows.unindex_row(key, &old);
        let row = recompute(bucket, old, version);
        rows.index_row(key, &row);
        rows.rows.insert(key.clone(), row);
    }
    stale.len() as u64
}

/// Recompute a row's index set under the current schema
///
/// Values a new type rejects index as null rather than aborting the
/// backfill; such rows simply never match typed filters on that field.
/// Revision metadata other than `rver` is untouched: a reindex is not a
/// caller-visible mutation.
fn recompute(bucket: &Bucket, old: StoredRow, version: u64) -> StoredRow {
    let mut indexed = rustc_hash::FxHashMap::default();
    for (field, def) in &bucket.index {
        let raw = old.value.get(field).unwrap_or(&serde_json::Value::Null);
        let value = IndexValue::validate(field, def.ty, raw).unwrap_or(IndexValue::Null);
        indexed.insert(field.clone(), value);
    }
    StoredRow {
        indexed,
        rver: version,
        ..old
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::filter::parse;
    use crate::planner::plan;
    use crate::schema::{BucketConfig, IndexDefConfig, IndexState, InvalidationBus};

    use super::super::query::{execute, FindOptions};
    use super::super::store::EtagCheck;
    use super::*;

    fn setup() -> (ObjectStore, BucketStore) {
        (
            ObjectStore::new(),
            BucketStore::new(Arc::new(InvalidationBus::new())),
        )
    }

    fn seed(objects: &ObjectStore, buckets: &BucketStore, n: u64) {
        let config = BucketConfig::default()
            .with_index("name", IndexDefConfig::new("string"))
            .with_version(1);
        let bucket = buckets.create("accounts", &config).unwrap();
        for i in 0..n {
            objects
                .put(
                    &bucket,
                    &format!("k{}", i),
                    json!({"name": format!("u{}", i), "age": i}),
                    &EtagCheck::Unconditional,
                )
                .unwrap();
        }
    }

    fn add_age_index(buckets: &BucketStore) {
        let config = BucketConfig::default()
            .with_index("name", IndexDefConfig::new("string"))
            .with_index("age", IndexDefConfig::new("number"))
            .with_version(2);
        buckets.update("accounts", &config).unwrap();
    }

    #[test]
    fn test_paged_backfill_to_exhaustion() {
        let (objects, buckets) = setup();
        seed(&objects, &buckets, 7);
        add_age_index(&buckets);
        assert_eq!(
            buckets.get("accounts").unwrap().index_state("age"),
            IndexState::Pending
        );

        let mut total = 0;
        loop {
            let r = reindex_page(&objects, &buckets, "accounts", 3).unwrap();
            if r.processed == 0 {
                break;
            }
            total += r.processed;
        }
        assert_eq!(total, 7);

        let bucket = buckets.get("accounts").unwrap();
        assert!(!bucket.has_pending_reindex());
        assert_eq!(bucket.index_state("age"), IndexState::Usable);
    }

    #[test]
    fn test_reindex_is_idempotent() {
        let (objects, buckets) = setup();
        seed(&objects, &buckets, 2);
        add_age_index(&buckets);

        while reindex_page(&objects, &buckets, "accounts", 10).unwrap().processed > 0 {}
        let after = reindex_page(&objects, &buckets, "accounts", 10).unwrap();
        assert_eq!(after.processed, 0);
    }

    #[test]
    fn test_concurrent_write_skipped() {
        let (objects, buckets) = setup();
        seed(&objects, &buckets, 3);
        add_age_index(&buckets);

        // a write under the new schema is already current
        let bucket = buckets.get("accounts").unwrap();
        objects
            .put(
                &bucket,
                "k0",
                json!({"name": "rewritten", "age": 99}),
                &EtagCheck::Unconditional,
            )
            .unwrap();

        let r = reindex_page(&objects, &buckets, "accounts", 10).unwrap();
        assert_eq!(r.processed, 2);
        assert_eq!(
            objects.get("accounts", "k0").unwrap().value["name"],
            "rewritten"
        );
    }

    #[test]
    fn test_backfilled_index_answers_queries() {
        let (objects, buckets) = setup();
        seed(&objects, &buckets, 5);
        add_age_index(&buckets);
        while reindex_page(&objects, &buckets, "accounts", 2).unwrap().processed > 0 {}

        let bucket = buckets.get("accounts").unwrap();
        let p = plan(&bucket, &parse("(age>=3)").unwrap(), true).unwrap();
        let recs = execute(&objects, &bucket, &p, &FindOptions::default(), 1000).unwrap();
        assert_eq!(recs.len(), 2);
    }

    #[test]
    fn test_reindex_does_not_touch_revision_metadata() {
        let (objects, buckets) = setup();
        seed(&objects, &buckets, 1);
        let before = objects.get("accounts", "k0").unwrap();
        add_age_index(&buckets);
        reindex_page(&objects, &buckets, "accounts", 10).unwrap();
        let after = objects.get("accounts", "k0").unwrap();
        assert_eq!(before.etag, after.etag);
        assert_eq!(before.txn_snap, after.txn_snap);
    }
}
