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

//! Query execution
//!
//! The plan's narrowing picks candidate rows from the indexes; every
//! candidate is then re-evaluated against the full predicate from its raw
//! value, so the indexes only ever bound the work, never decide membership.
//! Matches are sorted (stable, multi-key, `_id` ascending as the final
//! tiebreak), counted before paging, then windowed by offset/limit.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;

use crate::core::{Error, ObjectRecord, Result};
use crate::planner::{sort_value, Narrowing, QueryPlan, RowView};
use crate::schema::Bucket;

use super::store::{BucketRows, ObjectStore, StoredRow};

/// Sort direction for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One key of a multi-key sort
#[derive(Debug, Clone)]
pub struct SortOption {
    pub attribute: String,
    pub order: SortOrder,
}

impl SortOption {
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Options accepted by find (and the filtered bulk mutations)
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Vec<SortOption>,
    pub limit: Option<u64>,
    pub offset: u64,

    /// Disable the default page cap entirely
    pub no_limit: bool,

    /// Per-call override of the store-level requireIndexes policy
    pub require_indexes: Option<bool>,

    /// Abort the scan after this many milliseconds
    pub timeout_ms: Option<u64>,
}

impl FindOptions {
    pub fn with_sort(mut self, sort: SortOption) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

/// Run a plan to completion, returning the paged, sorted matches
///
/// Every returned record carries `_count`, the total match count before
/// offset/limit.
pub fn execute(
    store: &ObjectStore,
    bucket: &Bucket,
    plan: &QueryPlan,
    opts: &FindOptions,
    default_limit: u64,
) -> Result<Vec<ObjectRecord>> {
    let deadline = opts
        .timeout_ms
        .map(|ms| (Instant::now() + Duration::from_millis(ms), ms));

    let buckets = store.buckets.read();
    let Some(rows) = buckets.get(&bucket.name) else {
        return Ok(Vec::new());
    };

    let mut matched: Vec<(&String, &StoredRow)> = Vec::new();
    for key in candidate_keys(rows, &plan.narrowing) {
        if let Some((at, ms)) = deadline {
            if Instant::now() >= at {
                return Err(Error::QueryTimeout(ms));
            }
        }
        let Some((key, row)) = rows.rows.get_key_value(&key) else {
            continue;
        };
        let view = RowView {
            value: &row.value,
            id: row.id,
            key: key.as_str(),
            etag: &row.etag,
            mtime: row.mtime,
            txn_snap: row.txn_snap,
        };
        if plan.pred.matches(&view) {
            matched.push((key, row));
        }
    }

    sort_matches(bucket, &mut matched, &opts.sort);

    let total = matched.len() as u64;
    let limit = if opts.no_limit {
        u64::MAX
    } else {
        opts.limit.unwrap_or(default_limit)
    };

    Ok(matched
        .into_iter()
        .skip(opts.offset as usize)
        .take(limit as usize)
        .map(|(key, row)| ObjectRecord {
            bucket: bucket.name.clone(),
            key: key.clone(),
            value: row.value.clone(),
            id: row.id,
            etag: row.etag.clone(),
            mtime: row.mtime,
            txn_snap: row.txn_snap,
            count: total,
        })
        .collect())
}

/// Resolve a narrowing to candidate keys, deduplicated
fn candidate_keys(rows: &BucketRows, narrowing: &Narrowing) -> Vec<String> {
    match narrowing {
        Narrowing::Key(key) => {
            if rows.rows.contains_key(key) {
                vec![key.clone()]
            } else {
                Vec::new()
            }
        }
        Narrowing::Eq { field, value } => rows
            .indexes
            .get(field)
            .map(|idx| idx.keys_eq(value))
            .unwrap_or_default(),
        Narrowing::Scan { field, lo, hi } => rows
            .indexes
            .get(field)
            .map(|idx| idx.keys_range(lo.as_ref(), hi.as_ref()))
            .unwrap_or_default(),
        Narrowing::Union(branches) => {
            let mut seen = FxHashSet::default();
            let mut out = Vec::new();
            for branch in branches {
                for key in candidate_keys(rows, branch) {
                    if seen.insert(key.clone()) {
                        out.push(key);
                    }
                }
            }
            out
        }
        Narrowing::FullScan => rows.rows.keys().cloned().collect(),
    }
}

fn sort_matches(bucket: &Bucket, matched: &mut [(&String, &StoredRow)], sort: &[SortOption]) {
    matched.sort_by(|(ak, a), (bk, b)| {
        let a_view = RowView {
            value: &a.value,
            id: a.id,
            key: ak.as_str(),
            etag: &a.etag,
            mtime: a.mtime,
            txn_snap: a.txn_snap,
        };
        let b_view = RowView {
            value: &b.value,
            id: b.id,
            key: bk.as_str(),
            etag: &b.etag,
            mtime: b.mtime,
            txn_snap: b.txn_snap,
        };
        for opt in sort {
            let av = sort_value(bucket, &a_view, &opt.attribute);
            let bv = sort_value(bucket, &b_view, &opt.attribute);
            let ord = match opt.order {
                SortOrder::Asc => av.compare(&bv),
                SortOrder::Desc => bv.compare(&av),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.id.cmp(&b.id)
    });
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use serde_json::json;

    use crate::core::IndexType;
    use crate::filter::parse;
    use crate::planner::plan;
    use crate::schema::{BucketOptions, IndexDef};

    use super::super::store::EtagCheck;
    use super::*;

    fn bucket() -> Bucket {
        let mut index = BTreeMap::new();
        for (field, tag) in [("sort_by_one", "number"), ("sort_by_two", "number"), ("name", "string")] {
            index.insert(
                field.to_string(),
                IndexDef {
                    ty: IndexType::parse(tag).unwrap(),
                    unique: false,
                    added_version: 1,
                },
            );
        }
        Bucket {
            name: "t".to_string(),
            index,
            pre: vec![],
            post: vec![],
            options: BucketOptions {
                version: 1,
                ..Default::default()
            },
            reindex_active: BTreeMap::new(),
            mtime: Utc::now(),
        }
    }

    fn seeded() -> (ObjectStore, Bucket) {
        let store = ObjectStore::new();
        let b = bucket();
        for (key, one, two) in [("r1", 1, 2), ("r2", 2, 2), ("r3", 3, 3)] {
            store
                .put(
                    &b,
                    key,
                    json!({"sort_by_one": one, "sort_by_two": two, "name": key}),
                    &EtagCheck::Unconditional,
                )
                .unwrap();
        }
        (store, b)
    }

    fn find(store: &ObjectStore, b: &Bucket, filter: &str, opts: &FindOptions) -> Vec<ObjectRecord> {
        let p = plan(b, &parse(filter).unwrap(), false).unwrap();
        execute(store, b, &p, opts, 1000).unwrap()
    }

    #[test]
    fn test_find_with_count() {
        let (store, b) = seeded();
        let recs = find(&store, &b, "(sort_by_two=2)", &FindOptions::default());
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.count == 2));
    }

    #[test]
    fn test_multi_key_sort() {
        let (store, b) = seeded();
        let opts = FindOptions::default()
            .with_sort(SortOption::asc("sort_by_two"))
            .with_sort(SortOption::asc("sort_by_one"));
        let recs = find(&store, &b, "(sort_by_one>=1)", &opts);
        let keys: Vec<_> = recs.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["r1", "r2", "r3"]);

        let opts = FindOptions::default()
            .with_sort(SortOption::desc("sort_by_two"))
            .with_sort(SortOption::asc("sort_by_one"));
        let recs = find(&store, &b, "(sort_by_one>=1)", &opts);
        let keys: Vec<_> = recs.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["r3", "r1", "r2"]);
    }

    #[test]
    fn test_offset_and_limit_leave_count_total() {
        let (store, b) = seeded();
        let opts = FindOptions::default()
            .with_sort(SortOption::asc("sort_by_one"))
            .with_limit(1)
            .with_offset(1);
        let recs = find(&store, &b, "(sort_by_one>=1)", &opts);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].key, "r2");
        assert_eq!(recs[0].count, 3);
    }

    #[test]
    fn test_default_tiebreak_is_id_order() {
        let (store, b) = seeded();
        let recs = find(&store, &b, "(sort_by_one>=1)", &FindOptions::default());
        let ids: Vec<_> = recs.iter().map(|r| r.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_missing_bucket_rows_is_empty() {
        let store = ObjectStore::new();
        let b = bucket();
        let recs = find(&store, &b, "(name=x)", &FindOptions::default());
        assert!(recs.is_empty());
    }

    #[test]
    fn test_index_narrowed_and_full_scan_agree() {
        let (store, b) = seeded();
        let by_index = find(&store, &b, "(name=r2)", &FindOptions::default());
        let by_scan = find(&store, &b, "(&(name=r2)(!(name=zz)))", &FindOptions::default());
        assert_eq!(by_index.len(), 1);
        assert_eq!(by_scan.len(), 1);
        assert_eq!(by_index[0].key, by_scan[0].key);
    }
}
