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

//! Integration tests for the reindex lifecycle: planner behavior while a
//! field is pending, paged backfill, and generation retirement

use bucketdb::{BucketConfig, Database, Error, FindOptions, IndexDefConfig, IndexState, PutOptions};
use serde_json::json;

fn v1_config() -> BucketConfig {
    BucketConfig::default()
        .with_index("name", IndexDefConfig::new("string"))
        .with_version(1)
}

fn v2_config() -> BucketConfig {
    BucketConfig::default()
        .with_index("name", IndexDefConfig::new("string"))
        .with_index("age", IndexDefConfig::new("number"))
        .with_version(2)
}

fn seed(db: &Database, n: u64) {
    db.create_bucket("accounts", &v1_config()).unwrap();
    for i in 0..n {
        db.put_object(
            "accounts",
            &format!("k{}", i),
            json!({"name": format!("u{}", i), "age": i}),
            &PutOptions::default(),
        )
        .unwrap();
    }
}

fn drain_reindex(db: &Database, page: u64) -> u64 {
    let mut total = 0;
    loop {
        let r = db.reindex_objects("accounts", page).unwrap();
        if r.processed == 0 {
            return total;
        }
        total += r.processed;
    }
}

#[test]
fn test_pending_field_query_behavior() {
    let db = Database::default();
    seed(&db, 4);
    db.update_bucket("accounts", &v2_config()).unwrap();

    // sole-field filter on the pending index
    let err = db
        .find_objects("accounts", "(age>=2)", &FindOptions::default())
        .try_collect()
        .unwrap_err();
    assert!(matches!(err, Error::NotIndexed { .. }));

    // mixed with a usable index it is answerable by post-filtering
    let recs = db
        .find_objects("accounts", "(&(name=*)(age>=2))", &FindOptions::default())
        .try_collect()
        .unwrap();
    assert_eq!(recs.len(), 2);

    // requireIndexes surfaces the fixed refusal
    let opts = FindOptions {
        require_indexes: Some(true),
        ..FindOptions::default()
    };
    let err = db
        .find_objects("accounts", "(&(name=*)(age>=2)(ghost=x))", &opts)
        .try_collect()
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "accounts does not have indexes that support (&(name=*)(age>=2)(ghost=x)). \
         Reindexing fields: [ age ]. Unindexed fields: [ ghost ]"
    );
}

#[test]
fn test_reindex_processes_every_preexisting_row() {
    let db = Database::default();
    seed(&db, 10);
    db.update_bucket("accounts", &v2_config()).unwrap();

    assert_eq!(drain_reindex(&db, 3), 10);

    let bucket = db.get_bucket("accounts").unwrap();
    assert_eq!(bucket.index_state("age"), IndexState::Usable);
    assert!(!bucket.has_pending_reindex());

    // the freshly usable index now answers sole-field queries
    let recs = db
        .find_objects("accounts", "(age>=5)", &FindOptions::default())
        .try_collect()
        .unwrap();
    assert_eq!(recs.len(), 5);
}

#[test]
fn test_rows_written_after_update_are_not_reprocessed() {
    let db = Database::default();
    seed(&db, 3);
    db.update_bucket("accounts", &v2_config()).unwrap();

    db.put_object(
        "accounts",
        "fresh",
        json!({"name": "fresh", "age": 50}),
        &PutOptions::default(),
    )
    .unwrap();

    // only the three v1 rows need backfill
    assert_eq!(drain_reindex(&db, 10), 3);
}

#[test]
fn test_reindex_count_must_be_positive() {
    let db = Database::default();
    seed(&db, 1);
    let err = db.reindex_objects("accounts", 0).unwrap_err();
    assert_eq!(
        err.to_string(),
        "reindexObjects expects \"count\" (args[1]) to be a positive integer"
    );
}

#[test]
fn test_reindex_without_pending_generation_is_noop() {
    let db = Database::default();
    seed(&db, 3);
    let r = db.reindex_objects("accounts", 10).unwrap();
    assert_eq!(r.processed, 0);
}

#[test]
fn test_retype_requires_fresh_backfill() {
    let db = Database::default();
    seed(&db, 2);
    // re-type name from string to number
    let config = BucketConfig::default()
        .with_index("name", IndexDefConfig::new("number"))
        .with_version(2);
    db.update_bucket("accounts", &config).unwrap();
    assert_eq!(
        db.get_bucket("accounts").unwrap().index_state("name"),
        IndexState::Pending
    );
    assert_eq!(drain_reindex(&db, 10), 2);

    // legacy non-numeric values index as null and match nothing
    let recs = db
        .find_objects("accounts", "(&(_id>=0)(name=*))", &FindOptions::default())
        .try_collect()
        .unwrap();
    assert_eq!(recs.len(), 2);
    let recs = db
        .find_objects("accounts", "(name>=0)", &FindOptions::default())
        .try_collect()
        .unwrap();
    assert!(recs.is_empty());
}
