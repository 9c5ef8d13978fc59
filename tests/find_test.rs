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

//! Integration tests for findObjects: typed matching, sorting, paging,
//! and the stream contract

use bucketdb::{
    BucketConfig, Database, Error, FindOptions, IndexDefConfig, ObjectRecord, PutOptions,
    SortOption,
};
use serde_json::json;

fn db_with_rows() -> Database {
    let db = Database::default();
    let config = BucketConfig::default()
        .with_index("sort_by_one", IndexDefConfig::new("number"))
        .with_index("sort_by_two", IndexDefConfig::new("number"))
        .with_index("addr", IndexDefConfig::new("ip"))
        .with_index("net", IndexDefConfig::new("subnet"))
        .with_index("span", IndexDefConfig::new("numrange"))
        .with_version(1);
    db.create_bucket("rows", &config).unwrap();

    for (key, one, two) in [("r1", 1, 2), ("r2", 2, 2), ("r3", 3, 3)] {
        db.put_object(
            "rows",
            key,
            json!({
                "sort_by_one": one,
                "sort_by_two": two,
                "addr": format!("10.1.3.{}", one),
                "net": "10.1.3.0/24",
                "span": format!("[{},{})", one, one + 10),
            }),
            &PutOptions::default(),
        )
        .unwrap();
    }
    db
}

fn find(db: &Database, filter: &str, opts: &FindOptions) -> Vec<ObjectRecord> {
    db.find_objects("rows", filter, opts)
        .try_collect()
        .unwrap_or_else(|e| panic!("find {:?}: {:?}", filter, e))
}

#[test]
fn test_multi_key_sort_fixture() {
    let db = db_with_rows();
    let opts = FindOptions::default()
        .with_sort(SortOption::asc("sort_by_two"))
        .with_sort(SortOption::asc("sort_by_one"));
    let keys: Vec<String> = find(&db, "(sort_by_one>=1)", &opts)
        .into_iter()
        .map(|r| r.key)
        .collect();
    assert_eq!(keys, vec!["r1", "r2", "r3"]);

    let opts = FindOptions::default()
        .with_sort(SortOption::desc("sort_by_two"))
        .with_sort(SortOption::asc("sort_by_one"));
    let keys: Vec<String> = find(&db, "(sort_by_one>=1)", &opts)
        .into_iter()
        .map(|r| r.key)
        .collect();
    assert_eq!(keys, vec!["r3", "r1", "r2"]);
}

#[test]
fn test_count_is_pre_limit_total() {
    let db = db_with_rows();
    let opts = FindOptions::default()
        .with_sort(SortOption::asc("sort_by_one"))
        .with_limit(2)
        .with_offset(1);
    let recs = find(&db, "(sort_by_one>=1)", &opts);
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].key, "r2");
    assert!(recs.iter().all(|r| r.count == 3));
}

#[test]
fn test_ip_and_subnet_semantics() {
    let db = db_with_rows();
    assert_eq!(find(&db, "(addr:within:=10.1.3.0/24)", &FindOptions::default()).len(), 3);
    assert_eq!(find(&db, "(addr:within:=10.1.4.0/24)", &FindOptions::default()).len(), 0);

    // the broadcast address is inside the /24, the next network is not
    assert_eq!(find(&db, "(net:contains:=10.1.3.255)", &FindOptions::default()).len(), 3);
    assert_eq!(find(&db, "(net:contains:=10.1.4.0)", &FindOptions::default()).len(), 0);
}

#[test]
fn test_numrange_membership() {
    let db = db_with_rows();
    // r1 stores [1,11), r2 [2,12), r3 [3,13)
    assert_eq!(find(&db, "(span:contains:=2)", &FindOptions::default()).len(), 2);
    assert_eq!(find(&db, "(span:contains:=12.5)", &FindOptions::default()).len(), 1);
    assert_eq!(find(&db, "(span:contains:=13)", &FindOptions::default()).len(), 0);
    assert_eq!(find(&db, "(span:overlaps:=[12,20])", &FindOptions::default()).len(), 1);
}

#[test]
fn test_default_page_cap() {
    let db = Database::default();
    let config = BucketConfig::default()
        .with_index("n", IndexDefConfig::new("number"))
        .with_version(1);
    db.create_bucket("big", &config).unwrap();
    for i in 0..1005u32 {
        db.put_object("big", &format!("k{:04}", i), json!({"n": i}), &PutOptions::default())
            .unwrap();
    }

    let capped = db
        .find_objects("big", "(n>=0)", &FindOptions::default())
        .try_collect()
        .unwrap();
    assert_eq!(capped.len(), 1000);
    assert!(capped.iter().all(|r| r.count == 1005));

    let uncapped = db
        .find_objects(
            "big",
            "(n>=0)",
            &FindOptions {
                no_limit: true,
                ..FindOptions::default()
            },
        )
        .try_collect()
        .unwrap();
    assert_eq!(uncapped.len(), 1005);
}

#[test]
fn test_bad_filter_surfaces_through_stream() {
    let db = db_with_rows();
    let err = db
        .find_objects("rows", "(sort_by_one>1)", &FindOptions::default())
        .try_collect()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidQuery(_)));

    let err = db
        .find_objects("nope", "(sort_by_one=1)", &FindOptions::default())
        .try_collect()
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_zero_timeout_fires() {
    let db = db_with_rows();
    let opts = FindOptions {
        timeout_ms: Some(0),
        ..FindOptions::default()
    };
    let err = db
        .find_objects("rows", "(sort_by_one>=1)", &opts)
        .try_collect()
        .unwrap_err();
    assert!(matches!(err, Error::QueryTimeout(0)));
}

#[test]
fn test_get_reflects_latest_put() {
    let db = db_with_rows();
    let rec = db.get_object("rows", "r2").unwrap();
    assert_eq!(rec.value["sort_by_two"], 2);
    assert_eq!(rec.count, 1);

    db.put_object(
        "rows",
        "r2",
        json!({"sort_by_one": 2, "sort_by_two": 9}),
        &PutOptions::default(),
    )
    .unwrap();
    let rec = db.get_object("rows", "r2").unwrap();
    assert_eq!(rec.value["sort_by_two"], 9);
}
