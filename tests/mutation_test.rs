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

//! Integration tests for object mutation: etag CAS, unique constraints,
//! bounded bulk update/delete, and batch atomicity

use bucketdb::{
    BatchRequest, BatchResult, BucketConfig, BulkOptions, Database, DeleteOptions, Error,
    FindOptions, IndexDefConfig, PutOptions,
};
use serde_json::{json, Map, Value};

fn setup() -> Database {
    let db = Database::default();
    let config = BucketConfig::default()
        .with_index("email", IndexDefConfig::unique("string"))
        .with_index("team", IndexDefConfig::new("string"))
        .with_index("score", IndexDefConfig::new("number"))
        .with_version(1);
    db.create_bucket("accounts", &config).unwrap();
    db
}

fn fields(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_etag_cas_cycle() {
    let db = setup();
    let v1 = db
        .put_object("accounts", "bob", json!({"email": "bob@x"}), &PutOptions::default())
        .unwrap();

    // stale tag loses
    let err = db
        .put_object(
            "accounts",
            "bob",
            json!({"email": "bob@x"}),
            &PutOptions::if_match("stale"),
        )
        .unwrap_err();
    match &err {
        Error::EtagConflict { expected, actual, .. } => {
            assert_eq!(expected, "stale");
            assert_eq!(actual, &v1.etag);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // current tag wins and rotates
    let v2 = db
        .put_object(
            "accounts",
            "bob",
            json!({"email": "bob@x", "score": 1}),
            &PutOptions::if_match(v1.etag.clone()),
        )
        .unwrap();
    assert_ne!(v1.etag, v2.etag);
    assert!(v2.txn_snap > v1.txn_snap);

    // conditional delete
    let err = db
        .del_object("accounts", "bob", &DeleteOptions::if_match(&v1.etag))
        .unwrap_err();
    assert!(matches!(err, Error::EtagConflict { .. }));
    db.del_object("accounts", "bob", &DeleteOptions::if_match(&v2.etag))
        .unwrap();
}

#[test]
fn test_insert_only_put() {
    let db = setup();
    db.put_object("accounts", "bob", json!({}), &PutOptions::if_absent())
        .unwrap();
    let err = db
        .put_object("accounts", "bob", json!({}), &PutOptions::if_absent())
        .unwrap_err();
    assert!(matches!(err, Error::EtagConflict { .. }));
}

#[test]
fn test_unique_violation_and_release() {
    let db = setup();
    db.put_object("accounts", "a", json!({"email": "dup@x"}), &PutOptions::default())
        .unwrap();
    let err = db
        .put_object("accounts", "b", json!({"email": "dup@x"}), &PutOptions::default())
        .unwrap_err();
    assert_eq!(err.name(), "UniqueAttributeError");
    assert!(db.get_object("accounts", "b").unwrap_err().is_not_found());

    db.del_object("accounts", "a", &DeleteOptions::default()).unwrap();
    db.put_object("accounts", "b", json!({"email": "dup@x"}), &PutOptions::default())
        .unwrap();
}

#[test]
fn test_update_objects_field_rules() {
    let db = setup();
    db.put_object(
        "accounts",
        "a",
        json!({"email": "a@x", "team": "red", "score": 1}),
        &PutOptions::default(),
    )
    .unwrap();

    // empty assignment set
    let err = db
        .update_objects("accounts", &fields(&[]), "(team=red)", &BulkOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::FieldUpdate));

    // unindexed column
    let err = db
        .update_objects(
            "accounts",
            &fields(&[("nickname", json!("ace"))]),
            "(team=red)",
            &BulkOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::NotIndexed { .. }));

    // null assignment
    let err = db
        .update_objects(
            "accounts",
            &fields(&[("team", Value::Null)]),
            "(team=red)",
            &BulkOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::NotNullable(_)));

    // unique column
    let err = db
        .update_objects(
            "accounts",
            &fields(&[("email", json!("x@x"))]),
            "(team=red)",
            &BulkOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::UniqueAttribute { .. }));
}

#[test]
fn test_bounded_drain() {
    let db = setup();
    for i in 0..5 {
        db.put_object(
            "accounts",
            &format!("k{}", i),
            json!({"email": format!("u{}@x", i), "team": "red", "score": 0}),
            &PutOptions::default(),
        )
        .unwrap();
    }

    // update drains in bounded steps
    let mut touched = 0;
    loop {
        let n = db
            .update_objects(
                "accounts",
                &fields(&[("score", json!(1))]),
                "(score=0)",
                &BulkOptions::with_limit(2),
            )
            .unwrap();
        touched += n;
        if n == 0 {
            break;
        }
        assert!(n <= 2);
    }
    assert_eq!(touched, 5);

    // delete drains the same way
    let mut removed = 0;
    loop {
        let n = db
            .delete_many("accounts", "(team=red)", &BulkOptions::with_limit(2))
            .unwrap();
        removed += n;
        if n == 0 {
            break;
        }
    }
    assert_eq!(removed, 5);
    let left = db
        .find_objects("accounts", "(team=red)", &FindOptions::default())
        .try_collect()
        .unwrap();
    assert!(left.is_empty());
}

#[test]
fn test_update_objects_rotates_revision() {
    let db = setup();
    let before = db
        .put_object("accounts", "a", json!({"email": "a@x", "score": 1}), &PutOptions::default())
        .unwrap();
    let n = db
        .update_objects(
            "accounts",
            &fields(&[("score", json!(2))]),
            "(_key=a)",
            &BulkOptions::default(),
        )
        .unwrap();
    assert_eq!(n, 1);
    let after = db.get_object("accounts", "a").unwrap();
    assert_eq!(after.value["score"], 2);
    assert_eq!(after.value["email"], "a@x");
    assert_ne!(after.etag, before.etag);
    assert!(after.txn_snap > before.txn_snap);
}

#[test]
fn test_update_objects_tolerates_retyped_fields() {
    let db = Database::default();
    let v1 = BucketConfig::default()
        .with_index("team", IndexDefConfig::new("string"))
        .with_index("score", IndexDefConfig::new("string"))
        .with_version(1);
    db.create_bucket("league", &v1).unwrap();
    db.put_object(
        "league",
        "k",
        json!({"team": "red", "score": "high"}),
        &PutOptions::default(),
    )
    .unwrap();

    // score becomes number-typed; the stored string no longer validates
    let v2 = BucketConfig::default()
        .with_index("team", IndexDefConfig::new("string"))
        .with_index("score", IndexDefConfig::new("number"))
        .with_version(2);
    db.update_bucket("league", &v2).unwrap();

    let n = db
        .update_objects(
            "league",
            &fields(&[("team", json!("blue"))]),
            "(_key=k)",
            &BulkOptions::default(),
        )
        .unwrap();
    assert_eq!(n, 1);

    let rec = db.get_object("league", "k").unwrap();
    assert_eq!(rec.value["team"], "blue");
    assert_eq!(rec.value["score"], "high");
}

#[test]
fn test_batch_success() {
    let db = setup();
    db.put_object("accounts", "old", json!({"team": "blue"}), &PutOptions::default())
        .unwrap();

    let results = db
        .batch(&[
            BatchRequest::Put {
                bucket: "accounts".to_string(),
                key: "n1".to_string(),
                value: json!({"team": "red", "score": 1}),
                options: PutOptions::default(),
            },
            BatchRequest::Delete {
                bucket: "accounts".to_string(),
                key: "old".to_string(),
                options: DeleteOptions::default(),
            },
            BatchRequest::Update {
                bucket: "accounts".to_string(),
                fields: fields(&[("score", json!(5))]),
                filter: "(team=red)".to_string(),
                options: BulkOptions::default(),
            },
        ])
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(matches!(results[0], BatchResult::Put { .. }));
    assert_eq!(results[2], BatchResult::Update { count: 1 });
    assert!(db.get_object("accounts", "old").unwrap_err().is_not_found());
    assert_eq!(db.get_object("accounts", "n1").unwrap().value["score"], 5);
}

#[test]
fn test_batch_failure_rolls_back_everything() {
    let db = setup();
    db.put_object("accounts", "keep", json!({"email": "keep@x"}), &PutOptions::default())
        .unwrap();

    let err = db
        .batch(&[
            BatchRequest::Put {
                bucket: "accounts".to_string(),
                key: "n1".to_string(),
                value: json!({"team": "red"}),
                options: PutOptions::default(),
            },
            BatchRequest::DeleteMany {
                bucket: "accounts".to_string(),
                filter: "(email=keep@x)".to_string(),
                options: BulkOptions::default(),
            },
            // type violation aborts the batch
            BatchRequest::Put {
                bucket: "accounts".to_string(),
                key: "n2".to_string(),
                value: json!({"score": "not-a-number"}),
                options: PutOptions::default(),
            },
        ])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidIndexType { .. }));

    // earlier requests unwound: the put is gone, the deleted row is back
    assert!(db.get_object("accounts", "n1").unwrap_err().is_not_found());
    assert!(db.get_object("accounts", "keep").is_ok());
}
