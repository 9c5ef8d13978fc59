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

//! Object records for bucketdb
//!
//! The materialized form of a stored object as delivered to callers:
//! bucket, key, the JSON value, and the system columns.

use serde::Serialize;

/// A stored object as returned by get/find operations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectRecord {
    /// Bucket the object lives in
    pub bucket: String,

    /// Object key (non-empty)
    pub key: String,

    /// The stored JSON value
    pub value: serde_json::Value,

    /// Monotonic row id, unique across the store
    #[serde(rename = "_id")]
    pub id: u64,

    /// Opaque revision token, regenerated on every successful mutation
    #[serde(rename = "_etag")]
    pub etag: String,

    /// Last-modified wall clock, epoch milliseconds
    #[serde(rename = "_mtime")]
    pub mtime: i64,

    /// Transaction snapshot marker, strictly increasing across successive
    /// mutations of the same key
    #[serde(rename = "_txn_snap")]
    pub txn_snap: u64,

    /// Total matches for the originating query, independent of limit/offset
    ///
    /// Present on find results; get operations report 1.
    #[serde(rename = "_count")]
    pub count: u64,
}

impl ObjectRecord {
    /// Look up a system column by name (`_id`, `_key`, `_etag`, `_mtime`,
    /// `_txn_snap`) as a JSON value, or None for regular fields
    pub fn system_column(&self, name: &str) -> Option<serde_json::Value> {
        match name {
            "_id" => Some(serde_json::json!(self.id)),
            "_key" => Some(serde_json::Value::String(self.key.clone())),
            "_etag" => Some(serde_json::Value::String(self.etag.clone())),
            "_mtime" => Some(serde_json::json!(self.mtime)),
            "_txn_snap" => Some(serde_json::json!(self.txn_snap)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ObjectRecord {
        ObjectRecord {
            bucket: "b".to_string(),
            key: "k".to_string(),
            value: serde_json::json!({"a": 1}),
            id: 7,
            etag: "cafebabe".to_string(),
            mtime: 1_700_000_000_000,
            txn_snap: 42,
            count: 1,
        }
    }

    #[test]
    fn test_system_columns() {
        let rec = record();
        assert_eq!(rec.system_column("_id"), Some(serde_json::json!(7)));
        assert_eq!(
            rec.system_column("_key"),
            Some(serde_json::json!("k"))
        );
        assert_eq!(rec.system_column("_txn_snap"), Some(serde_json::json!(42)));
        assert_eq!(rec.system_column("a"), None);
    }

    #[test]
    fn test_serializes_with_underscore_names() {
        let text = serde_json::to_string(&record()).unwrap();
        assert!(text.contains("\"_etag\""));
        assert!(text.contains("\"_txn_snap\""));
        assert!(text.contains("\"_count\""));
    }
}
