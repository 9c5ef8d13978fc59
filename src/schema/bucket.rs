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

//! Bucket definitions and name validation
//!
//! A bucket names a collection of objects plus the index schema projected
//! out of their values. Bucket and index-field names are validated against
//! reserved-name and character rules before anything is stored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{Error, IndexType, Result};

/// Bucket names that can never be created or deleted
const RESERVED_BUCKETS: &[&str] = &["moray", "search", "buckets_config"];

/// System column names index fields must not collide with
/// (checked case-insensitively)
const SYSTEM_COLUMNS: &[&str] = &[
    "_id",
    "_etag",
    "_key",
    "_mtime",
    "_rver",
    "_txn_snap",
    "_value",
    "_vnode",
    "_atime",
    "_ctime",
];

/// Maximum bucket name length
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Validate a bucket name against the reserved-name and character rules
pub fn validate_bucket_name(name: &str) -> Result<()> {
    let bad = || Error::InvalidBucketName(name.to_string());

    if name.is_empty() || name.len() > MAX_BUCKET_NAME_LEN {
        return Err(bad());
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap_or('_');
    if !first.is_ascii_alphabetic() {
        return Err(bad());
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(bad());
    }
    if name.ends_with('_') {
        return Err(bad());
    }

    let lower = name.to_lowercase();
    if RESERVED_BUCKETS.contains(&lower.as_str()) || lower.starts_with("moray") {
        return Err(bad());
    }
    Ok(())
}

/// Validate an index field name
///
/// Field names must not shadow system columns, must not carry the `moray`
/// prefix, and allow at most a single leading underscore.
pub fn validate_index_name(field: &str) -> Result<()> {
    let bad = || Error::InvalidBucketName(field.to_string());

    if field.is_empty() {
        return Err(bad());
    }
    let mut chars = field.chars();
    let first = chars.next().unwrap_or('0');
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(bad());
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(bad());
    }
    if field.ends_with('_') || (field.len() > 1 && field.starts_with("__")) {
        return Err(bad());
    }

    let lower = field.to_lowercase();
    if lower.starts_with("moray") || SYSTEM_COLUMNS.contains(&lower.as_str()) {
        return Err(bad());
    }
    Ok(())
}

/// One index field as supplied in a bucket configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefConfig {
    /// Textual type tag (`"number"`, `"[ip]"`, ...)
    #[serde(rename = "type")]
    pub ty: String,

    /// Whether values must be unique across the bucket
    #[serde(default)]
    pub unique: bool,
}

impl IndexDefConfig {
    pub fn new(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            unique: false,
        }
    }

    pub fn unique(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            unique: true,
        }
    }
}

/// Bucket options as supplied in a configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketOptions {
    /// Schema version; may only increase or stay equal across updates
    #[serde(default)]
    pub version: u64,

    /// Whether find results must honor insertion order guarantees
    #[serde(default)]
    pub guarantee_order: bool,

    /// Rejected: mtime tracking is no longer supported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_modification: Option<bool>,
}

/// A bucket configuration as supplied to create/update
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Index field definitions
    #[serde(default)]
    pub index: BTreeMap<String, IndexDefConfig>,

    /// Names of pre-write triggers, resolved against the trigger registry
    #[serde(default)]
    pub pre: Vec<String>,

    /// Names of post-write triggers
    #[serde(default)]
    pub post: Vec<String>,

    #[serde(default)]
    pub options: BucketOptions,
}

impl BucketConfig {
    /// Add an index field (builder-style, used heavily in tests)
    pub fn with_index(mut self, field: impl Into<String>, def: IndexDefConfig) -> Self {
        self.index.insert(field.into(), def);
        self
    }

    /// Set the schema version
    pub fn with_version(mut self, version: u64) -> Self {
        self.options.version = version;
        self
    }

    /// Validate field names, type tags, and options
    ///
    /// Returns the parsed index map on success.
    pub fn validate(&self) -> Result<BTreeMap<String, (IndexType, bool)>> {
        if self.options.track_modification.is_some() {
            return Err(Error::invalid_config(
                "trackModification is no longer supported",
            ));
        }
        let mut parsed = BTreeMap::new();
        for (field, def) in &self.index {
            validate_index_name(field)?;
            let ty = IndexType::parse(&def.ty)?;
            parsed.insert(field.clone(), (ty, def.unique));
        }
        Ok(parsed)
    }
}

/// A validated index field in a stored bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub ty: IndexType,
    pub unique: bool,

    /// Schema version at which this field entered the index map; pending
    /// reindex while that generation is still in `reindex_active`
    pub added_version: u64,
}

/// Usability of one index field, as the planner sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// Fully indexed; safe for index-driven fetch
    Usable,
    /// Declared but still backfilling; row-level recheck only
    Pending,
    /// Not part of the schema
    Absent,
}

/// A stored bucket definition
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub name: String,
    pub index: BTreeMap<String, IndexDef>,
    pub pre: Vec<String>,
    pub post: Vec<String>,
    pub options: BucketOptions,

    /// In-flight reindex generations: version -> when the generation opened
    pub reindex_active: BTreeMap<u64, DateTime<Utc>>,

    pub mtime: DateTime<Utc>,
}

impl Bucket {
    /// Answer whether a field is fully indexed, pending reindex, or absent
    pub fn index_state(&self, field: &str) -> IndexState {
        match self.index.get(field) {
            None => IndexState::Absent,
            Some(def) => {
                if self.reindex_active.contains_key(&def.added_version) {
                    IndexState::Pending
                } else {
                    IndexState::Usable
                }
            }
        }
    }

    /// Fields currently awaiting reindex, in schema order
    pub fn pending_fields(&self) -> Vec<&str> {
        self.index
            .iter()
            .filter(|(_, def)| self.reindex_active.contains_key(&def.added_version))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// True when some generation is still backfilling
    pub fn has_pending_reindex(&self) -> bool {
        !self.reindex_active.is_empty()
    }
}
