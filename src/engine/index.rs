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

//! Ordered per-field indexes over canonical values
//!
//! Each indexed field keeps a sorted map from canonical value to the set of
//! keys storing it. Array fields index every element; nulls are not
//! indexed, which is what makes `(attr=*)` equivalent to "is not null".

use std::collections::BTreeMap;
use std::ops::Bound;

use rustc_hash::FxHashSet;

use crate::core::IndexValue;
use crate::planner::ScanBound;

/// A canonical value wrapped for use as an ordered map key
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey(pub IndexValue);

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.compare(&other.0)
    }
}

/// Sorted index over one field
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    entries: BTreeMap<SortKey, FxHashSet<String>>,
}

impl FieldIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a row's canonical value under its key
    pub fn insert(&mut self, value: &IndexValue, key: &str) {
        for v in index_entries(value) {
            self.entries
                .entry(SortKey(v.clone()))
                .or_default()
                .insert(key.to_string());
        }
    }

    /// Drop a row's entries; `value` must be the value it was inserted with
    pub fn remove(&mut self, value: &IndexValue, key: &str) {
        for v in index_entries(value) {
            let sk = SortKey(v.clone());
            if let Some(keys) = self.entries.get_mut(&sk) {
                keys.remove(key);
                if keys.is_empty() {
                    self.entries.remove(&sk);
                }
            }
        }
    }

    /// Keys whose value equals `value` exactly
    pub fn keys_eq(&self, value: &IndexValue) -> Vec<String> {
        self.entries
            .get(&SortKey(value.clone()))
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Keys whose value falls in the given bounds
    pub fn keys_range(&self, lo: Option<&ScanBound>, hi: Option<&ScanBound>) -> Vec<String> {
        let lo_bound = match lo {
            None => Bound::Unbounded,
            Some((v, true)) => Bound::Included(SortKey(v.clone())),
            Some((v, false)) => Bound::Excluded(SortKey(v.clone())),
        };
        let hi_bound = match hi {
            None => Bound::Unbounded,
            Some((v, true)) => Bound::Included(SortKey(v.clone())),
            Some((v, false)) => Bound::Excluded(SortKey(v.clone())),
        };
        let mut out = Vec::new();
        for (_, keys) in self.entries.range((lo_bound, hi_bound)) {
            out.extend(keys.iter().cloned());
        }
        out
    }

    /// The key, if any, already storing `value` other than `except`
    ///
    /// Drives unique-constraint enforcement; arrays conflict on any shared
    /// element.
    pub fn holder_of(&self, value: &IndexValue, except: &str) -> Option<String> {
        for v in index_entries(value) {
            if let Some(keys) = self.entries.get(&SortKey(v.clone())) {
                if let Some(k) = keys.iter().find(|k| k.as_str() != except) {
                    return Some(k.clone());
                }
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The scalar entries a value contributes to the index
fn index_entries(value: &IndexValue) -> Vec<&IndexValue> {
    match value {
        IndexValue::Null => vec![],
        IndexValue::Array(items) => items.iter().filter(|v| !v.is_null()).collect(),
        v => vec![v],
    }
}
