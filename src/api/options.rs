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

//! Per-call options for object mutations

use crate::engine::EtagCheck;

/// Options for a single-object put
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Etag precondition: unconditional by default, insert-only, or
    /// compare-and-swap against a specific revision
    pub etag: EtagCheck,
}

impl PutOptions {
    /// Require the key not to exist yet
    pub fn if_absent() -> Self {
        Self {
            etag: EtagCheck::IfAbsent,
        }
    }

    /// Require the current revision to match
    pub fn if_match(etag: impl Into<String>) -> Self {
        Self {
            etag: EtagCheck::IfMatch(etag.into()),
        }
    }
}

/// Options for a single-object delete
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    pub etag: EtagCheck,
}

impl DeleteOptions {
    pub fn if_match(etag: impl Into<String>) -> Self {
        Self {
            etag: EtagCheck::IfMatch(etag.into()),
        }
    }
}

/// Options for the filtered bulk mutations
///
/// With `limit`, at most that many matching rows are touched per call, so
/// repeated calls drain a larger set safely.
#[derive(Debug, Clone, Default)]
pub struct BulkOptions {
    pub limit: Option<u64>,
}

impl BulkOptions {
    pub fn with_limit(limit: u64) -> Self {
        Self { limit: Some(limit) }
    }
}
