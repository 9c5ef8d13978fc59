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

//! Store-level configuration

use serde::{Deserialize, Serialize};

/// Configuration applied to every request unless overridden per call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Reject queries any leaf of which cannot be answered from a usable
    /// index; per-call options may override
    pub require_indexes: bool,

    /// Page cap applied to find results when a call sets neither `limit`
    /// nor `noLimit`
    pub default_page_limit: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            require_indexes: false,
            default_page_limit: 1000,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_require_indexes(mut self, require: bool) -> Self {
        self.require_indexes = require;
        self
    }

    pub fn with_default_page_limit(mut self, limit: u64) -> Self {
        self.default_page_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = EngineConfig::default();
        assert!(!c.require_indexes);
        assert_eq!(c.default_page_limit, 1000);
    }

    #[test]
    fn test_deserialize_partial() {
        let c: EngineConfig = serde_json::from_str(r#"{"requireIndexes": true}"#).unwrap();
        assert!(c.require_indexes);
        assert_eq!(c.default_page_limit, 1000);
    }
}
