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

//! Storage engine: rows, field indexes, query execution, and reindexing

pub mod index;
pub mod query;
pub mod reindex;
pub mod store;

pub use index::{FieldIndex, SortKey};
pub use query::{execute, FindOptions, SortOption, SortOrder};
pub use reindex::{reindex_page, ReindexResult};
pub use store::{BucketRows, EtagCheck, ObjectStore, StoredRow, UndoLog};
