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

//! # Bucketdb - Schema-driven embedded document store
//!
//! Bucketdb stores JSON objects in named buckets, each bucket declaring a
//! set of typed, optionally unique indexed fields. Queries use an
//! LDAP-style filter language with type-aware comparison semantics (ip,
//! mac, subnet, date, uuid, and numeric/date ranges), planned against the
//! bucket's index usability and always re-checked row by row. Schema
//! changes over live data are handled by a paged, resumable reindex, and
//! all object mutation is optimistic-concurrency via etags.
//!
//! ## Key Features
//!
//! - **Typed Indexes** - string, number, boolean, date, ip, mac, subnet,
//!   uuid, numrange, daterange, and `[T]` array variants
//! - **LDAP-style Filters** - equality, presence, substrings, ordering,
//!   case-insensitive rules, and range operators `within`/`contains`/`overlaps`
//! - **Index-usability Planning** - queries are admitted, post-filtered,
//!   or refused based on each predicate's index state and `requireIndexes`
//! - **Live Reindexing** - paged backfill of newly added index fields with
//!   pending fields tracked per schema generation
//! - **Optimistic Concurrency** - etag compare-and-swap, insert-only puts,
//!   and unique-index enforcement with no partial writes
//! - **Atomic Batches** - heterogeneous put/delete/update/deleteMany lists
//!   applied all-or-nothing
//!
//! ## Quick Start
//!
//! ```rust
//! use bucketdb::{BucketConfig, Database, FindOptions, IndexDefConfig, PutOptions};
//! use serde_json::json;
//!
//! let db = Database::default();
//!
//! let config = BucketConfig::default()
//!     .with_index("email", IndexDefConfig::unique("string"))
//!     .with_index("age", IndexDefConfig::new("number"))
//!     .with_version(1);
//! db.create_bucket("accounts", &config).unwrap();
//!
//! db.put_object("accounts", "bob", json!({"email": "bob@example.com", "age": 30}),
//!     &PutOptions::default()).unwrap();
//!
//! let found = db
//!     .find_objects("accounts", "(&(age>=21)(email=*@example.com))", &FindOptions::default())
//!     .try_collect()
//!     .unwrap();
//! assert_eq!(found.len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`api`] - Public operation surface ([`api::Database`])
//! - [`core`] - Canonical types, values, and errors
//! - [`filter`] - LDAP-style filter parser and AST
//! - [`schema`] - Bucket definitions, schema store, cache invalidation, triggers
//! - [`planner`] - Typed predicate compilation and index-usability planning
//! - [`engine`] - Row storage, field indexes, query execution, reindexing

pub mod api;
pub mod config;
pub mod core;
pub mod engine;
pub mod filter;
pub mod planner;
pub mod schema;

// Re-export main types for convenience
pub use crate::core::{
    Error, IndexType, IndexValue, MacAddr, ObjectRecord, RangeBound, Result, ScalarType, Subnet,
    TypedRange,
};

pub use api::{BatchRequest, BatchResult, BulkOptions, Database, DeleteOptions, PutOptions, RecordStream};

pub use config::EngineConfig;

pub use engine::{EtagCheck, FindOptions, ReindexResult, SortOption, SortOrder};

pub use filter::{parse as parse_filter, Filter};

pub use schema::{
    Bucket, BucketCache, BucketConfig, BucketOptions, IndexDefConfig, IndexState, Trigger,
    TriggerContext, TriggerOp,
};

pub use planner::{LeafClass, QueryPlan};
