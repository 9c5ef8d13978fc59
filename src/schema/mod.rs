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

//! Bucket schemas: definitions, storage, caching, and pre/post triggers

pub mod bucket;
pub mod cache;
pub mod store;
pub mod trigger;

pub use bucket::{
    validate_bucket_name, validate_index_name, Bucket, BucketConfig, BucketOptions, IndexDef,
    IndexDefConfig, IndexState,
};
pub use cache::{BucketCache, Invalidation, InvalidationBus};
pub use store::BucketStore;
pub use trigger::{Trigger, TriggerContext, TriggerOp, TriggerRegistry};
