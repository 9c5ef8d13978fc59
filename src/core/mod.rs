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

//! Core types for bucketdb
//!
//! The leaf layer everything else builds on: the error taxonomy, index type
//! tags, the type registry (canonical values, comparison, filter-literal
//! parsing), network scalars, range values, and object records.

pub mod error;
pub mod inet;
pub mod range;
pub mod record;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use inet::{ip_order_key, parse_ip, MacAddr, Subnet};
pub use range::{RangeBound, TypedRange};
pub use record::ObjectRecord;
pub use types::{IndexType, ScalarType};
pub use value::{parse_date, parse_uuid, DateRange, IndexValue, NumRange};
