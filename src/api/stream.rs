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

//! Record streams
//!
//! Find results are a finite, non-restartable sequence of records
//! terminated by either end-of-stream or a single error, never both. A
//! failed query yields a stream that produces only its error.

use std::collections::VecDeque;

use crate::core::{Error, ObjectRecord, Result};

/// A finite sequence of find results
#[derive(Debug)]
pub struct RecordStream {
    records: VecDeque<ObjectRecord>,
    err: Option<Error>,
}

impl RecordStream {
    pub(crate) fn from_records(records: Vec<ObjectRecord>) -> Self {
        Self {
            records: records.into(),
            err: None,
        }
    }

    pub(crate) fn from_error(err: Error) -> Self {
        Self {
            records: VecDeque::new(),
            err: Some(err),
        }
    }

    /// Drain the stream, failing on its error signal if one is pending
    pub fn try_collect(self) -> Result<Vec<ObjectRecord>> {
        let mut out = Vec::with_capacity(self.records.len());
        for item in self {
            out.push(item?);
        }
        Ok(out)
    }
}

impl Iterator for RecordStream {
    type Item = Result<ObjectRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(record) = self.records.pop_front() {
            return Some(Ok(record));
        }
        self.err.take().map(Err)
    }
}
