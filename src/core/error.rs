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

//! Error types for bucketdb
//!
//! This module defines every error kind surfaced by the engine. All errors
//! are terminal for the request that triggered them; nothing is retried
//! internally.

use thiserror::Error;

/// Result type alias for bucketdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bucketdb operations
///
/// Each variant maps to one stable programmatic error name (see
/// [`Error::name`]) so callers can dispatch on `{name, message, context}`
/// without string matching the message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // =========================================================================
    // Bucket errors
    // =========================================================================
    /// Bucket or index field name is reserved or malformed
    #[error("{0} is not a valid name")]
    InvalidBucketName(String),

    /// Bucket configuration shape violation
    #[error("invalid bucket configuration: {0}")]
    InvalidBucketConfig(String),

    /// A pre/post trigger name does not resolve to a registered trigger
    #[error("{0} is not a function")]
    NotFunction(String),

    /// Bucket version decreased on update
    #[error("{bucket} has a newer version ({current}) than the request ({requested})")]
    BucketVersion {
        bucket: String,
        current: u64,
        requested: u64,
    },

    /// Bucket not found
    #[error("{0} does not exist")]
    BucketNotFound(String),

    // =========================================================================
    // Object errors
    // =========================================================================
    /// Object not found in bucket
    #[error("{bucket}::{key} does not exist")]
    ObjectNotFound { bucket: String, key: String },

    /// Unique index constraint violation
    #[error("{bucket} already contains an object with \"{field}\" = {value}")]
    UniqueAttribute {
        bucket: String,
        field: String,
        value: String,
    },

    /// Optimistic concurrency (etag compare-and-swap) failure
    #[error("{bucket}::{key} has etag {actual}, expected {expected}")]
    EtagConflict {
        bucket: String,
        key: String,
        expected: String,
        actual: String,
    },

    // =========================================================================
    // Query errors
    // =========================================================================
    /// Malformed or unindexable filter
    #[error("{0}")]
    InvalidQuery(String),

    /// Single-field filter whose sole index is unusable
    #[error("{bucket} does not have an index usable for \"{field}\"")]
    NotIndexed { bucket: String, field: String },

    /// Value fails index type validation on write
    #[error("index({field}) is of type {ty}: {value} is invalid")]
    InvalidIndexType {
        field: String,
        ty: String,
        value: String,
    },

    /// Null write via partial update
    #[error("{0} cannot be set to null via update")]
    NotNullable(String),

    /// Update touches no fields
    #[error("no fields specified for update")]
    FieldUpdate,

    /// Query exceeded its deadline
    #[error("query timed out after {0}ms")]
    QueryTimeout(u64),

    // =========================================================================
    // API errors
    // =========================================================================
    /// Argument contract violation on an operation
    #[error("{method} expects \"{arg}\" (args[{index}]) to be {constraint}")]
    Invocation {
        method: String,
        arg: String,
        index: usize,
        constraint: String,
    },

    /// Operation exists on the surface but is not supported
    #[error("{0} is not supported")]
    OperationNotSupported(String),

    // =========================================================================
    // Internal errors
    // =========================================================================
    /// Internal error for unexpected conditions
    #[error("{message}")]
    Internal { message: String },
}

impl Error {
    /// Create a new InvalidQuery error
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Error::InvalidQuery(message.into())
    }

    /// Create a new InvalidBucketConfig error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidBucketConfig(message.into())
    }

    /// Create a new Invocation error
    ///
    /// Message shape is fixed: `<method> expects "<arg>" (args[<n>]) to be
    /// <constraint>`.
    pub fn invocation(
        method: impl Into<String>,
        arg: impl Into<String>,
        index: usize,
        constraint: impl Into<String>,
    ) -> Self {
        Error::Invocation {
            method: method.into(),
            arg: arg.into(),
            index,
            constraint: constraint.into(),
        }
    }

    /// Create a new EtagConflict error
    pub fn etag_conflict(
        bucket: impl Into<String>,
        key: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Error::EtagConflict {
            bucket: bucket.into(),
            key: key.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a new InvalidIndexType error
    pub fn invalid_index_type(
        field: impl Into<String>,
        ty: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Error::InvalidIndexType {
            field: field.into(),
            ty: ty.into(),
            value: value.into(),
        }
    }

    /// Create a new Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Stable programmatic error name
    pub fn name(&self) -> &'static str {
        match self {
            Error::InvalidBucketName(_) => "InvalidBucketNameError",
            Error::InvalidBucketConfig(_) => "InvalidBucketConfigError",
            Error::NotFunction(_) => "NotFunctionError",
            Error::BucketVersion { .. } => "BucketVersionError",
            Error::BucketNotFound(_) => "BucketNotFoundError",
            Error::ObjectNotFound { .. } => "ObjectNotFoundError",
            Error::UniqueAttribute { .. } => "UniqueAttributeError",
            Error::EtagConflict { .. } => "EtagConflictError",
            Error::InvalidQuery(_) => "InvalidQueryError",
            Error::NotIndexed { .. } => "NotIndexedError",
            Error::InvalidIndexType { .. } => "InvalidIndexTypeError",
            Error::NotNullable(_) => "NotNullableError",
            Error::FieldUpdate => "FieldUpdateError",
            Error::QueryTimeout(_) => "QueryTimeoutError",
            Error::Invocation { .. } => "InvocationError",
            Error::OperationNotSupported(_) => "OperationNotSupportedError",
            Error::Internal { .. } => "InternalError",
        }
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::BucketNotFound(_) | Error::ObjectNotFound { .. })
    }

    /// Check if this is a constraint violation error
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::UniqueAttribute { .. } | Error::EtagConflict { .. } | Error::NotNullable(_)
        )
    }

    /// Check if this is a request validation error (bad name, config,
    /// filter, or argument) as opposed to a data conflict
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            Error::InvalidBucketName(_)
                | Error::InvalidBucketConfig(_)
                | Error::NotFunction(_)
                | Error::InvalidQuery(_)
                | Error::InvalidIndexType { .. }
                | Error::Invocation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::BucketNotFound("accounts".to_string()).to_string(),
            "accounts does not exist"
        );
        assert_eq!(
            Error::ObjectNotFound {
                bucket: "accounts".to_string(),
                key: "k1".to_string()
            }
            .to_string(),
            "accounts::k1 does not exist"
        );
        assert_eq!(
            Error::NotNullable("email".to_string()).to_string(),
            "email cannot be set to null via update"
        );
        assert_eq!(
            Error::FieldUpdate.to_string(),
            "no fields specified for update"
        );
    }

    #[test]
    fn test_invocation_message_shape() {
        let err = Error::invocation("reindexObjects", "count", 1, "a positive integer");
        assert_eq!(
            err.to_string(),
            "reindexObjects expects \"count\" (args[1]) to be a positive integer"
        );
    }

    #[test]
    fn test_etag_conflict_context() {
        let err = Error::etag_conflict("b", "k", "aaaa", "bbbb");
        assert_eq!(err.name(), "EtagConflictError");
        assert_eq!(err.to_string(), "b::k has etag bbbb, expected aaaa");
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::BucketNotFound("b".to_string()).is_not_found());
        assert!(!Error::FieldUpdate.is_not_found());
        assert!(Error::invalid_query("bad").is_invalid_request());
        assert!(Error::invocation("m", "a", 0, "c").is_invalid_request());
        assert!(!Error::QueryTimeout(100).is_invalid_request());
    }

    #[test]
    fn test_error_names_are_stable() {
        assert_eq!(Error::invalid_query("x").name(), "InvalidQueryError");
        assert_eq!(Error::QueryTimeout(5).name(), "QueryTimeoutError");
        assert_eq!(
            Error::NotIndexed {
                bucket: "b".to_string(),
                field: "f".to_string()
            }
            .name(),
            "NotIndexedError"
        );
    }
}
