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

//! Index type tags for bucketdb
//!
//! Every indexed field declares one of these types. The scalar tag plus an
//! array flag covers the `[T]` variants (`[string]`, `[number]`, ...).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};

/// Scalar index type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Number,
    Boolean,
    Date,
    Ip,
    Mac,
    Subnet,
    Uuid,
    NumRange,
    DateRange,
}

impl ScalarType {
    /// Textual tag as it appears in bucket configurations
    pub fn tag(self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Number => "number",
            ScalarType::Boolean => "boolean",
            ScalarType::Date => "date",
            ScalarType::Ip => "ip",
            ScalarType::Mac => "mac",
            ScalarType::Subnet => "subnet",
            ScalarType::Uuid => "uuid",
            ScalarType::NumRange => "numrange",
            ScalarType::DateRange => "daterange",
        }
    }

    /// Whether this type stores an interval rather than a scalar
    pub fn is_range(self) -> bool {
        matches!(self, ScalarType::NumRange | ScalarType::DateRange)
    }

    /// Whether values of this type have a meaningful `<=`/`>=` ordering
    /// in filters
    pub fn is_orderable(self) -> bool {
        !matches!(self, ScalarType::Boolean) && !self.is_range()
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Full index type: a scalar tag, optionally array-wrapped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexType {
    pub scalar: ScalarType,
    pub array: bool,
}

impl IndexType {
    /// Create a scalar index type
    pub fn scalar(scalar: ScalarType) -> Self {
        Self {
            scalar,
            array: false,
        }
    }

    /// Create an array index type
    pub fn array(scalar: ScalarType) -> Self {
        Self {
            scalar,
            array: true,
        }
    }

    /// Parse a textual type tag (`"number"`, `"[ip]"`, ...)
    ///
    /// Unknown tags are an [`Error::InvalidBucketConfig`].
    pub fn parse(tag: &str) -> Result<Self> {
        let (inner, array) = match tag.strip_prefix('[') {
            Some(rest) => match rest.strip_suffix(']') {
                Some(inner) => (inner, true),
                None => return Err(Error::invalid_config(format!("invalid index type: {tag}"))),
            },
            None => (tag, false),
        };

        let scalar = match inner {
            "string" => ScalarType::String,
            "number" => ScalarType::Number,
            "boolean" => ScalarType::Boolean,
            "date" => ScalarType::Date,
            "ip" => ScalarType::Ip,
            "mac" => ScalarType::Mac,
            "subnet" => ScalarType::Subnet,
            "uuid" => ScalarType::Uuid,
            "numrange" => ScalarType::NumRange,
            "daterange" => ScalarType::DateRange,
            _ => return Err(Error::invalid_config(format!("invalid index type: {tag}"))),
        };

        Ok(Self { scalar, array })
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.array {
            write!(f, "[{}]", self.scalar)
        } else {
            f.write_str(self.scalar.tag())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalar_tags() {
        assert_eq!(
            IndexType::parse("string").unwrap(),
            IndexType::scalar(ScalarType::String)
        );
        assert_eq!(
            IndexType::parse("numrange").unwrap(),
            IndexType::scalar(ScalarType::NumRange)
        );
        assert_eq!(
            IndexType::parse("subnet").unwrap(),
            IndexType::scalar(ScalarType::Subnet)
        );
    }

    #[test]
    fn test_parse_array_tags() {
        let ty = IndexType::parse("[ip]").unwrap();
        assert_eq!(ty.scalar, ScalarType::Ip);
        assert!(ty.array);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(IndexType::parse("varchar").is_err());
        assert!(IndexType::parse("[").is_err());
        assert!(IndexType::parse("[number").is_err());
        assert!(IndexType::parse("").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for tag in [
            "string",
            "[string]",
            "number",
            "boolean",
            "date",
            "ip",
            "[mac]",
            "subnet",
            "uuid",
            "numrange",
            "daterange",
        ] {
            assert_eq!(IndexType::parse(tag).unwrap().to_string(), tag);
        }
    }

    #[test]
    fn test_orderable_and_range() {
        assert!(ScalarType::Number.is_orderable());
        assert!(ScalarType::Mac.is_orderable());
        assert!(!ScalarType::Boolean.is_orderable());
        assert!(!ScalarType::NumRange.is_orderable());
        assert!(ScalarType::DateRange.is_range());
        assert!(!ScalarType::Ip.is_range());
    }
}
