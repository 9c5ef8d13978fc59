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

//! Canonical index values for bucketdb
//!
//! This is the type registry: per-type validation of raw JSON values at
//! write time, lenient-but-typed parsing of filter literals at query time,
//! and one total comparison order used by field indexes and sorting.
//!
//! `string` and `number` deliberately accept more raw shapes than the other
//! types (legacy-producer compatibility); the permissive mode is bounded to
//! exactly those two types and must not be extended.

use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use uuid::Uuid;

use super::error::{Error, Result};
use super::inet::{ip_order_key, parse_ip, MacAddr, Subnet};
use super::range::TypedRange;
use super::types::{IndexType, ScalarType};

/// Interval over numbers
pub type NumRange = TypedRange<f64>;
/// Interval over dates
pub type DateRange = TypedRange<DateTime<Utc>>;

/// A validated, canonical value for one indexed field
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    /// Stored null; matches no equality/presence filter
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Ip(IpAddr),
    Mac(MacAddr),
    Subnet(Subnet),
    Uuid(Uuid),
    NumRange(NumRange),
    DateRange(DateRange),
    /// Element values of an array-typed field
    Array(Vec<IndexValue>),
}

impl IndexValue {
    /// Validate a raw JSON value against an index type, producing the
    /// canonical value stored in the field index
    ///
    /// Null is storable for every type. Failures are
    /// [`Error::InvalidIndexType`].
    pub fn validate(field: &str, ty: IndexType, raw: &serde_json::Value) -> Result<Self> {
        if raw.is_null() {
            return Ok(IndexValue::Null);
        }
        if ty.array {
            let items = raw.as_array().ok_or_else(|| invalid(field, ty, raw))?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if item.is_null() {
                    return Err(invalid(field, ty, raw));
                }
                out.push(Self::validate_scalar(ty.scalar, item).ok_or_else(|| invalid(field, ty, raw))?);
            }
            return Ok(IndexValue::Array(out));
        }
        Self::validate_scalar(ty.scalar, raw).ok_or_else(|| invalid(field, ty, raw))
    }

    fn validate_scalar(scalar: ScalarType, raw: &serde_json::Value) -> Option<Self> {
        match scalar {
            // Permissive: legacy producers wrote numbers and booleans into
            // string indexes. Objects and arrays stay rejected.
            ScalarType::String => match raw {
                serde_json::Value::String(s) => Some(IndexValue::String(s.clone())),
                serde_json::Value::Number(n) => Some(IndexValue::String(n.to_string())),
                serde_json::Value::Bool(b) => Some(IndexValue::String(b.to_string())),
                _ => None,
            },
            // Numbers, or strings that parse fully as decimal literals.
            ScalarType::Number => match raw {
                serde_json::Value::Number(n) => {
                    let v = n.as_f64()?;
                    v.is_finite().then_some(IndexValue::Number(v))
                }
                serde_json::Value::String(s) => {
                    let v = s.trim().parse::<f64>().ok()?;
                    v.is_finite().then_some(IndexValue::Number(v))
                }
                _ => None,
            },
            ScalarType::Boolean => match raw {
                serde_json::Value::Bool(b) => Some(IndexValue::Boolean(*b)),
                serde_json::Value::String(s) if s == "true" => Some(IndexValue::Boolean(true)),
                serde_json::Value::String(s) if s == "false" => Some(IndexValue::Boolean(false)),
                _ => None,
            },
            ScalarType::Date => parse_date(raw.as_str()?).map(IndexValue::Date),
            ScalarType::Ip => parse_ip(raw.as_str()?).map(IndexValue::Ip),
            ScalarType::Mac => MacAddr::parse(raw.as_str()?).map(IndexValue::Mac),
            ScalarType::Subnet => Subnet::parse(raw.as_str()?).map(IndexValue::Subnet),
            ScalarType::Uuid => parse_uuid(raw.as_str()?).map(IndexValue::Uuid),
            ScalarType::NumRange => {
                TypedRange::parse(raw.as_str()?, parse_strict_f64).map(IndexValue::NumRange)
            }
            ScalarType::DateRange => {
                TypedRange::parse(raw.as_str()?, parse_date).map(IndexValue::DateRange)
            }
        }
    }

    /// Parse a textual filter literal as a value of the given type
    ///
    /// Array types parse their element type: a literal matches an array
    /// field when any element matches. Number literals parse leniently with
    /// trailing garbage ignored, preserving legacy query strings; every
    /// other type parses strictly. Failures are [`Error::InvalidQuery`].
    pub fn parse_filter_literal(ty: IndexType, text: &str) -> Result<Self> {
        let scalar = ty.scalar;
        let parsed = match scalar {
            ScalarType::String => Some(IndexValue::String(text.to_string())),
            ScalarType::Number => lenient_f64(text).map(IndexValue::Number),
            ScalarType::Boolean => match text {
                "true" => Some(IndexValue::Boolean(true)),
                "false" => Some(IndexValue::Boolean(false)),
                _ => None,
            },
            ScalarType::Date => parse_date(text).map(IndexValue::Date),
            ScalarType::Ip => parse_ip(text).map(IndexValue::Ip),
            ScalarType::Mac => MacAddr::parse(text).map(IndexValue::Mac),
            ScalarType::Subnet => Subnet::parse(text).map(IndexValue::Subnet),
            ScalarType::Uuid => parse_uuid(text).map(IndexValue::Uuid),
            ScalarType::NumRange => {
                TypedRange::parse(text, parse_strict_f64).map(IndexValue::NumRange)
            }
            ScalarType::DateRange => TypedRange::parse(text, parse_date).map(IndexValue::DateRange),
        };
        parsed.ok_or_else(|| {
            Error::invalid_query(format!("invalid {scalar} filter value: {text}"))
        })
    }

    /// Returns true if this value is stored null
    pub fn is_null(&self) -> bool {
        matches!(self, IndexValue::Null)
    }

    /// Total comparison order
    ///
    /// Same-variant values compare by their natural per-type order
    /// (byte-wise strings, `total_cmp` numbers, 128-bit normalized ips);
    /// different variants order by a fixed rank so multi-type
    /// sorting stays total. Arrays compare lexicographically by element.
    pub fn compare(&self, other: &IndexValue) -> Ordering {
        use IndexValue::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Boolean(a), Boolean(b)) => a.cmp(b),
            (Number(a), Number(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Date(a), Date(b)) => a.cmp(b),
            (Ip(a), Ip(b)) => ip_order_key(*a).cmp(&ip_order_key(*b)),
            (Mac(a), Mac(b)) => a.cmp(b),
            (Subnet(a), Subnet(b)) => a.cmp(b),
            (Uuid(a), Uuid(b)) => a.cmp(b),
            (NumRange(a), NumRange(b)) => a.cmp_with(b, |x, y| x.total_cmp(y)),
            (DateRange(a), DateRange(b)) => a.cmp_with(b, std::cmp::Ord::cmp),
            (Array(a), Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y) {
                        Ordering::Equal => {}
                        ord => return ord,
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }

    fn variant_rank(&self) -> u8 {
        match self {
            IndexValue::Null => 0,
            IndexValue::Boolean(_) => 1,
            IndexValue::Number(_) => 2,
            IndexValue::String(_) => 3,
            IndexValue::Date(_) => 4,
            IndexValue::Ip(_) => 5,
            IndexValue::Mac(_) => 6,
            IndexValue::Subnet(_) => 7,
            IndexValue::Uuid(_) => 8,
            IndexValue::NumRange(_) => 9,
            IndexValue::DateRange(_) => 10,
            IndexValue::Array(_) => 11,
        }
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Null => f.write_str("null"),
            IndexValue::Boolean(v) => write!(f, "{v}"),
            IndexValue::Number(v) => write!(f, "{v}"),
            IndexValue::String(v) => f.write_str(v),
            IndexValue::Date(v) => {
                write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
            }
            IndexValue::Ip(v) => write!(f, "{v}"),
            IndexValue::Mac(v) => write!(f, "{v}"),
            IndexValue::Subnet(v) => write!(f, "{v}"),
            IndexValue::Uuid(v) => write!(f, "{v}"),
            IndexValue::NumRange(v) => write!(f, "{v}"),
            IndexValue::DateRange(v) => {
                // bounds render in the canonical date form
                match &v.lo {
                    super::range::RangeBound::Inclusive(d) => {
                        write!(f, "[{},", d.format("%Y-%m-%dT%H:%M:%S%.3fZ"))?
                    }
                    super::range::RangeBound::Exclusive(d) => {
                        write!(f, "({},", d.format("%Y-%m-%dT%H:%M:%S%.3fZ"))?
                    }
                    super::range::RangeBound::Unbounded => write!(f, "(,")?,
                }
                match &v.hi {
                    super::range::RangeBound::Inclusive(d) => {
                        write!(f, "{}]", d.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
                    }
                    super::range::RangeBound::Exclusive(d) => {
                        write!(f, "{})", d.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
                    }
                    super::range::RangeBound::Unbounded => write!(f, ")"),
                }
            }
            IndexValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

fn invalid(field: &str, ty: IndexType, raw: &serde_json::Value) -> Error {
    Error::invalid_index_type(field, ty.to_string(), raw.to_string())
}

/// Parse an ISO-8601 date with explicit Z/offset, truncated to milliseconds
///
/// Epoch integers, bare dates, and offset-less timestamps are rejected.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(text).ok()?;
    let utc = parsed.with_timezone(&Utc);
    utc.duration_trunc(TimeDelta::milliseconds(1)).ok()
}

/// Parse a uuid in canonical 8-4-4-4-12 hyphenated form only
pub fn parse_uuid(text: &str) -> Option<Uuid> {
    let bytes = text.as_bytes();
    if bytes.len() != 36 {
        return None;
    }
    for (i, b) in bytes.iter().enumerate() {
        let is_dash_slot = matches!(i, 8 | 13 | 18 | 23);
        if is_dash_slot != (*b == b'-') {
            return None;
        }
        if !is_dash_slot && !b.is_ascii_hexdigit() {
            return None;
        }
    }
    Uuid::parse_str(text).ok()
}

/// Strict decimal literal parse (used for write validation and range bounds)
fn parse_strict_f64(text: &str) -> Option<f64> {
    let v = text.parse::<f64>().ok()?;
    v.is_finite().then_some(v)
}

/// Lenient number parse: longest numeric prefix wins, trailing garbage is
/// ignored (`"42abc"` parses as 42); a string with no numeric prefix fails
fn lenient_f64(text: &str) -> Option<f64> {
    let text = text.trim();
    for end in (1..=text.len()).rev() {
        if !text.is_char_boundary(end) {
            continue;
        }
        if let Some(v) = parse_strict_f64(&text[..end]) {
            return Some(v);
        }
    }
    None
}
