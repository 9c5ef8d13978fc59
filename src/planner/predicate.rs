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

//! Typed predicate compilation and row-level evaluation
//!
//! A parsed filter carries raw value text; before execution each leaf is
//! resolved against the bucket schema and its literal parsed into the
//! field's canonical type. Evaluation always recomputes field values from
//! the row's raw JSON, never from cached index entries, so a stale or
//! half-built index can narrow candidates but never produce a false
//! positive.

use std::cmp::Ordering;

use crate::core::{Error, IndexType, IndexValue, Result, ScalarType, Subnet};
use crate::filter::{CompareOp, Filter, RangeOp, SubstringParts};
use crate::schema::Bucket;

/// How a leaf attribute resolves against the schema
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTy {
    /// Indexed field (or internal system column) with a known type
    Typed(IndexType),
    /// Attribute absent from the schema; evaluated loosely against raw JSON
    Untyped,
}

/// Resolve an attribute's type: internal system columns are always typed,
/// schema fields use their declared index type, everything else is untyped
pub fn resolve_ty(bucket: &Bucket, attr: &str) -> ResolvedTy {
    match attr {
        "_id" | "_mtime" | "_txn_snap" => ResolvedTy::Typed(IndexType::scalar(ScalarType::Number)),
        "_key" | "_etag" => ResolvedTy::Typed(IndexType::scalar(ScalarType::String)),
        _ => match bucket.index.get(attr) {
            Some(def) => ResolvedTy::Typed(def.ty),
            None => ResolvedTy::Untyped,
        },
    }
}

/// The boundary literal of a range-operator leaf, parsed per the field type
#[derive(Debug, Clone, PartialEq)]
pub enum RangeArg {
    /// `ip:within:=CIDR` / `subnet:within:=CIDR`
    Cidr(Subnet),
    /// `subnet:contains:=addr`
    Addr(std::net::IpAddr),
    /// `numrange:contains:=p` / `daterange:contains:=p`
    Point(IndexValue),
    /// `numrange:overlaps:=[lo,hi]` and the daterange form
    Interval(IndexValue),
}

/// A filter compiled against a bucket schema
#[derive(Debug, Clone, PartialEq)]
pub enum TypedPred {
    And(Vec<TypedPred>),
    Or(Vec<TypedPred>),
    Not(Box<TypedPred>),
    Eq {
        attr: String,
        ty: ResolvedTy,
        value: TypedLit,
    },
    Present {
        attr: String,
    },
    Substr {
        attr: String,
        ty: ResolvedTy,
        parts: SubstringParts,
        case_ignore: bool,
    },
    Cmp {
        attr: String,
        ty: ResolvedTy,
        op: CompareOp,
        value: TypedLit,
    },
    CaseEq {
        attr: String,
        value: String,
    },
    Range {
        attr: String,
        field_ty: ScalarType,
        op: RangeOp,
        arg: RangeArg,
    },
}

/// A leaf literal, parsed eagerly for typed fields and kept as text for
/// untyped ones
#[derive(Debug, Clone, PartialEq)]
pub enum TypedLit {
    Value(IndexValue),
    Text(String),
}

/// Compile a parsed filter against a bucket schema
///
/// Structural nonsense (a range operator on an incompatible or absent
/// field, substring matching against a non-string type, ordering on an
/// unorderable type) and unparseable typed literals all fail with
/// [`Error::InvalidQuery`].
pub fn compile(bucket: &Bucket, filter: &Filter) -> Result<TypedPred> {
    match filter {
        Filter::And(children) => Ok(TypedPred::And(
            children
                .iter()
                .map(|c| compile(bucket, c))
                .collect::<Result<_>>()?,
        )),
        Filter::Or(children) => Ok(TypedPred::Or(
            children
                .iter()
                .map(|c| compile(bucket, c))
                .collect::<Result<_>>()?,
        )),
        Filter::Not(child) => Ok(TypedPred::Not(Box::new(compile(bucket, child)?))),
        Filter::Equality { attr, value } => {
            let ty = resolve_ty(bucket, attr);
            let value = parse_lit(&ty, value)?;
            Ok(TypedPred::Eq {
                attr: attr.clone(),
                ty,
                value,
            })
        }
        Filter::Presence { attr } => Ok(TypedPred::Present { attr: attr.clone() }),
        Filter::Substring { attr, parts } => {
            let ty = resolve_ty(bucket, attr);
            require_stringish(attr, &ty)?;
            Ok(TypedPred::Substr {
                attr: attr.clone(),
                ty,
                parts: parts.clone(),
                case_ignore: false,
            })
        }
        Filter::Ordering { attr, op, value } => {
            let ty = resolve_ty(bucket, attr);
            if let ResolvedTy::Typed(t) = &ty {
                if !t.scalar.is_orderable() {
                    return Err(Error::invalid_query(format!(
                        "{} is of type {} and cannot be ordered",
                        attr, t.scalar
                    )));
                }
            }
            let value = parse_lit(&ty, value)?;
            Ok(TypedPred::Cmp {
                attr: attr.clone(),
                ty,
                op: *op,
                value,
            })
        }
        Filter::Extensible {
            attr,
            rule: _,
            value,
            parts,
        } => {
            let ty = resolve_ty(bucket, attr);
            require_stringish(attr, &ty)?;
            match parts {
                Some(parts) => Ok(TypedPred::Substr {
                    attr: attr.clone(),
                    ty,
                    parts: parts.clone(),
                    case_ignore: true,
                }),
                None => Ok(TypedPred::CaseEq {
                    attr: attr.clone(),
                    value: value.clone(),
                }),
            }
        }
        Filter::Range { attr, op, value } => compile_range(bucket, attr, *op, value),
    }
}

/// Case-insensitive rules and substring patterns only make sense against
/// string-valued fields; untyped attributes pass (they evaluate as text)
fn require_stringish(attr: &str, ty: &ResolvedTy) -> Result<()> {
    match ty {
        ResolvedTy::Typed(t) if t.scalar != ScalarType::String => Err(Error::invalid_query(
            format!("{} is of type {} and does not support string matching", attr, t.scalar),
        )),
        _ => Ok(()),
    }
}

fn parse_lit(ty: &ResolvedTy, text: &str) -> Result<TypedLit> {
    match ty {
        ResolvedTy::Typed(t) => Ok(TypedLit::Value(IndexValue::parse_filter_literal(*t, text)?)),
        ResolvedTy::Untyped => Ok(TypedLit::Text(text.to_string())),
    }
}

fn compile_range(bucket: &Bucket, attr: &str, op: RangeOp, value: &str) -> Result<TypedPred> {
    let scalar = match resolve_ty(bucket, attr) {
        ResolvedTy::Typed(t) => t.scalar,
        ResolvedTy::Untyped => {
            return Err(Error::invalid_query(format!(
                "{} is not indexed and cannot be matched with {}",
                attr, op
            )));
        }
    };
    let unsupported = || {
        Error::invalid_query(format!(
            "{} is of type {} and does not support {}",
            attr, scalar, op
        ))
    };
    let arg = match (scalar, op) {
        (ScalarType::Ip, RangeOp::Within) | (ScalarType::Subnet, RangeOp::Within) => {
            let cidr = Subnet::parse(value)
                .ok_or_else(|| Error::invalid_query(format!("invalid subnet filter value: {value}")))?;
            RangeArg::Cidr(cidr)
        }
        (ScalarType::Subnet, RangeOp::Contains) => {
            let addr = crate::core::parse_ip(value)
                .ok_or_else(|| Error::invalid_query(format!("invalid ip filter value: {value}")))?;
            RangeArg::Addr(addr)
        }
        (ScalarType::NumRange, RangeOp::Contains) => RangeArg::Point(
            IndexValue::parse_filter_literal(IndexType::scalar(ScalarType::Number), value)?,
        ),
        (ScalarType::DateRange, RangeOp::Contains) => RangeArg::Point(
            IndexValue::parse_filter_literal(IndexType::scalar(ScalarType::Date), value)?,
        ),
        (ScalarType::NumRange, RangeOp::Overlaps) | (ScalarType::DateRange, RangeOp::Overlaps) => {
            RangeArg::Interval(IndexValue::parse_filter_literal(
                IndexType::scalar(scalar),
                value,
            )?)
        }
        _ => return Err(unsupported()),
    };
    Ok(TypedPred::Range {
        attr: attr.to_string(),
        field_ty: scalar,
        op,
        arg,
    })
}

// =============================================================================
// Row-level evaluation
// =============================================================================

/// The materialized state of one candidate row
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    pub value: &'a serde_json::Value,
    pub id: u64,
    pub key: &'a str,
    pub etag: &'a str,
    pub mtime: i64,
    pub txn_snap: u64,
}

impl<'a> RowView<'a> {
    /// The raw JSON value of a non-internal attribute, if present
    fn raw_field(&self, attr: &str) -> Option<&'a serde_json::Value> {
        self.value.get(attr)
    }

    /// Recompute the canonical typed value of an attribute
    ///
    /// Rows written before a type change may carry values the new type
    /// rejects; those evaluate as null and match nothing.
    fn typed_field(&self, attr: &str, ty: IndexType) -> IndexValue {
        match attr {
            "_id" => IndexValue::Number(self.id as f64),
            "_mtime" => IndexValue::Number(self.mtime as f64),
            "_txn_snap" => IndexValue::Number(self.txn_snap as f64),
            "_key" => IndexValue::String(self.key.to_string()),
            "_etag" => IndexValue::String(self.etag.to_string()),
            _ => match self.raw_field(attr) {
                Some(raw) => IndexValue::validate(attr, ty, raw).unwrap_or(IndexValue::Null),
                None => IndexValue::Null,
            },
        }
    }
}

impl TypedPred {
    /// Evaluate the predicate against one row
    pub fn matches(&self, row: &RowView<'_>) -> bool {
        match self {
            TypedPred::And(children) => children.iter().all(|c| c.matches(row)),
            TypedPred::Or(children) => children.iter().any(|c| c.matches(row)),
            TypedPred::Not(child) => !child.matches(row),
            TypedPred::Eq { attr, ty, value } => match (ty, value) {
                (ResolvedTy::Typed(t), TypedLit::Value(lit)) => {
                    scalar_match(&row.typed_field(attr, *t), |v| {
                        v.compare(lit) == Ordering::Equal
                    })
                }
                _ => match (row.raw_field(attr), value) {
                    (Some(raw), TypedLit::Text(text)) if !raw.is_null() => {
                        json_text(raw) == *text
                    }
                    _ => false,
                },
            },
            TypedPred::Present { attr } => match attr.as_str() {
                "_id" | "_mtime" | "_txn_snap" | "_key" | "_etag" => true,
                _ => row.raw_field(attr).is_some_and(|v| !v.is_null()),
            },
            TypedPred::Substr {
                attr,
                ty,
                parts,
                case_ignore,
            } => {
                let texts: Vec<String> = match ty {
                    ResolvedTy::Typed(t) => match row.typed_field(attr, *t) {
                        IndexValue::String(s) => vec![s],
                        IndexValue::Array(items) => items
                            .into_iter()
                            .filter_map(|v| match v {
                                IndexValue::String(s) => Some(s),
                                _ => None,
                            })
                            .collect(),
                        _ => vec![],
                    },
                    ResolvedTy::Untyped => match row.raw_field(attr) {
                        Some(raw) if !raw.is_null() => vec![json_text(raw)],
                        _ => vec![],
                    },
                };
                texts.iter().any(|t| parts.matches(t, *case_ignore))
            }
            TypedPred::Cmp {
                attr,
                ty,
                op,
                value,
            } => match (ty, value) {
                (ResolvedTy::Typed(t), TypedLit::Value(lit)) => {
                    scalar_match(&row.typed_field(attr, *t), |v| {
                        op_holds(*op, v.compare(lit))
                    })
                }
                _ => match (row.raw_field(attr), value) {
                    (Some(raw), TypedLit::Text(text)) if !raw.is_null() => {
                        op_holds(*op, untyped_cmp(&json_text(raw), text))
                    }
                    _ => false,
                },
            },
            TypedPred::CaseEq { attr, value } => match row.raw_field(attr) {
                Some(serde_json::Value::String(s)) => s.eq_ignore_ascii_case(value),
                Some(serde_json::Value::Array(items)) => items
                    .iter()
                    .filter(|v| !v.is_null())
                    .any(|v| json_text(v).eq_ignore_ascii_case(value)),
                Some(raw) if !raw.is_null() => json_text(raw).eq_ignore_ascii_case(value),
                _ => match attr.as_str() {
                    "_key" => row.key.eq_ignore_ascii_case(value),
                    "_etag" => row.etag.eq_ignore_ascii_case(value),
                    _ => false,
                },
            },
            TypedPred::Range {
                attr,
                field_ty,
                op: _,
                arg,
            } => {
                let stored = row.typed_field(attr, IndexType::scalar(*field_ty));
                scalar_match(&stored, |v| range_holds(v, arg))
            }
        }
    }
}

/// The canonical value of an attribute for sort-key purposes
///
/// Untyped attributes sort by their JSON text; absent or invalid values
/// sort as null (first ascending).
pub fn sort_value(bucket: &Bucket, row: &RowView<'_>, attr: &str) -> IndexValue {
    match resolve_ty(bucket, attr) {
        ResolvedTy::Typed(t) => row.typed_field(attr, t),
        ResolvedTy::Untyped => match row.raw_field(attr) {
            Some(raw) if !raw.is_null() => IndexValue::String(json_text(raw)),
            _ => IndexValue::Null,
        },
    }
}

/// Apply a scalar test to a value, matching any element for arrays
fn scalar_match(value: &IndexValue, test: impl Fn(&IndexValue) -> bool) -> bool {
    match value {
        IndexValue::Null => false,
        IndexValue::Array(items) => items.iter().any(|v| !v.is_null() && test(v)),
        v => test(v),
    }
}

fn op_holds(op: CompareOp, ord: Ordering) -> bool {
    match op {
        CompareOp::Ge => ord != Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
    }
}

fn range_holds(stored: &IndexValue, arg: &RangeArg) -> bool {
    match (stored, arg) {
        (IndexValue::Ip(addr), RangeArg::Cidr(cidr)) => cidr.contains(*addr),
        (IndexValue::Subnet(net), RangeArg::Cidr(cidr)) => net.is_subset_of(*cidr),
        (IndexValue::Subnet(net), RangeArg::Addr(addr)) => net.contains(*addr),
        (IndexValue::NumRange(r), RangeArg::Point(IndexValue::Number(p))) => r.contains_point(*p),
        (IndexValue::DateRange(r), RangeArg::Point(IndexValue::Date(p))) => r.contains_point(*p),
        (IndexValue::NumRange(r), RangeArg::Interval(IndexValue::NumRange(other))) => {
            r.overlaps(other)
        }
        (IndexValue::DateRange(r), RangeArg::Interval(IndexValue::DateRange(other))) => {
            r.overlaps(other)
        }
        _ => false,
    }
}

/// Textual form of a JSON scalar for untyped comparisons
fn json_text(raw: &serde_json::Value) -> String {
    match raw {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Untyped attributes compare numerically when both sides parse as numbers,
/// byte-wise otherwise
fn untyped_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        _ => a.cmp(b),
    }
}
