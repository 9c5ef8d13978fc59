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

//! Query planning: index-usability analysis and candidate narrowing
//!
//! Each leaf predicate is classed by how its attribute resolves against the
//! bucket: fully indexed, declared but pending reindex, or absent. The
//! class decides whether the leaf may drive an index lookup and whether the
//! query is admissible at all under `requireIndexes`. Narrowing only ever
//! shrinks the candidate set; the execution layer re-evaluates the full
//! predicate on every candidate row.

use crate::core::{Error, IndexValue, Result};
use crate::filter::{CompareOp, Filter};
use crate::schema::{Bucket, IndexState};

use super::predicate::{compile, resolve_ty, ResolvedTy, TypedPred};

/// Internal system columns, queryable on every bucket
const INTERNAL_FIELDS: [&str; 5] = ["_id", "_mtime", "_key", "_etag", "_txn_snap"];

/// How usable one leaf's attribute is for answering the query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafClass {
    /// Index is trustworthy; may drive candidate narrowing
    Indexed,
    /// Declared but backfilling; row-level recheck only
    Reindexing,
    /// Absent from the schema; row-level recheck only
    Unindexed,
}

/// One bound of an index range scan: value plus inclusivity
pub type ScanBound = (IndexValue, bool);

/// How the execution layer fetches candidate rows
///
/// Ordered from most to least selective; `And` keeps the best child,
/// `Or` unions its branches.
#[derive(Debug, Clone, PartialEq)]
pub enum Narrowing {
    /// Primary-key point lookup (`_key` equality)
    Key(String),
    /// Field index point lookup
    Eq { field: String, value: IndexValue },
    /// Field index range scan
    Scan {
        field: String,
        lo: Option<ScanBound>,
        hi: Option<ScanBound>,
    },
    /// Union of branch candidate sets
    Union(Vec<Narrowing>),
    /// Walk every row
    FullScan,
}

impl Narrowing {
    fn selectivity(&self) -> u8 {
        match self {
            Narrowing::Key(_) => 0,
            Narrowing::Eq { .. } => 1,
            Narrowing::Scan { .. } => 2,
            Narrowing::Union(_) => 3,
            Narrowing::FullScan => 4,
        }
    }
}

/// An admissible query, ready to execute
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub pred: TypedPred,
    pub narrowing: Narrowing,
}

/// Plan a parsed filter against a bucket
///
/// Fails with [`Error::InvalidQuery`] for structurally nonsensical leaves
/// or an `Or` with a non-indexed branch, [`Error::NotIndexed`] when the
/// filter's sole attribute is pending reindex, and the fixed
/// `requireIndexes` refusal when that policy is on and any leaf cannot be
/// answered from a usable index.
pub fn plan(bucket: &Bucket, filter: &Filter, require_indexes: bool) -> Result<QueryPlan> {
    // Compiling first surfaces type mismatches and bad literals as
    // InvalidQuery before any usability analysis.
    let pred = compile(bucket, filter)?;

    check_or_branches(bucket, filter)?;

    let attrs = filter.referenced_attrs();
    if let [sole] = attrs.as_slice() {
        if classify(bucket, sole) == LeafClass::Reindexing {
            return Err(Error::NotIndexed {
                bucket: bucket.name.clone(),
                field: sole.to_string(),
            });
        }
    }

    if require_indexes {
        let (reindexing, unindexed) = pending_and_absent(bucket, filter);
        if !reindexing.is_empty() || !unindexed.is_empty() {
            return Err(Error::invalid_query(format!(
                "{} does not have indexes that support {}. \
                 Reindexing fields: [ {} ]. Unindexed fields: [ {} ]",
                bucket.name,
                filter,
                reindexing.join(", "),
                unindexed.join(", "),
            )));
        }
    }

    let narrowing = narrow(bucket, filter);
    Ok(QueryPlan { pred, narrowing })
}

/// Class of one attribute against the bucket schema
pub fn classify(bucket: &Bucket, attr: &str) -> LeafClass {
    if INTERNAL_FIELDS.contains(&attr) {
        return LeafClass::Indexed;
    }
    match bucket.index_state(attr) {
        IndexState::Usable => LeafClass::Indexed,
        IndexState::Pending => LeafClass::Reindexing,
        IndexState::Absent => LeafClass::Unindexed,
    }
}

/// An `Or` branch that cannot be answered from an index would force an
/// unbounded scan of the disjunction, so every leaf under `Or` must be
/// fully indexed
fn check_or_branches(bucket: &Bucket, filter: &Filter) -> Result<()> {
    match filter {
        Filter::Or(children) => {
            for child in children {
                let mut bad: Option<&str> = None;
                child.for_each_leaf(&mut |leaf| {
                    if let Some(attr) = leaf.leaf_attr() {
                        if bad.is_none() && classify(bucket, attr) != LeafClass::Indexed {
                            bad = Some(attr);
                        }
                    }
                });
                if let Some(attr) = bad {
                    return Err(Error::invalid_query(format!(
                        "or-filter on {} requires a usable index on every branch",
                        attr
                    )));
                }
                check_or_branches(bucket, child)?;
            }
            Ok(())
        }
        Filter::And(children) => {
            for child in children {
                check_or_branches(bucket, child)?;
            }
            Ok(())
        }
        Filter::Not(child) => check_or_branches(bucket, child),
        _ => Ok(()),
    }
}

/// Derive the candidate fetch strategy
///
/// Only leaves whose attribute classifies as Indexed may drive narrowing;
/// a pending index could be missing rows and must not shrink the set.
fn narrow(bucket: &Bucket, filter: &Filter) -> Narrowing {
    match filter {
        Filter::And(children) => children
            .iter()
            .map(|c| narrow(bucket, c))
            .min_by_key(Narrowing::selectivity)
            .unwrap_or(Narrowing::FullScan),
        Filter::Or(children) => {
            let branches: Vec<Narrowing> = children.iter().map(|c| narrow(bucket, c)).collect();
            if branches.iter().any(|b| matches!(b, Narrowing::FullScan)) {
                Narrowing::FullScan
            } else {
                Narrowing::Union(branches)
            }
        }
        // Negation cannot bound the candidate set
        Filter::Not(_) => Narrowing::FullScan,
        Filter::Equality { attr, value } => {
            if attr == "_key" {
                return Narrowing::Key(value.clone());
            }
            if bucket.index_state(attr) != IndexState::Usable {
                return Narrowing::FullScan;
            }
            match resolve_ty(bucket, attr) {
                ResolvedTy::Typed(ty) => match IndexValue::parse_filter_literal(ty, value) {
                    Ok(lit) => Narrowing::Eq {
                        field: attr.clone(),
                        value: lit,
                    },
                    Err(_) => Narrowing::FullScan,
                },
                ResolvedTy::Untyped => Narrowing::FullScan,
            }
        }
        Filter::Ordering { attr, op, value } => {
            if bucket.index_state(attr) != IndexState::Usable {
                return Narrowing::FullScan;
            }
            let ty = match resolve_ty(bucket, attr) {
                ResolvedTy::Typed(ty) if !ty.array => ty,
                _ => return Narrowing::FullScan,
            };
            let lit = match IndexValue::parse_filter_literal(ty, value) {
                Ok(lit) => lit,
                Err(_) => return Narrowing::FullScan,
            };
            match op {
                CompareOp::Ge => Narrowing::Scan {
                    field: attr.clone(),
                    lo: Some((lit, true)),
                    hi: None,
                },
                CompareOp::Le => Narrowing::Scan {
                    field: attr.clone(),
                    lo: None,
                    hi: Some((lit, true)),
                },
            }
        }
        _ => Narrowing::FullScan,
    }
}

/// Split a filter's attributes by leaf class, for diagnostics
pub fn pending_and_absent<'a>(bucket: &Bucket, filter: &'a Filter) -> (Vec<&'a str>, Vec<&'a str>) {
    let mut reindexing = Vec::new();
    let mut unindexed = Vec::new();
    for attr in filter.referenced_attrs() {
        match classify(bucket, attr) {
            LeafClass::Reindexing => reindexing.push(attr),
            LeafClass::Unindexed => unindexed.push(attr),
            LeafClass::Indexed => {}
        }
    }
    (reindexing, unindexed)
}
