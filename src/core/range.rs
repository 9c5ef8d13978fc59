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

//! Range (interval) values for bucketdb
//!
//! `numrange`/`daterange` index values use the PostgreSQL interval syntax:
//! `[lo,hi]`, `(lo,hi)`, or mixed, with either bound empty meaning
//! unbounded. Ranges support point membership (`contains`) and interval
//! intersection (`overlaps`).

use std::cmp::Ordering;
use std::fmt;

/// One endpoint of a range
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RangeBound<T> {
    Inclusive(T),
    Exclusive(T),
    Unbounded,
}

impl<T> RangeBound<T> {
    /// The endpoint value, if bounded
    pub fn value(&self) -> Option<&T> {
        match self {
            RangeBound::Inclusive(v) | RangeBound::Exclusive(v) => Some(v),
            RangeBound::Unbounded => None,
        }
    }
}

/// A two-sided interval with independently open/closed/infinite endpoints
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypedRange<T> {
    pub lo: RangeBound<T>,
    pub hi: RangeBound<T>,
}

impl<T: PartialOrd + Copy> TypedRange<T> {
    /// Parse PostgreSQL interval syntax, parsing each bound with `parse`
    ///
    /// Returns None on any structural violation: missing brackets, missing
    /// comma, more than one comma, or an unparseable bound.
    pub fn parse(text: &str, parse: impl Fn(&str) -> Option<T>) -> Option<Self> {
        let text = text.trim();
        let mut chars = text.chars();
        let open = chars.next()?;
        let close = text.chars().next_back()?;
        if text.len() < 3 {
            return None;
        }

        let lo_closed = match open {
            '[' => true,
            '(' => false,
            _ => return None,
        };
        let hi_closed = match close {
            ']' => true,
            ')' => false,
            _ => return None,
        };

        let body = &text[1..text.len() - 1];
        let (lo_text, hi_text) = body.split_once(',')?;
        if hi_text.contains(',') {
            return None;
        }

        let lo = Self::parse_bound(lo_text.trim(), lo_closed, &parse)?;
        let hi = Self::parse_bound(hi_text.trim(), hi_closed, &parse)?;
        Some(Self { lo, hi })
    }

    fn parse_bound(
        text: &str,
        closed: bool,
        parse: &impl Fn(&str) -> Option<T>,
    ) -> Option<RangeBound<T>> {
        if text.is_empty() {
            return Some(RangeBound::Unbounded);
        }
        let v = parse(text)?;
        Some(if closed {
            RangeBound::Inclusive(v)
        } else {
            RangeBound::Exclusive(v)
        })
    }

    /// Point membership per the interval's open/closed semantics
    pub fn contains_point(&self, p: T) -> bool {
        let above_lo = match self.lo {
            RangeBound::Inclusive(v) => p >= v,
            RangeBound::Exclusive(v) => p > v,
            RangeBound::Unbounded => true,
        };
        let below_hi = match self.hi {
            RangeBound::Inclusive(v) => p <= v,
            RangeBound::Exclusive(v) => p < v,
            RangeBound::Unbounded => true,
        };
        above_lo && below_hi
    }

    /// Interval intersection
    pub fn overlaps(&self, other: &Self) -> bool {
        !Self::ends_before(&self.hi, &other.lo) && !Self::ends_before(&other.hi, &self.lo)
    }

    /// True if an interval ending at `hi` lies entirely before one starting
    /// at `lo`
    fn ends_before(hi: &RangeBound<T>, lo: &RangeBound<T>) -> bool {
        let (hv, lv) = match (hi.value(), lo.value()) {
            (Some(h), Some(l)) => (h, l),
            _ => return false,
        };
        if hv < lv {
            return true;
        }
        if hv > lv {
            return false;
        }
        // touching endpoints only intersect when both are closed
        !(matches!(hi, RangeBound::Inclusive(_)) && matches!(lo, RangeBound::Inclusive(_)))
    }

    /// Total order over ranges given a total order over T
    ///
    /// Unbounded lower bounds sort first, unbounded upper bounds last;
    /// at equal values closed sorts before open on the lower bound (it
    /// covers more) and after open on the upper bound.
    pub fn cmp_with(&self, other: &Self, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
        Self::cmp_lo(&self.lo, &other.lo, &cmp).then_with(|| Self::cmp_hi(&self.hi, &other.hi, &cmp))
    }

    fn cmp_lo(a: &RangeBound<T>, b: &RangeBound<T>, cmp: &impl Fn(&T, &T) -> Ordering) -> Ordering {
        match (a, b) {
            (RangeBound::Unbounded, RangeBound::Unbounded) => Ordering::Equal,
            (RangeBound::Unbounded, _) => Ordering::Less,
            (_, RangeBound::Unbounded) => Ordering::Greater,
            _ => {
                let (av, bv) = (a.value().unwrap(), b.value().unwrap());
                cmp(av, bv).then_with(|| rank_lo(a).cmp(&rank_lo(b)))
            }
        }
    }

    fn cmp_hi(a: &RangeBound<T>, b: &RangeBound<T>, cmp: &impl Fn(&T, &T) -> Ordering) -> Ordering {
        match (a, b) {
            (RangeBound::Unbounded, RangeBound::Unbounded) => Ordering::Equal,
            (RangeBound::Unbounded, _) => Ordering::Greater,
            (_, RangeBound::Unbounded) => Ordering::Less,
            _ => {
                let (av, bv) = (a.value().unwrap(), b.value().unwrap());
                cmp(av, bv).then_with(|| rank_hi(a).cmp(&rank_hi(b)))
            }
        }
    }
}

fn rank_lo<T>(b: &RangeBound<T>) -> u8 {
    match b {
        RangeBound::Inclusive(_) => 0,
        RangeBound::Exclusive(_) => 1,
        RangeBound::Unbounded => 2,
    }
}

fn rank_hi<T>(b: &RangeBound<T>) -> u8 {
    match b {
        RangeBound::Exclusive(_) => 0,
        RangeBound::Inclusive(_) => 1,
        RangeBound::Unbounded => 2,
    }
}

impl<T: fmt::Display> fmt::Display for TypedRange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lo {
            RangeBound::Inclusive(v) => write!(f, "[{v},")?,
            RangeBound::Exclusive(v) => write!(f, "({v},")?,
            RangeBound::Unbounded => write!(f, "(,")?,
        }
        match &self.hi {
            RangeBound::Inclusive(v) => write!(f, "{v}]"),
            RangeBound::Exclusive(v) => write!(f, "{v})"),
            RangeBound::Unbounded => write!(f, ")"),
        }
    }
}
