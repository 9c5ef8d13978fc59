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

//! Filter AST for bucketdb
//!
//! The parsed form of an LDAP-style filter. Leaf values stay raw strings
//! here; the planner resolves them against the bucket schema's index types.
//! New filter forms are new variants with exhaustive matching downstream,
//! never duck-typed extension.

use std::fmt;

/// Comparison operator for ordering leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `>=`
    Ge,
    /// `<=`
    Le,
}

/// Extensible matching rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// `caseIgnoreMatch`
    CaseIgnore,
    /// `caseIgnoreSubstringsMatch`
    CaseIgnoreSubstrings,
}

/// Range operator for range-typed leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Within,
    Contains,
    Overlaps,
}

impl fmt::Display for RangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RangeOp::Within => "within",
            RangeOp::Contains => "contains",
            RangeOp::Overlaps => "overlaps",
        })
    }
}

/// Substring pattern: `initial*any*...*final`
///
/// Any of the three sections may be absent; `any` holds the `*`-separated
/// middle chunks in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubstringParts {
    pub initial: Option<String>,
    pub any: Vec<String>,
    pub fin: Option<String>,
}

impl SubstringParts {
    /// Match against a candidate, optionally case-folding first
    pub fn matches(&self, text: &str, case_ignore: bool) -> bool {
        let folded;
        let mut rest = if case_ignore {
            folded = text.to_lowercase();
            folded.as_str()
        } else {
            text
        };
        let fold = |s: &str| {
            if case_ignore {
                s.to_lowercase()
            } else {
                s.to_string()
            }
        };

        if let Some(initial) = &self.initial {
            let initial = fold(initial);
            match rest.strip_prefix(initial.as_str()) {
                Some(r) => rest = r,
                None => return false,
            }
        }
        if let Some(fin) = &self.fin {
            let fin = fold(fin);
            match rest.strip_suffix(fin.as_str()) {
                Some(r) => rest = r,
                None => return false,
            }
        }
        for chunk in &self.any {
            let chunk = fold(chunk);
            match rest.find(chunk.as_str()) {
                Some(at) => rest = &rest[at + chunk.len()..],
                None => return false,
            }
        }
        true
    }
}

/// A parsed filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// `(attr=value)`
    Equality { attr: String, value: String },
    /// `(attr=*)`
    Presence { attr: String },
    /// `(attr=prefix*infix*suffix)`
    Substring {
        attr: String,
        parts: SubstringParts,
    },
    /// `(attr>=value)` / `(attr<=value)`
    Ordering {
        attr: String,
        op: CompareOp,
        value: String,
    },
    /// `(attr:caseIgnoreMatch:=value)` and friends
    Extensible {
        attr: String,
        rule: MatchRule,
        value: String,
        /// Pre-split pattern for the substrings rule
        parts: Option<SubstringParts>,
    },
    /// `(attr:within:=value)` / `contains` / `overlaps`
    Range {
        attr: String,
        op: RangeOp,
        value: String,
    },
}

impl Filter {
    /// The attribute a leaf references, None for combinators
    pub fn leaf_attr(&self) -> Option<&str> {
        match self {
            Filter::Equality { attr, .. }
            | Filter::Presence { attr }
            | Filter::Substring { attr, .. }
            | Filter::Ordering { attr, .. }
            | Filter::Extensible { attr, .. }
            | Filter::Range { attr, .. } => Some(attr),
            _ => None,
        }
    }

    /// Visit every leaf predicate in depth-first order
    pub fn for_each_leaf<'a>(&'a self, visit: &mut impl FnMut(&'a Filter)) {
        match self {
            Filter::And(children) | Filter::Or(children) => {
                for child in children {
                    child.for_each_leaf(visit);
                }
            }
            Filter::Not(child) => child.for_each_leaf(visit),
            leaf => visit(leaf),
        }
    }

    /// All distinct attributes referenced by the filter, in first-seen order
    pub fn referenced_attrs(&self) -> Vec<&str> {
        let mut attrs: Vec<&str> = Vec::new();
        self.for_each_leaf(&mut |leaf| {
            if let Some(attr) = leaf.leaf_attr() {
                if !attrs.contains(&attr) {
                    attrs.push(attr);
                }
            }
        });
        attrs
    }
}

/// Escape the characters the grammar reserves inside values
fn escape_value(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '(' | ')' | '*' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.write_to(&mut out);
        f.write_str(&out)
    }
}

impl Filter {
    fn write_to(&self, out: &mut String) {
        match self {
            Filter::And(children) => {
                out.push_str("(&");
                for child in children {
                    child.write_to(out);
                }
                out.push(')');
            }
            Filter::Or(children) => {
                out.push_str("(|");
                for child in children {
                    child.write_to(out);
                }
                out.push(')');
            }
            Filter::Not(child) => {
                out.push_str("(!");
                child.write_to(out);
                out.push(')');
            }
            Filter::Equality { attr, value } => {
                out.push('(');
                out.push_str(attr);
                out.push('=');
                escape_value(value, out);
                out.push(')');
            }
            Filter::Presence { attr } => {
                out.push('(');
                out.push_str(attr);
                out.push_str("=*)");
            }
            Filter::Substring { attr, parts } => {
                out.push('(');
                out.push_str(attr);
                out.push('=');
                if let Some(initial) = &parts.initial {
                    escape_value(initial, out);
                }
                out.push('*');
                for chunk in &parts.any {
                    escape_value(chunk, out);
                    out.push('*');
                }
                if let Some(fin) = &parts.fin {
                    escape_value(fin, out);
                }
                out.push(')');
            }
            Filter::Ordering { attr, op, value } => {
                out.push('(');
                out.push_str(attr);
                out.push_str(match op {
                    CompareOp::Ge => ">=",
                    CompareOp::Le => "<=",
                });
                escape_value(value, out);
                out.push(')');
            }
            Filter::Extensible {
                attr, rule, value, ..
            } => {
                out.push('(');
                out.push_str(attr);
                out.push(':');
                out.push_str(match rule {
                    MatchRule::CaseIgnore => "caseIgnoreMatch",
                    MatchRule::CaseIgnoreSubstrings => "caseIgnoreSubstringsMatch",
                });
                out.push_str(":=");
                // substring patterns keep their raw wildcard shape
                out.push_str(value);
                out.push(')');
            }
            Filter::Range { attr, op, value } => {
                out.push('(');
                out.push_str(attr);
                out.push(':');
                out.push_str(&op.to_string());
                out.push_str(":=");
                escape_value(value, out);
                out.push(')');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_matching() {
        let parts = SubstringParts {
            initial: Some("foo".to_string()),
            any: vec!["bar".to_string()],
            fin: Some("baz".to_string()),
        };
        assert!(parts.matches("foo-bar-baz", false));
        assert!(parts.matches("foobarbaz", false));
        assert!(!parts.matches("foo-baz", false));
        assert!(!parts.matches("xfoo-bar-baz", false));
    }

    #[test]
    fn test_substring_case_ignore() {
        let parts = SubstringParts {
            initial: Some("Foo".to_string()),
            any: vec![],
            fin: None,
        };
        assert!(!parts.matches("fOO-rest", false));
        assert!(parts.matches("fOO-rest", true));
    }

    #[test]
    fn test_substring_overlapping_sections() {
        // final is carved off before the middle chunks are searched, so
        // the suffix cannot double as an `any` match
        let parts = SubstringParts {
            initial: None,
            any: vec!["ab".to_string()],
            fin: Some("ab".to_string()),
        };
        assert!(!parts.matches("ab", false));
        assert!(parts.matches("abab", false));
    }

    #[test]
    fn test_referenced_attrs() {
        let filter = Filter::And(vec![
            Filter::Equality {
                attr: "a".to_string(),
                value: "1".to_string(),
            },
            Filter::Or(vec![
                Filter::Presence {
                    attr: "b".to_string(),
                },
                Filter::Equality {
                    attr: "a".to_string(),
                    value: "2".to_string(),
                },
            ]),
        ]);
        assert_eq!(filter.referenced_attrs(), vec!["a", "b"]);
    }

    #[test]
    fn test_display_escapes_reserved() {
        let filter = Filter::Equality {
            attr: "name".to_string(),
            value: "a(b)c*d\\e".to_string(),
        };
        assert_eq!(filter.to_string(), r"(name=a\(b\)c\*d\\e)");
    }

    #[test]
    fn test_display_combinators() {
        let filter = Filter::Not(Box::new(Filter::Or(vec![
            Filter::Presence {
                attr: "a".to_string(),
            },
            Filter::Ordering {
                attr: "n".to_string(),
                op: CompareOp::Ge,
                value: "5".to_string(),
            },
        ])));
        assert_eq!(filter.to_string(), "(!(|(a=*)(n>=5)))");
    }
}
