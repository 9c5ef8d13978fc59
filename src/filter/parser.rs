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

//! LDAP-style filter parser
//!
//! Recursive descent over `(...)` s-expressions with `&`, `|`, `!`
//! combinators and the leaf forms of RFC 4515 plus the range extensions
//! (`within`, `contains`, `overlaps`). The parser is type-agnostic; leaf
//! values stay raw strings for the planner to resolve.
//!
//! Escaping: `(`, `)`, `*`, `\` inside a value must be backslash-escaped,
//! either as `\<char>` or as an RFC 4515 two-digit hex escape (`\2a`).
//! An unescaped `=` inside a value is permitted and taken literally.
//! Every failure is an `InvalidQueryError`; there are no partial results.

use crate::core::{Error, Result};

use super::ast::{CompareOp, Filter, MatchRule, RangeOp, SubstringParts};

/// Parse a textual filter into its AST
pub fn parse(input: &str) -> Result<Filter> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
        input,
    };
    let filter = parser.parse_filter()?;
    if parser.pos != parser.chars.len() {
        return Err(parser.fail("trailing characters after filter"));
    }
    Ok(filter)
}

/// One section of a scanned leaf value: literal text or an unescaped `*`
enum ValuePart {
    Literal(String),
    Star,
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    input: &'a str,
}

impl Parser<'_> {
    fn fail(&self, what: &str) -> Error {
        Error::invalid_query(format!("{what} in filter: {}", self.input))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn expect(&mut self, ch: char) -> Result<()> {
        if self.bump() == Some(ch) {
            Ok(())
        } else {
            Err(self.fail(&format!("expected '{ch}'")))
        }
    }

    fn parse_filter(&mut self) -> Result<Filter> {
        self.expect('(')?;
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.parse_children()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.parse_children()?)
            }
            Some('!') => {
                self.pos += 1;
                let child = self.parse_filter()?;
                Filter::Not(Box::new(child))
            }
            Some(_) => self.parse_leaf()?,
            None => return Err(self.fail("unbalanced parentheses")),
        };
        self.expect(')')?;
        Ok(filter)
    }

    fn parse_children(&mut self) -> Result<Vec<Filter>> {
        let mut children = Vec::new();
        while self.peek() == Some('(') {
            children.push(self.parse_filter()?);
        }
        if children.is_empty() {
            return Err(self.fail("empty combinator"));
        }
        Ok(children)
    }

    fn parse_leaf(&mut self) -> Result<Filter> {
        let attr = self.read_attr()?;
        match self.bump() {
            Some('=') => self.finish_equality(attr),
            Some('>') => {
                self.require_eq_suffix('>')?;
                let value = self.read_literal_value()?;
                Ok(Filter::Ordering {
                    attr,
                    op: CompareOp::Ge,
                    value,
                })
            }
            Some('<') => {
                self.require_eq_suffix('<')?;
                let value = self.read_literal_value()?;
                Ok(Filter::Ordering {
                    attr,
                    op: CompareOp::Le,
                    value,
                })
            }
            Some(':') => self.finish_extensible(attr),
            _ => Err(self.fail("expected an operator after attribute")),
        }
    }

    /// Strict `>` / `<` without `=` are malformed
    fn require_eq_suffix(&mut self, op: char) -> Result<()> {
        if self.bump() == Some('=') {
            Ok(())
        } else {
            Err(self.fail(&format!("strict '{op}' is not supported, use '{op}='")))
        }
    }

    fn read_attr(&mut self) -> Result<String> {
        let mut attr = String::new();
        while let Some(ch) = self.peek() {
            match ch {
                '=' | '>' | '<' | ':' => break,
                '(' | ')' | '*' | '\\' => {
                    return Err(self.fail("invalid character in attribute name"))
                }
                _ => {
                    attr.push(ch);
                    self.pos += 1;
                }
            }
        }
        if attr.is_empty() {
            return Err(self.fail("empty attribute name"));
        }
        Ok(attr)
    }

    fn finish_equality(&mut self, attr: String) -> Result<Filter> {
        let parts = self.read_value_parts()?;
        // (attr=*) is presence, any other unescaped star makes a substring
        match Self::assemble(parts) {
            Assembled::Presence => Ok(Filter::Presence { attr }),
            Assembled::Literal(value) => Ok(Filter::Equality { attr, value }),
            Assembled::Substring(parts) => Ok(Filter::Substring { attr, parts }),
        }
    }

    fn finish_extensible(&mut self, attr: String) -> Result<Filter> {
        let mut rule = String::new();
        loop {
            match self.bump() {
                Some(':') => break,
                Some(ch) if ch.is_ascii_alphanumeric() => rule.push(ch),
                _ => return Err(self.fail("malformed matching rule")),
            }
        }
        self.expect('=')?;

        if let Some(op) = match rule.as_str() {
            "within" => Some(RangeOp::Within),
            "contains" => Some(RangeOp::Contains),
            "overlaps" => Some(RangeOp::Overlaps),
            _ => None,
        } {
            let value = self.read_literal_value()?;
            return Ok(Filter::Range { attr, op, value });
        }

        match rule.as_str() {
            "caseIgnoreMatch" => {
                let value = self.read_literal_value()?;
                Ok(Filter::Extensible {
                    attr,
                    rule: MatchRule::CaseIgnore,
                    value,
                    parts: None,
                })
            }
            "caseIgnoreSubstringsMatch" => {
                let parts = self.read_value_parts()?;
                let (raw, parts) = match Self::assemble(parts) {
                    Assembled::Presence => {
                        return Err(self.fail("bare wildcard in substrings match"))
                    }
                    Assembled::Literal(value) => {
                        let parts = SubstringParts {
                            initial: Some(value.clone()),
                            any: vec![],
                            fin: None,
                        };
                        (value, parts)
                    }
                    Assembled::Substring(parts) => {
                        let mut raw = String::new();
                        if let Some(initial) = &parts.initial {
                            raw.push_str(initial);
                        }
                        raw.push('*');
                        for chunk in &parts.any {
                            raw.push_str(chunk);
                            raw.push('*');
                        }
                        if let Some(fin) = &parts.fin {
                            raw.push_str(fin);
                        }
                        (raw, parts)
                    }
                };
                Ok(Filter::Extensible {
                    attr,
                    rule: MatchRule::CaseIgnoreSubstrings,
                    value: raw,
                    parts: Some(parts),
                })
            }
            _ => Err(self.fail(&format!("unknown matching rule '{rule}'"))),
        }
    }

    /// Read a value up to the closing paren, with no wildcards allowed
    fn read_literal_value(&mut self) -> Result<String> {
        let parts = self.read_value_parts()?;
        match Self::assemble(parts) {
            Assembled::Literal(value) => Ok(value),
            _ => Err(self.fail("wildcard not allowed in this value")),
        }
    }

    /// Scan a leaf value, handling escapes, until the unconsumed `)`
    ///
    /// The section in progress accumulates as bytes so adjacent hex escapes
    /// (`\c3\a9` for `é`) decode as one UTF-8 sequence.
    fn read_value_parts(&mut self) -> Result<Vec<ValuePart>> {
        let mut parts: Vec<ValuePart> = Vec::new();
        let mut current: Vec<u8> = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.fail("unbalanced parentheses")),
                Some(')') => break,
                Some('(') => return Err(self.fail("unescaped '(' in value")),
                Some('*') => {
                    self.pos += 1;
                    self.take_literal(&mut current, &mut parts)?;
                    parts.push(ValuePart::Star);
                }
                Some('\\') => {
                    self.pos += 1;
                    self.read_escape(&mut current)?;
                }
                Some(ch) => {
                    self.pos += 1;
                    let mut buf = [0u8; 4];
                    current.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        self.take_literal(&mut current, &mut parts)?;
        Ok(parts)
    }

    fn take_literal(&self, bytes: &mut Vec<u8>, parts: &mut Vec<ValuePart>) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8(std::mem::take(bytes))
            .map_err(|_| self.fail("escapes do not form valid utf-8"))?;
        parts.push(ValuePart::Literal(text));
        Ok(())
    }

    /// After a backslash: two hex digits form an RFC 4515 escape byte,
    /// anything else is taken as the escaped character itself
    fn read_escape(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let first = self
            .bump()
            .ok_or_else(|| self.fail("dangling escape at end of value"))?;
        let second = self.peek();
        if let (Some(hi), Some(lo)) = (first.to_digit(16), second.and_then(|c| c.to_digit(16))) {
            if first.is_ascii() && second.is_some_and(|c| c.is_ascii()) {
                self.pos += 1;
                out.push((hi * 16 + lo) as u8);
                return Ok(());
            }
        }
        let mut buf = [0u8; 4];
        out.extend_from_slice(first.encode_utf8(&mut buf).as_bytes());
        Ok(())
    }

    fn assemble(parts: Vec<ValuePart>) -> Assembled {
        let has_star = parts.iter().any(|p| matches!(p, ValuePart::Star));
        if !has_star {
            let value = match parts.into_iter().next() {
                Some(ValuePart::Literal(v)) => v,
                _ => String::new(),
            };
            return Assembled::Literal(value);
        }
        if parts.len() == 1 {
            return Assembled::Presence;
        }

        let ends_open = matches!(parts.last(), Some(ValuePart::Star));
        let mut sub = SubstringParts::default();
        let mut iter = parts.into_iter().peekable();
        if let Some(ValuePart::Literal(_)) = iter.peek() {
            if let Some(ValuePart::Literal(v)) = iter.next() {
                sub.initial = Some(v);
            }
        }
        let mut chunks: Vec<String> = Vec::new();
        for part in iter {
            if let ValuePart::Literal(v) = part {
                chunks.push(v);
            }
        }
        // the last chunk is the final section unless the value ended on `*`
        if !ends_open {
            sub.fin = chunks.pop();
        }
        sub.any = chunks;
        Assembled::Substring(sub)
    }
}

enum Assembled {
    Presence,
    Literal(String),
    Substring(SubstringParts),
}
