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

//! Integration tests for the filter language, end to end through parse and
//! display

use bucketdb::{parse_filter, Filter};

#[test]
fn test_parse_round_trip() {
    let cases = [
        "(name=alice)",
        "(name=*)",
        "(name=al*)",
        "(name=*ce)",
        "(name=a*i*e)",
        "(age>=21)",
        "(age<=65)",
        "(&(name=alice)(age>=21))",
        "(|(a=1)(b=2)(c=3))",
        "(!(name=bob))",
        "(&(|(a=1)(b=2))(!(c=3)))",
        "(name:caseIgnoreMatch:=ALICE)",
        "(name:caseIgnoreSubstringsMatch:=al*ce)",
        "(addr:within:=10.0.0.0/8)",
        "(net:contains:=10.1.3.255)",
        "(span:overlaps:=[1,10])",
    ];
    for text in cases {
        let ast = parse_filter(text).unwrap_or_else(|e| panic!("parse {:?}: {:?}", text, e));
        assert_eq!(ast.to_string(), text, "display mismatch for {:?}", text);
    }
}

#[test]
fn test_malformed_rejected() {
    let cases = [
        "",
        "(",
        ")",
        "()",
        "(name)",
        "(name=alice",
        "name=alice",
        "(name=alice)(extra=1)",
        "(&)",
        "(|)",
        "(!)",
        "(!(a=1)(b=2))",
        "(name>21)",
        "(name<21)",
        "(name:bogusRule:=x)",
        "(na(me=x)",
    ];
    for text in cases {
        assert!(parse_filter(text).is_err(), "{:?} should not parse", text);
    }
}

#[test]
fn test_value_escapes() {
    // RFC-4515 two-hex-digit escape
    let ast = parse_filter(r"(name=a\2ab)").unwrap();
    match &ast {
        Filter::Equality { value, .. } => assert_eq!(value, "a*b"),
        other => panic!("expected equality, got {:?}", other),
    }

    // direct character escape
    let ast = parse_filter(r"(name=a\*b)").unwrap();
    match &ast {
        Filter::Equality { value, .. } => assert_eq!(value, "a*b"),
        other => panic!("expected equality, got {:?}", other),
    }

    let ast = parse_filter(r"(path=\(x\)\\y)").unwrap();
    match &ast {
        Filter::Equality { value, .. } => assert_eq!(value, r"(x)\y"),
        other => panic!("expected equality, got {:?}", other),
    }
}

#[test]
fn test_equals_inside_value_is_literal() {
    let ast = parse_filter("(expr=a=b)").unwrap();
    match &ast {
        Filter::Equality { attr, value } => {
            assert_eq!(attr, "expr");
            assert_eq!(value, "a=b");
        }
        other => panic!("expected equality, got {:?}", other),
    }
}

#[test]
fn test_substring_shapes() {
    match parse_filter("(name=pre*mid*)").unwrap() {
        Filter::Substring { parts, .. } => {
            assert_eq!(parts.initial.as_deref(), Some("pre"));
            assert_eq!(parts.any, vec!["mid"]);
            assert_eq!(parts.fin, None);
        }
        other => panic!("expected substring, got {:?}", other),
    }
    match parse_filter("(name=*mid*suf)").unwrap() {
        Filter::Substring { parts, .. } => {
            assert_eq!(parts.initial, None);
            assert_eq!(parts.any, vec!["mid"]);
            assert_eq!(parts.fin.as_deref(), Some("suf"));
        }
        other => panic!("expected substring, got {:?}", other),
    }
}

#[test]
fn test_nested_combinator_attrs() {
    let ast = parse_filter("(&(|(a=1)(b=2))(!(c=3))(d>=4))").unwrap();
    assert_eq!(ast.referenced_attrs(), vec!["a", "b", "c", "d"]);
}
