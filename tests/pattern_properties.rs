//! Property tests for pattern parsing and compilation.
//!
//! Random patterns are built from literal and `{name}` / `{name:regex}`
//! pieces together with a subject that satisfies every piece. Parsing,
//! compiling and matching the subject must give back exactly the declared
//! variables with the values that went in.

use std::collections::BTreeMap;

use proptest::prelude::*;

use route_dispatch::routing::compiler::{compile, to_regex_source, PatternKind};
use route_dispatch::routing::parser::parse;
use route_dispatch::routing::Variables;

/// One piece of a generated pattern and the text that satisfies it.
#[derive(Debug, Clone)]
enum Piece {
    Literal(String),
    Variable { constraint: Option<&'static str>, value: String },
}

fn path_piece() -> impl Strategy<Value = Piece> {
    prop_oneof![
        "[a-z0-9.+-]{1,6}".prop_map(Piece::Literal),
        "[a-z0-9_.~-]{1,8}".prop_map(|value| Piece::Variable { constraint: None, value }),
        "[0-9]{1,6}".prop_map(|value| Piece::Variable { constraint: Some("\\d+"), value }),
        "[a-z]{1,6}".prop_map(|value| Piece::Variable { constraint: Some("[a-z]+"), value }),
        "[0-9a-f]{4}".prop_map(|value| Piece::Variable { constraint: Some("[0-9a-f]{4}"), value }),
    ]
}

fn host_piece() -> impl Strategy<Value = Piece> {
    prop_oneof![
        "[a-z0-9-]{1,6}".prop_map(Piece::Literal),
        "[a-z0-9-]{1,8}".prop_map(|value| Piece::Variable { constraint: None, value }),
        "[a-z]{1,6}".prop_map(|value| Piece::Variable { constraint: Some("[a-z]+"), value }),
    ]
}

/// Join pieces with `separator`, returning (pattern, subject, expected variables).
fn assemble(pieces: &[Piece], separator: &str, leading: bool) -> (String, String, Variables) {
    let mut pattern = String::new();
    let mut subject = String::new();
    let mut expected = Variables::new();

    for (i, piece) in pieces.iter().enumerate() {
        if leading || i > 0 {
            pattern.push_str(separator);
            subject.push_str(separator);
        }
        match piece {
            Piece::Literal(text) => {
                pattern.push_str(text);
                subject.push_str(text);
            }
            Piece::Variable { constraint, value } => {
                let name = format!("v{}", i);
                match constraint {
                    Some(regex) => pattern.push_str(&format!("{{{}:{}}}", name, regex)),
                    None => pattern.push_str(&format!("{{{}}}", name)),
                }
                subject.push_str(value);
                expected.insert(name, value.clone());
            }
        }
    }
    (pattern, subject, expected)
}

fn check_round_trip(
    pattern: &str,
    subject: &str,
    expected: &Variables,
    kind: PatternKind,
) -> Result<(), TestCaseError> {
    let parsed = parse(pattern).map_err(|e| TestCaseError::fail(e.to_string()))?;

    let mut declared = parsed.variable_names();
    declared.sort_unstable();
    let wanted: Vec<&str> = expected.keys().map(String::as_str).collect();
    prop_assert_eq!(declared, wanted);

    let constraints = BTreeMap::new();
    let first = to_regex_source(&parsed, kind, &constraints);
    let second = to_regex_source(&parsed, kind, &constraints);
    prop_assert_eq!(&first, &second);

    let compiled = compile(&parsed, kind, &constraints).map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert_eq!(compiled.source(), first.as_str());

    let captured = compiled.captures(subject);
    prop_assert_eq!(captured.as_ref(), Some(expected));
    Ok(())
}

proptest! {
    #[test]
    fn prop_path_patterns_round_trip(pieces in prop::collection::vec(path_piece(), 1..6)) {
        let (pattern, subject, expected) = assemble(&pieces, "/", true);
        check_round_trip(&pattern, &subject, &expected, PatternKind::Path)?;
    }

    #[test]
    fn prop_host_patterns_round_trip(pieces in prop::collection::vec(host_piece(), 1..5)) {
        let (pattern, subject, expected) = assemble(&pieces, ".", false);
        check_round_trip(&pattern, &subject, &expected, PatternKind::Host)?;
    }

    #[test]
    fn prop_unconstrained_host_variable_never_spans_labels(
        label in "[a-z0-9]{1,6}",
        extra in "[a-z0-9]{1,6}",
    ) {
        let parsed = parse("{tenant}.example.com").map_err(|e| TestCaseError::fail(e.to_string()))?;
        let compiled = compile(&parsed, PatternKind::Host, &BTreeMap::new())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let single = format!("{}.example.com", label);
        let nested = format!("{}.{}.example.com", extra, label);
        prop_assert!(compiled.captures(&single).is_some());
        prop_assert!(compiled.captures(&nested).is_none());
    }
}
