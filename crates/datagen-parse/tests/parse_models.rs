use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use datagen_core::{DEFAULT_METADATA_COUNT, TypeExpr};
use datagen_parse::{ParseError, Section, parse_model, parse_unit};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn load(name: &str) -> String {
    let path = fixture(name);
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture {}", path.display()))
}

#[test]
fn empty_model_has_no_sections() {
    let model = parse_model("model empty {}", "empty").expect("parse");
    assert_eq!(model.name, "empty");
    assert!(model.fields.is_none());
    assert!(model.gen_functions.is_none());
    assert_eq!(model.metadata.count, DEFAULT_METADATA_COUNT);
}

#[test]
fn full_model_populates_every_section() {
    let path = fixture("users.dg");
    let source = fs::read(&path).expect("read fixture");
    let model = parse_unit(&source, "users", Some(&path)).expect("parse users.dg");

    assert_eq!(model.name, "users");
    assert_eq!(model.qualified_name, "users");
    assert_eq!(model.source_path.as_deref(), Some(path.as_path()));
    assert_eq!(model.metadata.count, 25);
    assert_eq!(
        model.metadata.tags,
        BTreeMap::from([
            ("env".to_string(), "prod".to_string()),
            ("team".to_string(), "identity".to_string()),
        ])
    );
    assert!(model.misc.as_deref().unwrap_or_default().contains("DOMAINS"));

    let names: Vec<_> = model.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["id", "email", "score"]);
    assert_eq!(model.fields()[0].ty, TypeExpr::plain("i64"));
    assert_eq!(model.fields()[2].ty.arity(), 2);
    assert_eq!(model.fields()[2].ty.value_type(), Some("i64"));
    assert_eq!(
        model.field("score").and_then(|f| f.init_args.clone()),
        Some(vec!["10".to_string(), "5".to_string()])
    );
    assert!(model.field("id").and_then(|f| f.init_args.clone()).is_none());

    let gens = model.gen_functions();
    assert_eq!(gens.len(), 3);
    assert!(gens.iter().all(|g| g.body.has_return));
    let score = model.gen_function("score").expect("score gen");
    assert_eq!(score.params.len(), 3);
    assert_eq!(score.params[1].name, "base");
    assert!(score.body.text.contains("return base;"));

    assert_eq!(model.calls.len(), 1);
    assert_eq!(model.calls[0].target, "score");
    assert!(
        model
            .serialiser
            .as_deref()
            .unwrap_or_default()
            .contains("into_bytes()")
    );
}

#[test]
fn metadata_entries_may_come_in_any_order() {
    let model = parse_model(&load("metadata_reordered.dg"), "reordered").expect("parse");
    assert_eq!(model.metadata.tags.get("env").map(String::as_str), Some("staging"));
    assert_eq!(model.metadata.declared_count, Some(0));
    assert_eq!(model.metadata.count, DEFAULT_METADATA_COUNT);
}

#[test]
fn tags_trailing_comma_is_rejected() {
    let err = parse_model(&load("trailing_comma.dg"), "tagged").unwrap_err();
    assert_eq!(err, ParseError::TrailingComma);
    assert!(err.to_string().contains("trailing comma"));

    for source in [
        r#"model t { metadata { tags: { "a": "b", } } }"#,
        "model t { metadata { tags: { \"a\": \"b\",\n } } }",
        "model t { metadata { tags: { \"a\": \"b\", // note\n } } }",
    ] {
        let err = parse_model(source, "t").unwrap_err();
        assert!(err.to_string().contains("trailing comma"), "{source}: {err}");
    }
}

#[test]
fn tags_parse_to_map() {
    let model = parse_model(
        r#"model t { metadata { tags: { "env": "prod", "team": "x" } } }"#,
        "t",
    )
    .expect("parse");
    assert_eq!(model.metadata.tags.len(), 2);
    assert_eq!(model.metadata.tags["team"], "x");
}

#[test]
fn syntax_errors_name_section_and_expectation() {
    let err = parse_model("model x { fields { id: i64 } bogus { } }", "x").unwrap_err();
    match &err {
        ParseError::Syntax { section, message, .. } => {
            assert_eq!(*section, Section::Fields);
            assert!(message.starts_with("expected section header"), "{message}");
            assert!(message.ends_with("got 'bogus'"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = parse_model("model x { gens { fn id() {} } }", "x").unwrap_err();
    assert_eq!(err.message(), "invalid gens body, expected func, got 'fn'");

    let err = parse_model("modl x {}", "x").unwrap_err();
    assert_eq!(err.message(), "expected 'model', got 'modl'");
}

#[test]
fn unterminated_body_is_reported() {
    let err = parse_model("model x { serialiser { vec![] ", "x").unwrap_err();
    assert_eq!(err.message(), "invalid serialiser body incomplete body");
}

#[test]
fn call_entries_must_be_calls() {
    let err = parse_model(
        "model x { fields { f: fn(a: i64) -> i64 } calls { f = 3 } }",
        "x",
    )
    .unwrap_err();
    assert!(matches!(err, ParseError::Embedded { ref context, .. } if context == "calls"));
}
