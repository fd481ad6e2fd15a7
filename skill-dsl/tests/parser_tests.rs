//! Parser-level tests: grammar shapes and constraints checked at parse
//! time, before any semantic analysis.

use skill_dsl::parser::{parse, FieldBody, TypeExpr};

#[test]
fn parses_includes_then_declarations() {
    let file = parse("include \"a.skill\" \"b.skill\"\nwith \"c.skill\"\nMessage {}").unwrap();
    assert_eq!(file.includes, vec!["a.skill", "b.skill", "c.skill"]);
    assert_eq!(file.declarations.len(), 1);
}

#[test]
fn attaches_doc_comments_to_declarations_and_fields() {
    let file = parse(
        "/* the type */\nMessage {\n  /* the field */\n  string text;\n}",
    )
    .unwrap();
    let def = &file.declarations[0];
    assert_eq!(def.description.doc.as_deref(), Some("the type"));
    assert_eq!(
        def.body[0].description.doc.as_deref(),
        Some("the field")
    );
}

#[test]
fn parses_every_type_expression_shape() {
    let file = parse(
        "T {\n  i8 a;\n  i8[4] b;\n  i8[] c;\n  list<string> d;\n  set<i64> e;\n  map<string, i64, bool> f;\n}",
    )
    .unwrap();
    let body = &file.declarations[0].body;
    let types: Vec<_> = body
        .iter()
        .map(|f| match &f.body {
            FieldBody::Data { type_expr, .. } => type_expr.clone(),
            FieldBody::Constant { type_expr, .. } => type_expr.clone(),
        })
        .collect();
    assert_eq!(types[0], TypeExpr::Base("i8".into()));
    assert_eq!(
        types[1],
        TypeExpr::FixedArray {
            base: "i8".into(),
            length: 4
        }
    );
    assert_eq!(types[2], TypeExpr::VarArray { base: "i8".into() });
    assert_eq!(types[3], TypeExpr::List { base: "string".into() });
    assert_eq!(types[4], TypeExpr::Set { base: "i64".into() });
    assert_eq!(
        types[5],
        TypeExpr::Map {
            bases: vec!["string".into(), "i64".into(), "bool".into()]
        }
    );
}

#[test]
fn constants_parse_with_hex_values() {
    let file = parse("T { const i32 mask = 0xFF; }").unwrap();
    match &file.declarations[0].body[0].body {
        FieldBody::Constant { name, value, .. } => {
            assert_eq!(name, "mask");
            assert_eq!(*value, 255);
        }
        other => panic!("expected constant, got {other:?}"),
    }
}

#[test]
fn maps_require_at_least_two_base_types() {
    let err = parse("T { map<string> m; }").unwrap_err();
    assert!(err.to_string().contains("at least two"));
}

#[test]
fn sets_take_exactly_one_base_type() {
    let err = parse("T { set<string, i64> s; }").unwrap_err();
    assert!(err.to_string().contains("exactly one"));
}

#[test]
fn auto_constants_are_contradictory() {
    assert!(parse("T { auto const i32 x = 1; }").is_err());
}

#[test]
fn restrictions_and_hints_parse_with_arguments() {
    let file = parse("T { @range(0, 10, \"inclusive\", \"exclusive\") !readonly i32 x; }").unwrap();
    let desc = &file.declarations[0].body[0].description;
    assert_eq!(desc.restrictions.len(), 1);
    assert_eq!(desc.restrictions[0].name, "range");
    assert_eq!(desc.restrictions[0].args.len(), 4);
    assert_eq!(desc.hints.len(), 1);
    assert_eq!(desc.hints[0].name, "readonly");
}

#[test]
fn parse_errors_carry_positions() {
    let err = parse("T {\n  string ;\n}").unwrap_err();
    assert_eq!(err.line, 2);
}
