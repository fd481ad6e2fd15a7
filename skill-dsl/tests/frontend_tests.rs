//! Front-end scenario tests over the fixture schemas.

use skill_core::TypeContext;
use skill_dsl::{compile_file, CompileError, HintMode};
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn compile(name: &str) -> Result<TypeContext, CompileError> {
    compile_file(&fixture(name), HintMode::Strict)
}

#[test]
fn hints_compile_cleanly() {
    let ir = compile("hints.skill").expect("hints.skill compiles");
    assert!(ir.len() > 0);
}

#[test]
fn unknown_hints_fail_in_strict_mode() {
    let err = compile("badHints.skill").unwrap_err();
    assert!(matches!(err, CompileError::UnknownHint { .. }));
}

#[test]
fn unknown_hints_are_tolerated_in_lenient_mode() {
    let ir = compile_file(&fixture("badHints.skill"), HintMode::Lenient)
        .expect("lenient mode only warns");
    assert_eq!(ir.len(), 1);
}

#[test]
fn unknown_restriction_message_is_exact() {
    let err = compile("restrictions.skill").unwrap_err();
    assert_eq!(
        err.to_string(),
        "notahint() is either not supported or an invalid restriction name"
    );
}

#[test]
fn empty_schema_yields_empty_ir() {
    let ir = compile("empty.skill").expect("an empty file is legal");
    assert_eq!(ir.len(), 0);
}

#[test]
fn ir_is_in_type_order() {
    let ir = compile("typeOrderIR.skill").unwrap();
    let names: String = ir.iter().map(|d| d.skill_name.as_str()).collect();
    assert!(
        names == "abdc" || names == "acbd",
        "unexpected type order {names:?}"
    );
}

#[test]
fn casing_is_preserved_for_display_and_lowered_on_the_wire() {
    let ir = compile("regressionCasing.skill").unwrap();
    assert_eq!(ir.len(), 2);
    let decls: Vec<_> = ir.iter().collect();
    assert_eq!(decls[0].skill_name, "message");
    assert_eq!(decls[0].capital_name, "Message");
    assert_eq!(decls[1].skill_name, "datedmessage");
    assert_eq!(decls[1].capital_name, "DatedMessage");
}

#[test]
fn includes_pull_in_supertypes() {
    let ir = compile("withSubtypes.skill").unwrap();
    assert_eq!(ir.len(), 3);
    let message = ir.get("message").unwrap();
    let reply = ir.get("replymessage").unwrap();
    assert_eq!(ir.decl(reply).super_type, Some(message));
    assert_eq!(ir.decl(reply).base_type, message);
}

#[test]
fn missing_type_message_is_exact() {
    let err = compile("failures/missingTypeCausedBySpelling.skill").unwrap_err();
    assert_eq!(
        err.to_string(),
        "The type \"MessSage\" is unknown!\nKnown types are: message, datedmessage"
    );
}

#[test]
fn empty_int_range_message_is_exact() {
    let err = compile("failures/emptyRange.skill").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Integer range restriction has no legal values: 5 -> 5"
    );
}

#[test]
fn duplicate_definitions_are_rejected_case_insensitively() {
    let err = compile("failures/duplicateDefinition.skill").unwrap_err();
    assert!(matches!(err, CompileError::DuplicateDefinition { .. }));
}

#[test]
fn duplicate_fields_are_rejected_case_insensitively() {
    let err = compile("failures/duplicateField.skill").unwrap_err();
    assert!(matches!(err, CompileError::DuplicateField { .. }));
}

#[test]
fn half_float_is_not_a_type() {
    let err = compile("failures/halfFloat.skill").unwrap_err();
    assert!(matches!(err, CompileError::UnknownType { .. }));
}

#[test]
fn float_constants_are_rejected() {
    let err = compile("failures/floatConstant.skill").unwrap_err();
    assert!(matches!(err, CompileError::NonIntegralConstant { .. }));
}

#[test]
fn constants_of_the_enclosing_type_are_rejected() {
    let err = compile("failures/selfConst.skill").unwrap_err();
    assert!(matches!(err, CompileError::NonIntegralConstant { .. }));
}

#[test]
fn unknown_field_types_are_rejected() {
    let err = compile("failures/unknownType.skill").unwrap_err();
    assert!(matches!(err, CompileError::UnknownType { .. }));
}

#[test]
fn missing_include_files_are_reported() {
    let err = compile("failures/unknownFile.skill").unwrap_err();
    match err {
        CompileError::MissingInclude { file, .. } => {
            assert!(file.contains("doesNotExist.skill"));
        }
        other => panic!("expected MissingInclude, got {other:?}"),
    }
}

#[test]
fn content_without_declarations_is_an_error() {
    let err = compile("failures/empty.skill").unwrap_err();
    assert!(matches!(err, CompileError::NoDefinitions));
}

#[test]
fn the_any_type_is_rejected() {
    let err = compile("failures/anyType.skill").unwrap_err();
    assert!(matches!(err, CompileError::AnyType));
}

#[test]
fn inheritance_cycles_are_rejected() {
    let err = skill_dsl::compile_source("a extends b {}\nb extends a {}", HintMode::Strict)
        .unwrap_err();
    assert!(matches!(err, CompileError::CircularInheritance { .. }));
}
