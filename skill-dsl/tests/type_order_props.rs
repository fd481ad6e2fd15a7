//! Property-Based Tests for the Compiler
//!
//! Properties: compiling the same source twice yields identical IR, the
//! result is in type order, and every declaration survives the sort.

use proptest::prelude::*;
use skill_dsl::{compile_source, HintMode};

/// Render a random inheritance forest as schema source. `supers[i]` is
/// the index of type `i`'s super, always less than `i`.
fn schema_from_supers(supers: &[Option<usize>]) -> String {
    let mut source = String::new();
    for (i, sup) in supers.iter().enumerate() {
        match sup {
            Some(p) => source.push_str(&format!("T{} extends T{} {{ i32 f{}; }}\n", i, p, i)),
            None => source.push_str(&format!("T{} {{ i32 f{}; }}\n", i, i)),
        }
    }
    source
}

proptest! {
    #[test]
    fn compilation_is_deterministic_and_type_ordered(
        raw in proptest::collection::vec(proptest::option::of(0usize..16), 1..10)
    ) {
        let supers: Vec<Option<usize>> = raw
            .iter()
            .enumerate()
            .map(|(i, s)| s.and_then(|p| if i == 0 { None } else { Some(p % i) }))
            .collect();
        let source = schema_from_supers(&supers);

        let first = compile_source(&source, HintMode::Strict).unwrap();
        let second = compile_source(&source, HintMode::Strict).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), supers.len());

        // Every supertype precedes its subtypes in the arena.
        for id in first.ids() {
            if let Some(parent) = first.decl(id).super_type {
                prop_assert!(parent < id);
                prop_assert_eq!(
                    first.decl(id).base_type,
                    first.decl(parent).base_type
                );
            }
        }
    }
}
