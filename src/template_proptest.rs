//! Property-based tests for the template stages.
//!
//! These tests use proptest to generate random template trees and verify that
//! invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::template::maps::apply_maps;
    use crate::template::params::resolve_params;
    use crate::template::refs::fix_ref;
    use crate::template::scaling::{apply_scaling, ScaleRule, ScalingRules};
    use crate::template::{ALLOWED_RESOURCES, DEPENDS_ON, GET_ATT, MERGE_MAP, REF};
    use crate::tree::{Scalar, Tree};
    use proptest::prelude::*;

    fn scalar() -> impl Strategy<Value = Tree> {
        prop_oneof![
            Just(Tree::Scalar(Scalar::Null)),
            any::<bool>().prop_map(Tree::from),
            any::<i64>().prop_map(Tree::from),
            "[a-z0-9]{1,4}".prop_map(Tree::from),
        ]
    }

    fn key() -> impl Strategy<Value = String> {
        prop_oneof![
            6 => "[a-z0-9]{1,4}",
            1 => Just(REF.to_string()),
            1 => Just(DEPENDS_ON.to_string()),
            1 => Just(GET_ATT.to_string()),
            1 => Just(ALLOWED_RESOURCES.to_string()),
            1 => Just(MERGE_MAP.to_string()),
        ]
    }

    fn tree() -> impl Strategy<Value = Tree> {
        scalar().prop_recursive(4, 48, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Tree::Sequence),
                prop::collection::btree_map(key(), inner, 0..4).prop_map(Tree::Mapping),
            ]
        })
    }

    // ============================================================================
    // Scaling
    // ============================================================================

    proptest! {
        /// Property: scaling with no rules changes nothing
        #[test]
        fn scaling_without_rules_is_identity(input in tree()) {
            let scaled = apply_scaling(&input, &ScalingRules::new());
            prop_assert_eq!(scaled.ok(), Some(input));
        }

        /// Property: a single copy of every prefix is the original tree
        #[test]
        fn scaling_to_one_copy_is_identity(input in tree()) {
            let rules: ScalingRules = [ScaleRule::new("a0", 1).unwrap()].into_iter().collect();
            let scaled = apply_scaling(&input, &rules);
            prop_assert_eq!(scaled.ok(), Some(input));
        }
    }

    // ============================================================================
    // Merge::Map
    // ============================================================================

    proptest! {
        /// Property: expanding an already expanded tree changes nothing
        #[test]
        fn apply_maps_is_idempotent(input in tree()) {
            if let Ok(once) = apply_maps(&input) {
                let twice = apply_maps(&once);
                prop_assert_eq!(twice.ok(), Some(once));
            }
        }

        /// Property: no Merge::Map key survives expansion
        #[test]
        fn apply_maps_removes_every_macro(input in tree()) {
            if let Ok(expanded) = apply_maps(&input) {
                let text = expanded.to_yaml_string().unwrap();
                prop_assert!(!text.contains(MERGE_MAP));
            }
        }
    }

    // ============================================================================
    // Reference fixing and parameter substitution
    // ============================================================================

    proptest! {
        /// Property: renaming a resource to itself changes nothing
        #[test]
        fn fix_ref_same_name_is_identity(input in tree(), name in "[a-z0-9]{1,4}") {
            let mut fixed = input.clone();
            fix_ref(&mut fixed, &name, &name);
            prop_assert_eq!(fixed, input);
        }

        /// Property: renaming a name that never appears changes nothing
        #[test]
        fn fix_ref_absent_name_is_identity(input in tree()) {
            let mut fixed = input.clone();
            fix_ref(&mut fixed, "Absent", "Other");
            prop_assert_eq!(fixed, input);
        }

        /// Property: substituting a parameter that is never referenced changes nothing
        #[test]
        fn resolve_params_absent_name_is_identity(input in tree(), value in tree()) {
            let resolved = resolve_params(&input, "Absent", &value);
            prop_assert_eq!(resolved, input);
        }
    }
}
