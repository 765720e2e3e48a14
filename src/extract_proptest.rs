//! Property-based tests for extraction and merging.
//!
//! These tests use proptest to generate paths and rule documents and verify
//! that the extraction and merge invariants hold for all of them.

#[cfg(test)]
mod proptest_tests {
    use crate::extract::{parse_from_placeholder, parse_from_regex, placeholder_to_regex, strip_ignored};
    use crate::merge::merge;
    use proptest::prelude::*;
    use serde_yaml::{Mapping, Value as YamlValue};
    use std::collections::BTreeMap;

    fn scalar_map() -> impl Strategy<Value = BTreeMap<String, i64>> {
        prop::collection::btree_map("[a-e]", any::<i64>(), 0..5)
    }

    fn to_yaml(map: &BTreeMap<String, i64>) -> YamlValue {
        let mut mapping = Mapping::new();
        for (key, value) in map {
            mapping.insert(key.as_str().into(), (*value).into());
        }
        YamlValue::Mapping(mapping)
    }

    // ============================================================================
    // extraction
    // ============================================================================

    proptest! {
        /// Placeholder mode gives the same document as regex mode on the lowered pattern
        #[test]
        fn placeholder_equals_lowered_regex(
            subject in "[a-zA-Z0-9]{1,8}",
            session in "[0-9]{1,3}",
            task in "[a-z]{1,10}",
        ) {
            let path = format!("data/sub-{}/ses-{}/{}.vhdr", subject, session, task);
            let pattern = "sub-%entities.subject%/ses-%entities.session%/%entities.task%.vhdr";

            let (regex, fields) = placeholder_to_regex(pattern, "%", "(.+)").unwrap();
            let via_placeholder = parse_from_placeholder(&path, pattern, "%", "(.+)").unwrap();
            let via_regex = parse_from_regex(&path, &regex, fields.as_slice()).unwrap();

            prop_assert_eq!(&via_placeholder, &via_regex);
            prop_assert_eq!(&via_placeholder["entities"]["subject"], &YamlValue::from(subject));
            prop_assert_eq!(&via_placeholder["entities"]["session"], &YamlValue::from(session));
            prop_assert_eq!(&via_placeholder["entities"]["task"], &YamlValue::from(task));
        }

        /// Backslash and forward-slash paths extract the same fields
        #[test]
        fn separators_do_not_matter(subject in "[a-z0-9]{1,8}", task in "[a-z]{1,8}") {
            let pattern = "sub-%entities.subject%/%entities.task%.edf";
            let unix = format!("raw/sub-{}/{}.edf", subject, task);
            let windows = unix.replace('/', "\\");
            prop_assert_eq!(
                parse_from_placeholder(&unix, pattern, "%", "(.+)").unwrap(),
                parse_from_placeholder(&windows, pattern, "%", "(.+)").unwrap()
            );
        }

        /// A group count different from the field count is always rejected
        #[test]
        fn group_count_must_match_field_count(groups in 1usize..5, fields in 0usize..6) {
            prop_assume!(groups != fields);
            let pattern = "(x)".repeat(groups);
            let names: Vec<String> = (0..fields).map(|i| format!("entities.f{}", i)).collect();
            let err = parse_from_regex(&"x".repeat(groups), &pattern, names.as_slice()).unwrap_err();
            prop_assert_eq!(err.kind(), "FieldCountMismatchError");
        }

        /// `ignore` never survives stripping
        #[test]
        fn ignore_is_stripped(noise in "[a-z]{1,8}", subject in "[0-9]{2}") {
            let path = format!("{}/sub-{}.vhdr", noise, subject);
            let mut document = parse_from_placeholder(&path, "%ignore%/sub-%entities.subject%.vhdr", "%", "(.+)").unwrap();
            prop_assert!(strip_ignored(&mut document));
            prop_assert!(document.get("ignore").is_none());
            prop_assert_eq!(&document["entities"]["subject"], &YamlValue::from(subject));
        }
    }

    // ============================================================================
    // merging
    // ============================================================================

    proptest! {
        /// Later documents win on every shared key; other keys are kept
        #[test]
        fn merge_is_right_biased(left in scalar_map(), right in scalar_map()) {
            let merged = merge(&[to_yaml(&left), to_yaml(&right)]).unwrap();
            let mut expected = left.clone();
            expected.extend(right.clone());
            prop_assert_eq!(merged, to_yaml(&expected));
        }

        /// Merging a document with an empty one changes nothing
        #[test]
        fn empty_document_is_identity(map in scalar_map()) {
            let document = to_yaml(&map);
            let empty = YamlValue::Mapping(Mapping::new());
            prop_assert_eq!(merge(&[document.clone(), empty.clone()]).unwrap(), document.clone());
            prop_assert_eq!(merge(&[empty, document.clone()]).unwrap(), document);
        }
    }
}
