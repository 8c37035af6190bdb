//! Property-based tests for the configuration model.

#[cfg(test)]
mod proptest_tests {
    use crate::buckconfig::ConfigDocument;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn document() -> impl Strategy<Value = ConfigDocument> {
        let section = prop::collection::btree_map(
            "[a-z][a-z0-9_.-]{0,8}",
            "[A-Za-z0-9_./-]{0,12}",
            0..5,
        );
        prop::collection::btree_map("[a-z][a-z0-9_.]{0,8}", section, 0..4).prop_map(
            |sections: BTreeMap<String, BTreeMap<String, String>>| {
                sections
                    .into_iter()
                    .fold(ConfigDocument::new(), |doc, (name, entries)| {
                        entries.into_iter().fold(
                            doc.with_section(name.clone()),
                            |doc, (key, value)| doc.with_entry(name.clone(), key, value),
                        )
                    })
            },
        )
    }

    proptest! {
        /// Property: keys present in the override always win
        #[test]
        fn merge_override_wins(base in document(), over in document()) {
            let merged = ConfigDocument::merge(&base, &over);
            for (section, entries) in over.sections() {
                for (key, value) in entries {
                    prop_assert_eq!(merged.get(section, key), Some(value.as_str()));
                }
            }
        }

        /// Property: keys only in the base survive unchanged
        #[test]
        fn merge_keeps_base_only_keys(base in document(), over in document()) {
            let merged = ConfigDocument::merge(&base, &over);
            for (section, entries) in base.sections() {
                prop_assert!(merged.section(section).is_some());
                for (key, value) in entries {
                    if over.get(section, key).is_none() {
                        prop_assert_eq!(merged.get(section, key), Some(value.as_str()));
                    }
                }
            }
        }

        /// Property: merging a document with itself is the identity
        #[test]
        fn merge_with_self_is_identity(doc in document()) {
            prop_assert_eq!(ConfigDocument::merge(&doc, &doc), doc);
        }

        /// Property: merging onto an empty base copies the override
        #[test]
        fn merge_onto_empty_is_copy(doc in document()) {
            prop_assert_eq!(ConfigDocument::merge(&ConfigDocument::new(), &doc), doc);
        }

        /// Property: serialize then parse yields the same content
        #[test]
        fn parse_serialize_round_trip(doc in document()) {
            let text = doc.serialize();
            let (parsed, warnings) = ConfigDocument::parse_with_warnings(&text);
            prop_assert!(warnings.is_empty());
            prop_assert_eq!(parsed, doc);
        }

        /// Property: serialization is stable across a parse
        #[test]
        fn serialize_is_stable(doc in document()) {
            let once = doc.serialize();
            let twice = ConfigDocument::parse(&once).serialize();
            prop_assert_eq!(once, twice);
        }
    }
}
