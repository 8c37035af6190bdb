//! Property-based tests for path manipulation functions.

#[cfg(test)]
mod proptest_tests {
    use crate::path::relative_path;
    use proptest::prelude::*;
    use std::path::{Component, Path, PathBuf};

    // ============================================================================
    // relative_path property tests
    // ============================================================================

    /// Lexically resolve `rel` against `base`, popping on `..`.
    fn resolve(base: &Path, rel: &str) -> PathBuf {
        let mut out = base.to_path_buf();
        for part in rel.split('/') {
            match part {
                "." => {}
                ".." => {
                    out.pop();
                }
                other => out.push(other),
            }
        }
        out
    }

    fn segments() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z][a-z0-9_-]{0,6}", 0..5)
    }

    proptest! {
        /// Property: resolving the relative path against `from` lands on `to`
        #[test]
        fn relative_path_resolves_to_target(
            common in segments(),
            from_tail in segments(),
            to_tail in segments(),
        ) {
            let root = PathBuf::from("/project");
            let mut from = root.clone();
            let mut to = root.clone();
            for s in common.iter() {
                from.push(s);
                to.push(s);
            }
            for s in from_tail.iter() {
                from.push(s);
            }
            for s in to_tail.iter() {
                to.push(s);
            }

            let rel = relative_path(&from, &to);
            prop_assert_eq!(resolve(&from, &rel), to);
        }

        /// Property: the relative path never contains a root or backslashes
        #[test]
        fn relative_path_is_relative(
            from_tail in segments(),
            to_tail in segments(),
        ) {
            let mut from = PathBuf::from("/p");
            from.extend(from_tail.iter());
            let mut to = PathBuf::from("/p");
            to.extend(to_tail.iter());
            let rel = relative_path(&from, &to);
            prop_assert!(!rel.starts_with('/'));
            prop_assert!(!rel.contains('\\'));
            prop_assert!(Path::new(&rel).components().all(|c| !matches!(c, Component::RootDir)));
        }
    }
}
