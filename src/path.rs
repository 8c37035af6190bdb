//! Path manipulation utilities

use std::path::{Component, Path};

/// Compute the path that leads from directory `from` to `to`.
///
/// Both paths are compared lexically component by component, so they must be
/// expressed relative to the same base (both absolute, or both relative to
/// the same directory). The result always uses `/` as separator so generated
/// configuration is identical on every platform, and is `.` when the two
/// paths are equal.
pub fn relative_path(from: &Path, to: &Path) -> String {
    let from: Vec<Component<'_>> = normalized(from);
    let to: Vec<Component<'_>> = normalized(to);

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in &to[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

// Drops `.` components; `..` is kept as-is since it cannot be resolved
// lexically without touching the filesystem.
fn normalized(path: &Path) -> Vec<Component<'_>> {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
