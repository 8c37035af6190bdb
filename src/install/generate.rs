//! Generated build files
//!
//! Content generators are pure; [`write_file`] and [`touch_file`] perform
//! the side effects and report them as events.

use std::fs::{self, OpenOptions};
use std::path::Path;

use crate::buckconfig::ConfigDocument;
use crate::error::{Error, Result};
use crate::events::{TouchFileEvent, WriteFileEvent};
use crate::layout::{self, GENERATED_HEADER};
use crate::lock::{RecipeIdentifier, ResolvedDependencyReference};
use crate::path::relative_path;

/// Section of `.buckconfig.local` that maps cell names to directories
pub const REPOSITORIES_SECTION: &str = "repositories";

/// Content of a `BUCKAROO_DEPS` file listing `references`.
///
/// Each entry is `<cell>//<path>:<target>`, defaulting to the target named
/// after the recipe at the cell root.
pub fn buckaroo_deps(references: &[ResolvedDependencyReference]) -> String {
    let mut content = String::from(GENERATED_HEADER);
    content.push_str("BUCKAROO_DEPS = [\n");
    for reference in references {
        content.push_str(&format!(
            "  '{}{}',\n",
            layout::folder_name(&reference.identifier),
            build_target(reference)
        ));
    }
    content.push_str("]\n");
    content
}

fn build_target(reference: &ResolvedDependencyReference) -> String {
    match reference.target.as_deref() {
        Some(target) if target.starts_with("//") => target.to_string(),
        Some(target) if target.starts_with(':') => format!("//{}", target),
        Some(target) => format!("//:{}", target),
        None => format!("//:{}", reference.identifier.recipe),
    }
}

/// `[repositories]` document for a `.buckconfig.local` in `directory`.
///
/// Values are relative to `directory`, so the project tree can be moved.
pub fn repositories<'a, I>(directory: &Path, project: &Path, identifiers: I) -> ConfigDocument
where
    I: IntoIterator<Item = &'a RecipeIdentifier>,
{
    identifiers.into_iter().fold(
        ConfigDocument::new().with_section(REPOSITORIES_SECTION),
        |document, identifier| {
            let entry = ConfigDocument::new().with_entry(
                REPOSITORIES_SECTION,
                layout::folder_name(identifier),
                relative_path(directory, &layout::dependency_directory(project, identifier)),
            );
            ConfigDocument::merge(&document, &entry)
        },
    )
}

/// Content of a `.buckconfig.local` in `directory`
pub fn buckconfig_local<'a, I>(directory: &Path, project: &Path, identifiers: I) -> String
where
    I: IntoIterator<Item = &'a RecipeIdentifier>,
{
    let mut content = String::from(GENERATED_HEADER);
    content.push_str(&repositories(directory, project, identifiers).serialize());
    content
}

/// Write `content` to `path`, replacing any previous content.
pub fn write_file(path: &Path, content: &str) -> Result<WriteFileEvent> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
    }
    fs::write(path, content).map_err(|e| Error::filesystem(path, e))?;
    Ok(WriteFileEvent {
        path: path.to_path_buf(),
    })
}

/// Create `path` if it does not exist. Existing content is left untouched.
pub fn touch_file(path: &Path) -> Result<TouchFileEvent> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::filesystem(path, e))?;
    Ok(TouchFileEvent {
        path: path.to_path_buf(),
    })
}
