//! On-disk layout of an installed project
//!
//! Every path the installer reads or writes is derived here, so that the
//! installer and anything that needs to locate an installed dependency agree
//! on one set of names:
//!
//! ```text
//! <project>/
//!   buckaroo.lock.json
//!   BUCKAROO_DEPS
//!   .buckconfig
//!   .buckconfig.local
//!   buckaroo/<source|official>/<organization>/<recipe>/
//!     BUCKFILE
//!     BUCKAROO_DEPS
//!     .buckconfig
//!     .buckconfig.local
//! ```

use std::path::{Path, PathBuf};

use crate::lock::RecipeIdentifier;

/// Lock file produced by resolution
pub const LOCK_FILE: &str = "buckaroo.lock.json";

/// Directory under the project that holds installed dependencies
pub const DEPENDENCY_ROOT: &str = "buckaroo";

/// Source directory name for identifiers without an explicit source
pub const OFFICIAL_SOURCE: &str = "official";

/// Build descriptor fetched for dependencies that do not ship one
pub const BUCK_FILE: &str = "BUCKFILE";

/// Generated list of a directory's dependencies
pub const MANIFEST_FILE: &str = "BUCKAROO_DEPS";

/// Buck configuration marker
pub const BUCKCONFIG: &str = ".buckconfig";

/// Generated Buck configuration override
pub const BUCKCONFIG_LOCAL: &str = ".buckconfig.local";

/// Header written at the top of every generated file
pub const GENERATED_HEADER: &str = "# Generated by Buckaroo, do not edit!\n\
                                    # This file should not be tracked in source-control.\n";

pub fn lock_file(project_directory: &Path) -> PathBuf {
    project_directory.join(LOCK_FILE)
}

pub fn dependency_root(project_directory: &Path) -> PathBuf {
    project_directory.join(DEPENDENCY_ROOT)
}

/// Directory a dependency is installed into:
/// `<project>/buckaroo/<source|official>/<organization>/<recipe>`
pub fn dependency_directory(project_directory: &Path, identifier: &RecipeIdentifier) -> PathBuf {
    dependency_root(project_directory)
        .join(identifier.source.as_deref().unwrap_or(OFFICIAL_SOURCE))
        .join(&identifier.organization)
        .join(&identifier.recipe)
}

/// Name Buck uses for a dependency's cell: `<source|official>.<organization>.<recipe>`
///
/// Parsed identifiers have no `.` in any segment, so distinct install
/// directories get distinct cell names.
pub fn folder_name(identifier: &RecipeIdentifier) -> String {
    format!(
        "{}.{}.{}",
        identifier.source.as_deref().unwrap_or(OFFICIAL_SOURCE),
        identifier.organization,
        identifier.recipe
    )
}
