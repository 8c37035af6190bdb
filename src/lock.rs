//! # Lock File Model
//!
//! This module defines the pinned dependency set produced by resolution and
//! consumed by the installer, together with the logic for reading it from
//! `buckaroo.lock.json`.
//!
//! ## Key Components
//!
//! - **`RecipeIdentifier`**: names a recipe as `[source+]organization/recipe`.
//!   Segments never contain `.`, so each identifier has its own Buck cell name.
//! - **`Source`**: how to fetch one unit of content, either a git commit or a
//!   remote archive.
//! - **`ResolvedDependency`**: one pinned install target with its auxiliary
//!   BUCK file and its already-flattened transitive references.
//! - **`DependencyLockSet`**: the whole lock file, unique by install
//!   directory. `org/x` and `official+org/x` count as the same entry, and a
//!   repeated JSON key is an error rather than last-wins.
//!
//! ## File format
//!
//! The lock file is a JSON object keyed by identifier text:
//!
//! ```json
//! {
//!   "github+loopperfect/neither": {
//!     "source": { "type": "git", "url": "https://github.com/loopperfect/neither.git", "commit": "9d8a6c3" },
//!     "target": "//:neither",
//!     "buck": { "url": "https://example.com/neither/BUCK", "sha256": null },
//!     "dependencies": [ { "identifier": "fmtlib/fmt" } ]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::download::normalize_sha256;
use crate::error::{Error, Result};
use crate::layout;

static IDENTIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([A-Za-z0-9][A-Za-z0-9_-]*)\+)?([A-Za-z0-9][A-Za-z0-9_-]*)/([A-Za-z0-9][A-Za-z0-9_-]*)$")
        .expect("identifier pattern is valid")
});

/// Identifies a recipe: optional source registry, organization and recipe name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecipeIdentifier {
    pub source: Option<String>,
    pub organization: String,
    pub recipe: String,
}

impl RecipeIdentifier {
    pub fn new(source: Option<&str>, organization: &str, recipe: &str) -> Self {
        Self {
            source: source.map(str::to_string),
            organization: organization.to_string(),
            recipe: recipe.to_string(),
        }
    }

    /// An identifier in the official registry
    pub fn official(organization: &str, recipe: &str) -> Self {
        Self::new(None, organization, recipe)
    }
}

impl fmt::Display for RecipeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{}+", source)?;
        }
        write!(f, "{}/{}", self.organization, self.recipe)
    }
}

impl FromStr for RecipeIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let captures = IDENTIFIER_PATTERN
            .captures(s.trim())
            .ok_or_else(|| Error::InvalidIdentifier {
                input: s.to_string(),
            })?;
        Ok(Self {
            source: captures.get(1).map(|m| m.as_str().to_string()),
            organization: captures[2].to_string(),
            recipe: captures[3].to_string(),
        })
    }
}

impl TryFrom<String> for RecipeIdentifier {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RecipeIdentifier> for String {
    fn from(value: RecipeIdentifier) -> Self {
        value.to_string()
    }
}

/// Archive formats a remote archive may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArchiveKind {
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "tar.gz")]
    TarGz,
}

impl ArchiveKind {
    /// File extension used for the downloaded archive
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::TarGz => "tar.gz",
        }
    }
}

/// How to fetch one unit of content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Source {
    /// A commit of a git repository
    #[serde(rename = "git")]
    GitCommit { url: String, commit: String },
    /// An archive downloaded over HTTP(S)
    #[serde(rename = "archive")]
    RemoteArchive {
        url: String,
        kind: ArchiveKind,
        /// Expected SHA-256 of the archive, hex encoded
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sha256: Option<String>,
        /// Directory inside the archive that holds the recipe
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sub_path: Option<String>,
    },
}

impl Source {
    pub fn url(&self) -> &str {
        match self {
            Source::GitCommit { url, .. } | Source::RemoteArchive { url, .. } => url,
        }
    }
}

/// A single remote file, optionally pinned by digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// How one dependency refers to another installed dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependencyReference {
    pub identifier: RecipeIdentifier,
    /// Build target inside the referenced dependency, e.g. `//:fmt`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl ResolvedDependencyReference {
    pub fn new(identifier: RecipeIdentifier, target: Option<String>) -> Self {
        Self { identifier, target }
    }
}

/// One concrete, pinned install target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    pub source: Source,
    /// Build target the project depends on, e.g. `//:neither`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// BUCK file to fetch if the source tree does not ship one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buck: Option<RemoteFile>,
    #[serde(default)]
    pub dependencies: Vec<ResolvedDependencyReference>,
}

impl ResolvedDependency {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            target: None,
            buck: None,
            dependencies: Vec::new(),
        }
    }
}

/// One row of the lock file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyLock {
    pub identifier: RecipeIdentifier,
    pub origin: ResolvedDependency,
}

impl DependencyLock {
    pub fn new(identifier: RecipeIdentifier, origin: ResolvedDependency) -> Self {
        Self { identifier, origin }
    }
}

/// The full lock file, ordered by identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(into = "BTreeMap<RecipeIdentifier, ResolvedDependency>")]
pub struct DependencyLockSet {
    entries: Vec<DependencyLock>,
}

impl DependencyLockSet {
    /// Build a lock set.
    ///
    /// Two entries that would install into the same directory are a
    /// [`Error::DuplicateLock`]. Pinned digests must be hex SHA-256.
    pub fn new(locks: Vec<DependencyLock>) -> Result<Self> {
        let mut by_folder = BTreeMap::new();
        for lock in locks {
            check_digests(&lock.origin)?;
            let folder = layout::folder_name(&lock.identifier);
            if by_folder.contains_key(&folder) {
                return Err(Error::DuplicateLock {
                    identifier: lock.identifier.to_string(),
                });
            }
            by_folder.insert(folder, lock);
        }

        let mut entries: Vec<DependencyLock> = by_folder.into_values().collect();
        entries.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[DependencyLock] {
        &self.entries
    }

    pub fn get(&self, identifier: &RecipeIdentifier) -> Option<&DependencyLock> {
        self.entries.iter().find(|lock| &lock.identifier == identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// References to every top-level entry, as written to the project manifest
    pub fn references(&self) -> Vec<ResolvedDependencyReference> {
        self.entries
            .iter()
            .map(|lock| {
                ResolvedDependencyReference::new(lock.identifier.clone(), lock.origin.target.clone())
            })
            .collect()
    }
}

fn check_digests(origin: &ResolvedDependency) -> Result<()> {
    if let Source::RemoteArchive {
        sha256: Some(digest),
        ..
    } = &origin.source
    {
        normalize_sha256(digest)?;
    }
    if let Some(RemoteFile {
        sha256: Some(digest),
        ..
    }) = &origin.buck
    {
        normalize_sha256(digest)?;
    }
    Ok(())
}

impl<'de> Deserialize<'de> for DependencyLockSet {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct LockSetVisitor;

        impl<'de> Visitor<'de> for LockSetVisitor {
            type Value = DependencyLockSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from recipe identifier to resolved dependency")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut locks = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((identifier, origin)) =
                    map.next_entry::<RecipeIdentifier, ResolvedDependency>()?
                {
                    locks.push(DependencyLock::new(identifier, origin));
                }
                DependencyLockSet::new(locks).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_map(LockSetVisitor)
    }
}

impl From<DependencyLockSet> for BTreeMap<RecipeIdentifier, ResolvedDependency> {
    fn from(set: DependencyLockSet) -> Self {
        set.entries
            .into_iter()
            .map(|lock| (lock.identifier, lock.origin))
            .collect()
    }
}

/// Parse lock file content
pub fn parse(json: &str) -> Result<DependencyLockSet> {
    Ok(serde_json::from_str(json)?)
}

/// Read and parse a lock file from disk.
///
/// Any failure is reported as [`Error::LockFile`] carrying the path.
pub fn from_file(path: &Path) -> Result<DependencyLockSet> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::LockFile {
        path: path.to_path_buf(),
        message: e.to_string(),
        hint: None,
    })?;
    parse(&content).map_err(|e| Error::LockFile {
        path: path.to_path_buf(),
        message: e.to_string(),
        hint: Some("The lock file is generated by `buckaroo resolve`; regenerate it".to_string()),
    })
}
