//! Buck configuration documents
//!
//! This module models the section/key/value format Buck reads from
//! `.buckconfig` and `.buckconfig.local`, and provides the three operations
//! the installer needs: parsing text into a [`ConfigDocument`], merging two
//! documents with override semantics, and serializing back to text.
//!
//! ## Format
//!
//! - Section headers: `[section_name]`
//! - Key-value pairs: `key = value` (split on the first `=`, both sides trimmed)
//! - Comments: lines starting with `#` or `;`
//! - A repeated section header reopens the same section; a repeated key
//!   overwrites the earlier value.
//!
//! Entries that appear before any section header have nowhere to go and are
//! dropped. They are reported as [`ParseWarning`]s rather than discarded
//! silently.
//!
//! ## Example
//!
//! ```
//! use buckaroo::buckconfig::ConfigDocument;
//!
//! let base = ConfigDocument::parse("[repositories]\n  fmt = ../fmt\n");
//! let local = ConfigDocument::parse("[repositories]\n  fmt = vendor/fmt\n");
//! let merged = ConfigDocument::merge(&base, &local);
//!
//! assert_eq!(merged.get("repositories", "fmt"), Some("vendor/fmt"));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use log::warn;

/// Key-value entries of one section, ordered by key
pub type Section = BTreeMap<String, String>;

/// An in-memory Buck configuration document.
///
/// Documents are values: [`ConfigDocument::merge`] and
/// [`ConfigDocument::with_entry`] build new documents and never touch their
/// inputs, so a document can be shared freely between concurrent installers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    sections: BTreeMap<String, Section>,
}

/// A line the parser could not place in the document
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseWarning {
    /// A non-comment line appeared before the first section header.
    EntryBeforeSection { line: usize, content: String },
    /// A line inside a section has no `=` separator.
    MissingSeparator {
        line: usize,
        section: String,
        content: String,
    },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseWarning::EntryBeforeSection { line, content } => {
                write!(f, "line {}: {:?} appears before any section header and was ignored", line, content)
            }
            ParseWarning::MissingSeparator {
                line,
                section,
                content,
            } => write!(
                f,
                "line {} in [{}]: {:?} has no '=' and was ignored",
                line, section, content
            ),
        }
    }
}

impl ConfigDocument {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration text, logging any ignored lines.
    pub fn parse(content: &str) -> Self {
        let (document, warnings) = Self::parse_with_warnings(content);
        for warning in &warnings {
            warn!("buckconfig: {}", warning);
        }
        document
    }

    /// Parse configuration text, returning the lines that were ignored
    /// alongside the document.
    pub fn parse_with_warnings(content: &str) -> (Self, Vec<ParseWarning>) {
        let mut sections: BTreeMap<String, Section> = BTreeMap::new();
        let mut warnings = Vec::new();
        let mut current: Option<String> = None;

        for (index, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if let Some(name) = section_header(trimmed) {
                sections.entry(name.to_string()).or_default();
                current = Some(name.to_string());
                continue;
            }

            let Some(section) = current.as_ref() else {
                warnings.push(ParseWarning::EntryBeforeSection {
                    line: index + 1,
                    content: trimmed.to_string(),
                });
                continue;
            };

            match trimmed.split_once('=') {
                Some((key, value)) => {
                    sections
                        .entry(section.clone())
                        .or_default()
                        .insert(key.trim().to_string(), value.trim().to_string());
                }
                None => warnings.push(ParseWarning::MissingSeparator {
                    line: index + 1,
                    section: section.clone(),
                    content: trimmed.to_string(),
                }),
            }
        }

        (Self { sections }, warnings)
    }

    /// Merge `override_doc` on top of `base`.
    ///
    /// The result holds every section of both inputs. Within a shared
    /// section, keys from `override_doc` replace same-named keys from `base`;
    /// keys only in `base` survive unchanged.
    pub fn merge(base: &ConfigDocument, override_doc: &ConfigDocument) -> ConfigDocument {
        let mut sections = base.sections.clone();
        for (name, entries) in &override_doc.sections {
            let merged = sections.entry(name.clone()).or_default();
            for (key, value) in entries {
                merged.insert(key.clone(), value.clone());
            }
        }
        ConfigDocument { sections }
    }

    /// Return a copy of this document with one entry set.
    pub fn with_entry(
        mut self,
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.sections
            .entry(section.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Return a copy of this document with an (empty) section present.
    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.sections.entry(section.into()).or_default();
        self
    }

    /// Look up a value
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }

    /// Look up a whole section
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// Iterate over sections in name order
    pub fn sections(&self) -> impl Iterator<Item = (&str, &Section)> {
        self.sections.iter().map(|(name, entries)| (name.as_str(), entries))
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Serialize to Buck configuration text.
    ///
    /// Each section is written as a `[name]` header followed by indented
    /// `key = value` lines; sections are separated by a blank line.
    pub fn serialize(&self) -> String {
        let mut output = String::new();

        for (index, (name, entries)) in self.sections.iter().enumerate() {
            if index > 0 {
                output.push('\n');
            }
            output.push('[');
            output.push_str(name);
            output.push_str("]\n");

            for (key, value) in entries {
                output.push_str("  ");
                output.push_str(key);
                output.push_str(" = ");
                output.push_str(value);
                output.push('\n');
            }
        }

        output
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

fn section_header(trimmed: &str) -> Option<&str> {
    let inner = trimmed.strip_prefix('[')?.strip_suffix(']')?.trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner)
    }
}
