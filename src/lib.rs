//! # Buckaroo Install Engine
//!
//! This library turns a resolved, pinned dependency set (`buckaroo.lock.json`)
//! into a working local project layout for the Buck build tool. It is used by
//! the `buckaroo` command-line tool but can be embedded anywhere a project
//! needs its C/C++ dependencies materialized.
//!
//! ## Quick Example
//!
//! ```
//! use buckaroo::buckconfig::ConfigDocument;
//!
//! let base = ConfigDocument::parse("[repositories]\n  a = buckaroo/official/org/a\n");
//! let extra = ConfigDocument::new().with_entry("repositories", "b", "buckaroo/official/org/b");
//!
//! let merged = ConfigDocument::merge(&base, &extra);
//! assert_eq!(merged.get("repositories", "a"), Some("buckaroo/official/org/a"));
//! assert_eq!(merged.get("repositories", "b"), Some("buckaroo/official/org/b"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Lock file (`lock`)**: recipe identifiers, sources (git commit or remote
//!   archive) and the flattened dependency references of every entry.
//! - **Configuration model (`buckconfig`)**: parse, merge and serialize Buck's
//!   section/key/value configuration files.
//! - **Acquisition (`acquisition`, `cache`, `git`, `download`)**: idempotently
//!   materialize a source or file into a directory, backed by a shared cache.
//! - **Events (`events`)**: the progress reported by an install run.
//! - **Installation (`install`)**: the per-dependency installer and the
//!   orchestrator that runs them concurrently.
//! - **Layout (`layout`)**: every file and directory name the installer uses.
//!
//! ## Execution Flow
//!
//! [`install::Installer::install_existing_dependencies`] runs these steps:
//!
//! 1.  **Check lock**: resolve first if `buckaroo.lock.json` is missing.
//! 2.  **Read lock**: parse the lock file and report it.
//! 3.  **Install all**: install every entry on a bounded worker pool,
//!     reporting aggregate progress after every download update.
//! 4.  **Finalize**: write the project's `BUCKAROO_DEPS`, `.buckconfig` and
//!     `.buckconfig.local`.

pub mod acquisition;
pub mod buckconfig;
pub mod cache;
pub mod defaults;
pub mod download;
pub mod error;
pub mod events;
pub mod git;
pub mod install;
pub mod layout;
pub mod lock;
pub mod output;
pub mod path;
pub mod resolver;

#[cfg(test)]
mod buckconfig_proptest;
#[cfg(test)]
mod path_proptest;
