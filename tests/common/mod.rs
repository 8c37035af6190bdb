//! Shared test utilities for integration and E2E tests.
//!
//! This module provides project fixtures and test doubles for the two
//! collaborators of the install engine: an acquirer that counts calls and
//! simulates variable latency, and a resolver that writes a prepared lock
//! file.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = ProjectFixture::new().with_lock(&locks::chain());
//! let acquirer = Arc::new(CountingAcquirer::new());
//! ```

#![allow(dead_code)]

use std::env;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use assert_fs::prelude::*;
use buckaroo::acquisition::{Acquirer, Reporter};
use buckaroo::error::{Error, Result};
use buckaroo::events::{DownloadPhase, Event};
use buckaroo::lock::{RemoteFile, Source};
use buckaroo::resolver::Resolver;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    pub use super::locks;
    pub use super::should_skip_network_tests;
    pub use super::{CountingAcquirer, LockWritingResolver, ProjectFixture};
}

/// Lock file snippets for testing.
pub mod locks {
    /// One lock entry fetched from git, with optional dependencies.
    pub fn git_entry(identifier: &str, dependencies: &[&str]) -> String {
        let deps: Vec<String> = dependencies
            .iter()
            .map(|d| format!(r#"{{ "identifier": "{}" }}"#, d))
            .collect();
        format!(
            r#""{id}": {{
    "source": {{ "type": "git", "url": "https://example.com/{id}.git", "commit": "c0ffee" }},
    "buck": {{ "url": "https://example.com/{id}/BUCK" }},
    "dependencies": [{deps}]
  }}"#,
            id = identifier,
            deps = deps.join(", ")
        )
    }

    /// A lock file made of `entries`.
    pub fn lock_file(entries: &[String]) -> String {
        format!("{{\n  {}\n}}\n", entries.join(",\n  "))
    }

    /// `org/a` depends on `github+org/b`.
    pub fn chain() -> String {
        lock_file(&[
            git_entry("org/a", &["github+org/b"]),
            git_entry("github+org/b", &[]),
        ])
    }

    /// `count` independent entries `org/dep0` .. `org/dep{count-1}`.
    pub fn independent(count: usize) -> String {
        let entries: Vec<String> = (0..count)
            .map(|i| git_entry(&format!("org/dep{}", i), &[]))
            .collect();
        lock_file(&entries)
    }
}

/// Check if network tests should be skipped.
pub fn should_skip_network_tests() -> bool {
    env::var("SKIP_NETWORK_TESTS").is_ok()
}

/// A temporary project directory.
pub struct ProjectFixture {
    temp_dir: assert_fs::TempDir,
}

impl ProjectFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add `buckaroo.lock.json` with the given content.
    pub fn with_lock(self, content: &str) -> Self {
        self.temp_dir
            .child("buckaroo.lock.json")
            .write_str(content)
            .expect("Failed to write lock file");
        self
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Read a file relative to the project, panicking if it is missing.
    pub fn read(&self, path: &str) -> String {
        fs::read_to_string(self.path().join(path))
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path, e))
    }

    /// Create a command for the buckaroo binary running in this project.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("buckaroo");
        cmd.current_dir(self.path());
        cmd.env_remove("BUCKAROO_RESOLVER");
        cmd.env("BUCKAROO_CACHE", self.path().join(".cache"));
        cmd
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Acquirer that creates directories instead of downloading.
///
/// Every call is counted. Latency varies per source so concurrent installs
/// finish in a different order than they started.
pub struct CountingAcquirer {
    acquire_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    acquired: Mutex<Vec<String>>,
    failing: Mutex<Vec<String>>,
    latency: Duration,
}

impl CountingAcquirer {
    pub fn new() -> Self {
        Self {
            acquire_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            acquired: Mutex::new(Vec::new()),
            failing: Mutex::new(Vec::new()),
            latency: Duration::from_millis(2),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make acquisitions of URLs containing `pattern` fail.
    pub fn failing_on(self, pattern: &str) -> Self {
        self.failing.lock().unwrap().push(pattern.to_string());
        self
    }

    /// Stop failing; later calls succeed.
    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn acquired(&self) -> Vec<String> {
        self.acquired.lock().unwrap().clone()
    }

    fn delay_for(&self, url: &str) -> Duration {
        let spread = url.bytes().map(u32::from).sum::<u32>() % 5 + 1;
        self.latency * spread
    }
}

impl Default for CountingAcquirer {
    fn default() -> Self {
        Self::new()
    }
}

impl Acquirer for CountingAcquirer {
    fn acquire(&self, source: &Source, destination: &Path, reporter: &mut Reporter<'_>) -> Result<()> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|pattern| source.url().contains(pattern.as_str()))
        {
            return Err(Error::Transport {
                url: source.url().to_string(),
                message: "connection reset".to_string(),
            });
        }

        let delay = self.delay_for(source.url());
        reporter.report(DownloadPhase::Downloading);
        thread::sleep(delay);
        reporter.check_cancelled()?;
        reporter.report(DownloadPhase::Downloaded { bytes: 1024 });
        thread::sleep(delay);

        fs::create_dir_all(destination).expect("Failed to create destination");
        fs::write(destination.join("include.h"), "#pragma once\n").expect("Failed to write source");
        self.acquired.lock().unwrap().push(source.url().to_string());
        reporter.report(DownloadPhase::Complete);
        Ok(())
    }

    fn fetch_file(&self, file: &RemoteFile, destination: &Path, reporter: &mut Reporter<'_>) -> Result<()> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        fs::write(destination, format!("# fetched from {}\n", file.url))
            .expect("Failed to write file");
        reporter.report(DownloadPhase::Complete);
        Ok(())
    }
}

/// Resolver that writes a prepared lock file and counts invocations.
pub struct LockWritingResolver {
    content: Option<String>,
    calls: AtomicUsize,
}

impl LockWritingResolver {
    pub fn new(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A resolver that succeeds without writing anything.
    pub fn silent() -> Self {
        Self {
            content: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Resolver for LockWritingResolver {
    fn resolve_dependencies(&self, project: &Path, _emit: &mut dyn FnMut(Event)) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(content) = &self.content {
            fs::write(project.join("buckaroo.lock.json"), content)
                .map_err(|e| Error::filesystem(project, e))?;
        }
        Ok(())
    }
}
