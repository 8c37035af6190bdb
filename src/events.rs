//! Progress events emitted by an install run
//!
//! Events are immutable snapshots. [`DependencyInstallationProgress`] in
//! particular is a point-in-time aggregate: each one replaces the previous
//! one rather than adding to it.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::lock::{DependencyLockSet, RecipeIdentifier};

/// Stage reached by an acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    /// Cloning a repository into the cache for the first time
    Cloning,
    /// Updating a cached repository that lacks the pinned commit
    Fetching,
    /// Downloading a file or archive
    Downloading,
    /// Download finished, `bytes` were transferred
    Downloaded { bytes: u64 },
    /// Checking a download against its pinned digest
    Verifying,
    /// Unpacking an archive into the cache
    Extracting,
    /// Checking out the pinned commit
    CheckingOut,
    /// Copying cached content into place
    Copying,
    /// Content was already in the cache
    CacheHit,
    /// Content is in place
    Complete,
}

impl fmt::Display for DownloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadPhase::Cloning => f.write_str("cloning"),
            DownloadPhase::Fetching => f.write_str("fetching"),
            DownloadPhase::Downloading => f.write_str("downloading"),
            DownloadPhase::Downloaded { bytes } => write!(f, "downloaded {} bytes", bytes),
            DownloadPhase::Verifying => f.write_str("verifying"),
            DownloadPhase::Extracting => f.write_str("extracting"),
            DownloadPhase::CheckingOut => f.write_str("checking out"),
            DownloadPhase::Copying => f.write_str("copying"),
            DownloadPhase::CacheHit => f.write_str("cached"),
            DownloadPhase::Complete => f.write_str("done"),
        }
    }
}

/// The lock file was read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadLockFileEvent {
    pub locks: DependencyLockSet,
}

/// Acquisition progress for one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub identifier: RecipeIdentifier,
    /// What was being fetched, `None` for the source tree
    pub file: Option<PathBuf>,
    pub phase: DownloadPhase,
}

/// Latest download progress of every dependency that has reported any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyInstallationProgress {
    pub progress: BTreeMap<RecipeIdentifier, DownloadProgress>,
}

impl DependencyInstallationProgress {
    /// Number of dependencies whose latest event is [`DownloadPhase::Complete`]
    pub fn completed(&self) -> usize {
        self.progress
            .values()
            .filter(|p| p.phase == DownloadPhase::Complete)
            .count()
    }
}

/// A generated file was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFileEvent {
    pub path: PathBuf,
}

/// A marker file was touched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchFileEvent {
    pub path: PathBuf,
}

/// Everything an install run reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ReadLockFile(ReadLockFileEvent),
    DownloadProgress(DownloadProgress),
    DependencyInstallationProgress(DependencyInstallationProgress),
    WriteFile(WriteFileEvent),
    TouchFile(TouchFileEvent),
}

impl From<ReadLockFileEvent> for Event {
    fn from(event: ReadLockFileEvent) -> Self {
        Event::ReadLockFile(event)
    }
}

impl From<DownloadProgress> for Event {
    fn from(event: DownloadProgress) -> Self {
        Event::DownloadProgress(event)
    }
}

impl From<DependencyInstallationProgress> for Event {
    fn from(event: DependencyInstallationProgress) -> Self {
        Event::DependencyInstallationProgress(event)
    }
}

impl From<WriteFileEvent> for Event {
    fn from(event: WriteFileEvent) -> Self {
        Event::WriteFile(event)
    }
}

impl From<TouchFileEvent> for Event {
    fn from(event: TouchFileEvent) -> Self {
        Event::TouchFile(event)
    }
}
