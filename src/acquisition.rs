//! # Source Acquisition
//!
//! This module provides the [`Acquirer`] seam through which the installer
//! materializes dependency sources and auxiliary files, and
//! [`CachedAcquirer`], the implementation used by the binary.
//!
//! ## Design
//!
//! `CachedAcquirer` separates the caching policy from the transport that
//! actually moves bytes. The transport sits behind two traits:
//!
//! - **`GitOperations`**: mirror a repository, update a mirror, check for a
//!   commit, and check a commit out.
//! - **`DownloadOperations`**: download a URL and extract an archive.
//!
//! The defaults wrap the `git` and `curl` commands and unpack archives
//! in-process. Tests swap in doubles to exercise the caching policy without
//! touching the network.
//!
//! Pinned digests and archive sub-paths come from the lock file and are
//! checked before they are turned into paths, so neither can point outside
//! the cache or the extracted archive.
//!
//! Every materialization is built in a staging directory next to its
//! destination and renamed into place, so a destination either does not exist
//! or is complete. Cache entries are guarded by a per-key advisory lock so
//! concurrent runs, and concurrent workers of one run, fill each entry once.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::cache::{cache_key, DependencyCache};
use crate::download;
use crate::error::{Error, Result};
use crate::events::DownloadPhase;
use crate::lock::{ArchiveKind, RemoteFile, Source};

const STAGING_PREFIX: &str = ".buckaroo-staging-";

/// Shared flag that asks a run to stop at the next checkpoint
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Error::Cancelled)` once [`cancel`](Self::cancel) has been called
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Channel through which an acquisition reports its phases
pub struct Reporter<'a> {
    emit: &'a mut dyn FnMut(DownloadPhase),
    cancellation: &'a Cancellation,
}

impl<'a> Reporter<'a> {
    pub fn new(emit: &'a mut dyn FnMut(DownloadPhase), cancellation: &'a Cancellation) -> Self {
        Self { emit, cancellation }
    }

    pub fn report(&mut self, phase: DownloadPhase) {
        (self.emit)(phase);
    }

    pub fn check_cancelled(&self) -> Result<()> {
        self.cancellation.check()
    }
}

/// Materializes sources and files on disk.
///
/// Both operations are idempotent: when `destination` already exists they
/// return immediately without reporting anything.
pub trait Acquirer: Send + Sync {
    /// Populate the directory `destination` with the content of `source`.
    fn acquire(&self, source: &Source, destination: &Path, reporter: &mut Reporter<'_>)
        -> Result<()>;

    /// Write the remote file to `destination`.
    fn fetch_file(
        &self,
        file: &RemoteFile,
        destination: &Path,
        reporter: &mut Reporter<'_>,
    ) -> Result<()>;
}

/// Git transport used by [`CachedAcquirer`]
pub trait GitOperations: Send + Sync {
    /// Create a bare mirror of `url` at `mirror_dir`
    fn clone_mirror(&self, url: &str, mirror_dir: &Path) -> Result<()>;

    /// Update the mirror at `mirror_dir` from `url`
    fn fetch(&self, url: &str, mirror_dir: &Path) -> Result<()>;

    /// Whether the mirror contains `commit`
    fn has_commit(&self, mirror_dir: &Path, commit: &str) -> bool;

    /// Check `commit` out of the mirror into the new directory `target_dir`
    fn checkout(&self, mirror_dir: &Path, commit: &str, target_dir: &Path) -> Result<()>;
}

/// Download transport used by [`CachedAcquirer`]
pub trait DownloadOperations: Send + Sync {
    /// Download `url` to `destination`, returning the byte count
    fn download(&self, url: &str, destination: &Path) -> Result<u64>;

    /// Unpack `archive` into the existing directory `destination`
    fn extract(&self, archive: &Path, kind: ArchiveKind, destination: &Path) -> Result<()>;
}

/// Shells out to the system `git`
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn clone_mirror(&self, url: &str, mirror_dir: &Path) -> Result<()> {
        crate::git::clone_mirror(url, mirror_dir)
    }

    fn fetch(&self, url: &str, mirror_dir: &Path) -> Result<()> {
        crate::git::fetch(url, mirror_dir)
    }

    fn has_commit(&self, mirror_dir: &Path, commit: &str) -> bool {
        crate::git::has_commit(mirror_dir, commit)
    }

    fn checkout(&self, mirror_dir: &Path, commit: &str, target_dir: &Path) -> Result<()> {
        crate::git::checkout(mirror_dir, commit, target_dir)
    }
}

/// Shells out to `curl` and unpacks archives in-process
pub struct DefaultDownloadOperations;

impl DownloadOperations for DefaultDownloadOperations {
    fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        download::download(url, destination)
    }

    fn extract(&self, archive: &Path, kind: ArchiveKind, destination: &Path) -> Result<()> {
        download::extract(archive, kind, destination)
    }
}

/// [`Acquirer`] backed by the shared on-disk cache
pub struct CachedAcquirer {
    cache: DependencyCache,
    git_ops: Box<dyn GitOperations>,
    download_ops: Box<dyn DownloadOperations>,
}

impl CachedAcquirer {
    /// Acquirer using the system transport and the cache at `cache_root`
    pub fn new(cache_root: PathBuf) -> Self {
        Self::with_operations(
            cache_root,
            Box::new(DefaultGitOperations),
            Box::new(DefaultDownloadOperations),
        )
    }

    /// Acquirer with custom transport, mostly for tests
    pub fn with_operations(
        cache_root: PathBuf,
        git_ops: Box<dyn GitOperations>,
        download_ops: Box<dyn DownloadOperations>,
    ) -> Self {
        Self {
            cache: DependencyCache::new(cache_root),
            git_ops,
            download_ops,
        }
    }

    pub fn cache(&self) -> &DependencyCache {
        &self.cache
    }

    fn acquire_git(
        &self,
        url: &str,
        commit: &str,
        destination: &Path,
        reporter: &mut Reporter<'_>,
    ) -> Result<()> {
        let key = cache_key(url, None)?;
        let _lock = self.cache.lock(&key)?;
        let mirror = self.cache.git_mirror(&key);

        if !mirror.exists() {
            reporter.check_cancelled()?;
            reporter.report(DownloadPhase::Cloning);
            stage(&mirror, |staging| self.git_ops.clone_mirror(url, staging))?;
        } else if !self.git_ops.has_commit(&mirror, commit) {
            reporter.check_cancelled()?;
            reporter.report(DownloadPhase::Fetching);
            self.git_ops.fetch(url, &mirror)?;
        } else {
            reporter.report(DownloadPhase::CacheHit);
        }

        if !self.git_ops.has_commit(&mirror, commit) {
            return Err(Error::Transport {
                url: url.to_string(),
                message: format!("commit {} not found", commit),
            });
        }

        reporter.check_cancelled()?;
        reporter.report(DownloadPhase::CheckingOut);
        stage(destination, |staging| {
            self.git_ops.checkout(&mirror, commit, staging)
        })
    }

    fn acquire_archive(
        &self,
        url: &str,
        kind: ArchiveKind,
        sha256: Option<&str>,
        sub_path: Option<&str>,
        destination: &Path,
        reporter: &mut Reporter<'_>,
    ) -> Result<()> {
        let key = cache_key(url, sha256)?;
        let sub_path = sub_path.map(|p| archive_sub_path(url, p)).transpose()?;
        let _lock = self.cache.lock(&key)?;
        let extracted = self.cache.archive(&key);

        if extracted.exists() {
            reporter.report(DownloadPhase::CacheHit);
        } else {
            let archive = self.cache.download(&key, kind.extension());
            if !archive.exists() {
                self.download_verified(url, sha256, &archive, reporter)?;
            }

            reporter.check_cancelled()?;
            reporter.report(DownloadPhase::Extracting);
            stage(&extracted, |staging| {
                fs::create_dir_all(staging).map_err(|e| Error::filesystem(staging, e))?;
                self.download_ops.extract(&archive, kind, staging)
            })?;
        }

        let root = match sub_path {
            Some(sub_path) => extracted.join(sub_path),
            None => extracted,
        };
        if !root.is_dir() {
            return Err(Error::Transport {
                url: url.to_string(),
                message: format!(
                    "archive does not contain {}",
                    sub_path.map(|p| p.display().to_string()).unwrap_or_default()
                ),
            });
        }

        reporter.check_cancelled()?;
        reporter.report(DownloadPhase::Copying);
        stage(destination, |staging| {
            download::copy_dir_recursive(&root, staging)
        })
    }

    /// Download into `target` through a temporary file, checking the digest
    /// before the file becomes visible.
    fn download_verified(
        &self,
        url: &str,
        sha256: Option<&str>,
        target: &Path,
        reporter: &mut Reporter<'_>,
    ) -> Result<()> {
        let parent = parent_of(target)?;
        fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;

        reporter.check_cancelled()?;
        reporter.report(DownloadPhase::Downloading);
        let partial = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(parent)
            .map_err(|e| Error::filesystem(parent, e))?;
        let bytes = self.download_ops.download(url, partial.path())?;
        reporter.report(DownloadPhase::Downloaded { bytes });

        if let Some(expected) = sha256 {
            reporter.report(DownloadPhase::Verifying);
            download::verify_sha256(url, partial.path(), expected)?;
        }

        partial
            .persist(target)
            .map_err(|e| Error::filesystem(target, e.error))?;
        Ok(())
    }
}

impl Acquirer for CachedAcquirer {
    fn acquire(
        &self,
        source: &Source,
        destination: &Path,
        reporter: &mut Reporter<'_>,
    ) -> Result<()> {
        if destination.exists() {
            return Ok(());
        }

        debug!("acquiring {} into {}", source.url(), destination.display());
        match source {
            Source::GitCommit { url, commit } => {
                self.acquire_git(url, commit, destination, reporter)?
            }
            Source::RemoteArchive {
                url,
                kind,
                sha256,
                sub_path,
            } => self.acquire_archive(
                url,
                *kind,
                sha256.as_deref(),
                sub_path.as_deref(),
                destination,
                reporter,
            )?,
        }

        reporter.report(DownloadPhase::Complete);
        info!("acquired {}", source.url());
        Ok(())
    }

    fn fetch_file(
        &self,
        file: &RemoteFile,
        destination: &Path,
        reporter: &mut Reporter<'_>,
    ) -> Result<()> {
        if destination.exists() {
            return Ok(());
        }

        let key = cache_key(&file.url, file.sha256.as_deref())?;
        {
            let _lock = self.cache.lock(&key)?;
            let cached = self.cache.file(&key);
            if cached.exists() {
                reporter.report(DownloadPhase::CacheHit);
            } else {
                self.download_verified(&file.url, file.sha256.as_deref(), &cached, reporter)?;
            }

            reporter.check_cancelled()?;
            reporter.report(DownloadPhase::Copying);
            let parent = parent_of(destination)?;
            fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
            let copy = tempfile::Builder::new()
                .prefix(STAGING_PREFIX)
                .tempfile_in(parent)
                .map_err(|e| Error::filesystem(parent, e))?;
            fs::copy(&cached, copy.path()).map_err(|e| Error::filesystem(copy.path(), e))?;
            copy.persist(destination)
                .map_err(|e| Error::filesystem(destination, e.error))?;
        }

        reporter.report(DownloadPhase::Complete);
        Ok(())
    }
}

/// `sub_path` as a relative path that stays inside the extracted archive
fn archive_sub_path<'a>(url: &str, sub_path: &'a str) -> Result<&'a Path> {
    let path = Path::new(sub_path);
    if path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        Ok(path)
    } else {
        Err(Error::Transport {
            url: url.to_string(),
            message: format!("sub_path {:?} leaves the archive", sub_path),
        })
    }
}

fn parent_of(path: &Path) -> Result<&Path> {
    path.parent().ok_or_else(|| Error::Filesystem {
        path: path.to_path_buf(),
        message: "path has no parent directory".to_string(),
    })
}

/// Build `destination` in a sibling staging directory, then rename it into
/// place. `fill` receives a path that does not exist yet.
fn stage<F>(destination: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let parent = parent_of(destination)?;
    fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(parent)
        .map_err(|e| Error::filesystem(parent, e))?;
    let content = staging.path().join("content");
    fill(&content)?;

    match fs::rename(&content, destination) {
        Ok(()) => Ok(()),
        // Another worker finished first
        Err(_) if destination.exists() => Ok(()),
        Err(e) => Err(Error::filesystem(destination, e)),
    }
}
