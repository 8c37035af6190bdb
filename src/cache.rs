//! On-disk cache shared by install runs
//!
//! ```text
//! <cache_root>/
//!   git/<key>/            bare mirror of a repository
//!   downloads/<key>.<ext> downloaded archive
//!   archives/<key>/       extracted archive
//!   files/<key>           downloaded single file
//!   locks/<key>.lock      advisory lock guarding every entry of <key>
//! ```
//!
//! A key is the pinned SHA-256 when one is known, otherwise the SHA-256 of the
//! normalized URL, so the same origin always maps to the same entry. Keys are
//! always 64 hex digits and never leave the cache root.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::debug;
use sha2::{Digest, Sha256};
use url::Url;

use crate::download::normalize_sha256;
use crate::error::{Error, Result};

/// Paths and locks of the shared cache
#[derive(Debug, Clone)]
pub struct DependencyCache {
    root: PathBuf,
}

impl DependencyCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn git_mirror(&self, key: &str) -> PathBuf {
        self.root.join("git").join(key)
    }

    pub fn download(&self, key: &str, extension: &str) -> PathBuf {
        self.root
            .join("downloads")
            .join(format!("{}.{}", key, extension))
    }

    pub fn archive(&self, key: &str) -> PathBuf {
        self.root.join("archives").join(key)
    }

    pub fn file(&self, key: &str) -> PathBuf {
        self.root.join("files").join(key)
    }

    /// Block until this process holds the exclusive lock for `key`.
    pub fn lock(&self, key: &str) -> Result<CacheLock> {
        let dir = self.root.join("locks");
        fs::create_dir_all(&dir).map_err(|e| Error::filesystem(&dir, e))?;

        let path = dir.join(format!("{}.lock", key));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::filesystem(&path, e))?;

        debug!("waiting for cache lock {}", path.display());
        file.lock_exclusive()
            .map_err(|e| Error::filesystem(&path, e))?;

        Ok(CacheLock { file, path })
    }
}

/// Exclusive hold on one cache key, released on drop.
///
/// The lock file itself is left in place; removing it would let a waiter
/// and a newcomer lock two different inodes.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Cache key for content at `url`, preferring the pinned digest.
///
/// Fails with [`Error::InvalidDigest`] if the pinned digest is not a SHA-256.
pub fn cache_key(url: &str, sha256: Option<&str>) -> Result<String> {
    match sha256 {
        Some(digest) => normalize_sha256(digest),
        None => Ok(format!("{:x}", Sha256::digest(normalize_url(url).as_bytes()))),
    }
}

/// Normalize a URL so trivially different spellings share a cache entry.
///
/// Strings that are not absolute URLs (scp-style git remotes, local paths)
/// are used as-is.
fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            let path = parsed.path().trim_end_matches('/').to_string();
            if !path.is_empty() {
                parsed.set_path(&path);
            }
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}
