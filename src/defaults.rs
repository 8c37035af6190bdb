//! Default values for install configuration.
//!
//! This module provides centralized default values used by the CLI and the
//! library, ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Upper bound on concurrent dependency installs when `--jobs` is not given.
pub const MAX_DEFAULT_JOBS: usize = 8;

/// Returns the default cache root directory.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/buckaroo` (XDG Base Directory)
/// - macOS: `~/Library/Caches/buckaroo`
/// - Windows: `{FOLDERID_LocalAppData}\buckaroo`
///
/// Falls back to `.buckaroo-cache` in the current directory if the
/// platform cache directory cannot be determined.
///
/// This can be overridden by the `--cache-root` CLI flag or the
/// `BUCKAROO_CACHE` environment variable.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".buckaroo-cache"))
        .join("buckaroo")
}

/// Returns the default number of concurrent dependency installs.
///
/// One per available core, capped at [`MAX_DEFAULT_JOBS`] so a large lock
/// file does not open dozens of simultaneous network connections.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_DEFAULT_JOBS)
}
