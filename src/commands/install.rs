//! Install command implementation
//!
//! Installs every dependency pinned in `buckaroo.lock.json`, resolving first
//! when the lock file is missing and a resolver command is configured, then
//! writes the project's `BUCKAROO_DEPS`, `.buckconfig` and
//! `.buckconfig.local`.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

use buckaroo::defaults::{default_cache_root, default_jobs};
use buckaroo::events::{DependencyInstallationProgress, Event};
use buckaroo::install::{InstallOptions, Installer};
use buckaroo::output::{emphasis, status, OutputConfig};

/// Arguments for the install command
#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Project directory (defaults to the current directory)
    #[arg(short, long, value_name = "DIR")]
    pub project: Option<PathBuf>,

    /// Cache root directory
    #[arg(long, value_name = "DIR", env = "BUCKAROO_CACHE")]
    pub cache_root: Option<PathBuf>,

    /// Number of dependencies to install at the same time
    #[arg(short, long, value_name = "N", env = "BUCKAROO_JOBS")]
    pub jobs: Option<usize>,

    /// Command that writes buckaroo.lock.json when it is missing
    #[arg(long, value_name = "CMD", env = "BUCKAROO_RESOLVER")]
    pub resolver: Option<String>,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl InstallArgs {
    fn options(&self) -> InstallOptions {
        InstallOptions {
            cache_root: self.cache_root.clone().unwrap_or_else(default_cache_root),
            jobs: self.jobs.unwrap_or_else(default_jobs),
            resolver: self.resolver.clone(),
        }
    }
}

/// Execute the install command
pub fn execute(args: InstallArgs, output: &OutputConfig) -> Result<()> {
    let start_time = Instant::now();

    let project = match &args.project {
        Some(project) => project.clone(),
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let options = args.options();
    debug!("install options: {:?}", options);

    let progress = (!args.quiet && output.show_progress()).then(progress_bar);
    let mut total = 0;
    let mut previous = DependencyInstallationProgress::default();

    for event in Installer::from_options(&options).install_existing_dependencies(&project) {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                if let Some(pb) = &progress {
                    pb.abandon();
                }
                if !args.quiet {
                    println!("{} Install failed", status(output, "❌", "[FAIL]"));
                }
                return Err(e.into());
            }
        };

        match event {
            Event::ReadLockFile(read) => {
                total = read.locks.len();
                if let Some(pb) = &progress {
                    pb.set_length(total as u64);
                }
            }
            Event::DependencyInstallationProgress(snapshot) => {
                if let Some(pb) = &progress {
                    pb.set_position(snapshot.completed() as u64);
                    if let Some(latest) = snapshot
                        .progress
                        .values()
                        .find(|p| previous.progress.get(&p.identifier) != Some(*p))
                    {
                        pb.set_message(format!("{} {}", latest.identifier, latest.phase));
                    }
                }
                previous = snapshot;
            }
            Event::WriteFile(write) => debug!("wrote {}", write.path.display()),
            Event::TouchFile(touch) => debug!("touched {}", touch.path.display()),
            Event::DownloadProgress(download) => {
                debug!("{}: {}", download.identifier, download.phase)
            }
        }
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if !args.quiet {
        println!(
            "{} Installed {} dependencies in {:.2}s",
            status(output, "✅", "[OK]"),
            emphasis(output, &total.to_string()),
            start_time.elapsed().as_secs_f64()
        );
    }
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    let pb = ProgressBar::new(0);
    pb.set_style(style);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(project: PathBuf, cache_root: PathBuf) -> InstallArgs {
        InstallArgs {
            project: Some(project),
            cache_root: Some(cache_root),
            jobs: Some(2),
            resolver: None,
            quiet: true,
        }
    }

    #[test]
    fn test_execute_missing_lock_file() {
        let temp = TempDir::new().unwrap();
        let result = execute(
            args(temp.path().to_path_buf(), temp.path().join("cache")),
            &OutputConfig::without_color(),
        );
        let message = result.unwrap_err().to_string();
        assert!(message.contains("buckaroo.lock.json"));
    }

    #[test]
    fn test_execute_empty_lock_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("buckaroo.lock.json"), "{}").unwrap();

        execute(
            args(temp.path().to_path_buf(), temp.path().join("cache")),
            &OutputConfig::without_color(),
        )
        .unwrap();

        assert!(temp.path().join("BUCKAROO_DEPS").exists());
        assert!(temp.path().join(".buckconfig").exists());
        assert!(temp.path().join(".buckconfig.local").exists());
    }

    #[test]
    fn test_options_from_args() {
        let options = InstallArgs {
            project: None,
            cache_root: Some(PathBuf::from("/tmp/buckaroo-cache")),
            jobs: Some(3),
            resolver: Some("buckaroo-resolve".to_string()),
            quiet: false,
        }
        .options();
        assert_eq!(options.cache_root, PathBuf::from("/tmp/buckaroo-cache"));
        assert_eq!(options.jobs, 3);
        assert_eq!(options.resolver.as_deref(), Some("buckaroo-resolve"));
    }
}
