//! Installing a project's locked dependencies.
//!
//! ## Overview
//!
//! [`Installer::install_existing_dependencies`] makes sure the project has a
//! lock file, reads it, installs every entry concurrently and finally writes
//! the project-level build files. The run happens on a background
//! coordinator thread; the caller consumes its progress as an
//! [`EventStream`].
//!
//! - [`dependency`]: installs one lock entry
//! - [`generate`]: generated file content and file side effects
//! - [`orchestrator`]: the run state machine and progress aggregation
//!
//! Runs are resumable: anything already materialized is skipped, so a failed
//! or interrupted run is retried by running it again.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use log::debug;

use crate::acquisition::{Acquirer, CachedAcquirer, Cancellation};
use crate::defaults::{default_cache_root, default_jobs};
use crate::error::{Error, Result};
use crate::events::Event;
use crate::resolver::{CommandResolver, Resolver, UnavailableResolver};

pub mod dependency;
pub mod generate;
pub mod orchestrator;

/// Knobs for an install run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Root of the shared download cache
    pub cache_root: PathBuf,
    /// Number of dependencies installed at the same time
    pub jobs: usize,
    /// Command run to produce a lock file when the project has none
    pub resolver: Option<String>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            jobs: default_jobs(),
            resolver: None,
        }
    }
}

/// Entry point of the install engine
#[derive(Clone)]
pub struct Installer {
    acquirer: Arc<dyn Acquirer>,
    resolver: Arc<dyn Resolver>,
    jobs: usize,
}

impl Installer {
    pub fn new(acquirer: Arc<dyn Acquirer>, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            acquirer,
            resolver,
            jobs: default_jobs(),
        }
    }

    /// Installer backed by the on-disk cache and, if configured, an external
    /// resolver command.
    pub fn from_options(options: &InstallOptions) -> Self {
        let resolver: Arc<dyn Resolver> = match &options.resolver {
            Some(command) => Arc::new(CommandResolver::new(command.clone())),
            None => Arc::new(UnavailableResolver),
        };
        Self::new(
            Arc::new(CachedAcquirer::new(options.cache_root.clone())),
            resolver,
        )
        .with_jobs(options.jobs)
    }

    /// Limit concurrent installs to `jobs` (at least one)
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Install the dependencies locked in `project`.
    ///
    /// The run starts immediately in the background. The stream yields events
    /// as they happen and ends after the last one; a failed run ends with a
    /// single `Err` instead.
    pub fn install_existing_dependencies(&self, project: &Path) -> EventStream {
        let project = std::path::absolute(project).unwrap_or_else(|_| project.to_path_buf());
        let cancellation = Cancellation::new();
        let (sender, receiver) = mpsc::channel::<Result<Event>>();

        let run = orchestrator::Run {
            project,
            acquirer: Arc::clone(&self.acquirer),
            resolver: Arc::clone(&self.resolver),
            jobs: self.jobs,
            cancellation: cancellation.clone(),
        };

        let worker_sender = sender.clone();
        let spawned = thread::Builder::new()
            .name("buckaroo-coordinator".to_string())
            .spawn(move || {
                debug!("install run started in {}", run.project.display());
                let mut emit = |event: Event| {
                    if worker_sender.send(Ok(event)).is_err() {
                        // Nobody is listening any more
                        run.cancellation.cancel();
                    }
                };
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| run.execute(&mut emit)))
                    .unwrap_or_else(|payload| {
                        Err(Error::Panicked {
                            context: format!("installing into {}", run.project.display()),
                            message: orchestrator::panic_message(payload.as_ref()),
                        })
                    });
                if let Err(error) = outcome {
                    let _ = worker_sender.send(Err(error));
                }
            });

        if let Err(e) = spawned {
            let _ = sender.send(Err(Error::WorkerPool {
                message: format!("failed to start install run: {}", e),
            }));
        }

        EventStream {
            receiver,
            cancellation,
            finished: false,
        }
    }
}

/// Progress of an install run.
///
/// Iterating blocks until the next event. Dropping the stream cancels the
/// run.
pub struct EventStream {
    receiver: Receiver<Result<Event>>,
    cancellation: Cancellation,
    finished: bool,
}

impl EventStream {
    /// Ask the run to stop. In-flight steps finish first; the stream then
    /// ends with [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Handle that cancels this run from another thread
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    /// Drain the stream, returning the run's outcome.
    pub fn wait(self) -> Result<()> {
        for event in self {
            event?;
        }
        Ok(())
    }
}

impl Iterator for EventStream {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.receiver.recv() {
            Ok(Ok(event)) => Some(Ok(event)),
            Ok(Err(error)) => {
                self.finished = true;
                Some(Err(error))
            }
            Err(_) => {
                self.finished = true;
                None
            }
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if !self.finished {
            self.cancellation.cancel();
        }
    }
}
