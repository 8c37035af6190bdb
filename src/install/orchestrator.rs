//! Whole-project install run
//!
//! A run moves through these states on the coordinator thread:
//!
//! ```text
//! CheckLock -> (Resolve)? -> ReadLock -> InstallAll -> Finalize -> Done
//! ```
//!
//! `InstallAll` fans out one task per lock entry onto a bounded worker pool.
//! Workers send their download progress back over a channel; the coordinator
//! is the only place the aggregate snapshot is updated, and it re-emits the
//! whole snapshot after every update. Events from one worker arrive in the
//! order that worker sent them, so each identifier's latest entry always
//! happened after the one it replaced.
//!
//! A task that panics is reported as [`Error::Panicked`] for its identifier,
//! like any other failed install.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;

use log::{debug, info, warn};

use super::dependency::install_dependency_lock;
use super::generate;
use crate::acquisition::{Acquirer, Cancellation};
use crate::error::{Error, Result};
use crate::events::{DependencyInstallationProgress, DownloadProgress, Event, ReadLockFileEvent};
use crate::layout;
use crate::lock::{self, DependencyLockSet, RecipeIdentifier};
use crate::resolver::Resolver;

/// Everything a run needs, owned by the coordinator thread
pub(crate) struct Run {
    pub project: PathBuf,
    pub acquirer: Arc<dyn Acquirer>,
    pub resolver: Arc<dyn Resolver>,
    pub jobs: usize,
    pub cancellation: Cancellation,
}

enum WorkerMessage {
    Progress(DownloadProgress),
    Finished {
        identifier: RecipeIdentifier,
        result: Result<()>,
    },
}

impl Run {
    /// Drive the run to completion, emitting events as they happen.
    pub fn execute(&self, emit: &mut dyn FnMut(Event)) -> Result<()> {
        let lock_path = layout::lock_file(&self.project);

        self.cancellation.check()?;
        if !lock_path.exists() {
            info!("no lock file at {}, resolving", lock_path.display());
            self.resolver.resolve_dependencies(&self.project, emit)?;
            if !lock_path.exists() {
                return Err(Error::LockFile {
                    path: lock_path,
                    message: "resolution did not produce a lock file".to_string(),
                    hint: None,
                });
            }
        }

        self.cancellation.check()?;
        let locks = lock::from_file(&lock_path)?;
        debug!("read {} lock entries", locks.len());
        emit(
            ReadLockFileEvent {
                locks: locks.clone(),
            }
            .into(),
        );

        self.install_all(&locks, emit)?;

        self.cancellation.check()?;
        finalize(&self.project, &locks, emit)
    }

    /// Install every entry concurrently and fold progress into snapshots.
    ///
    /// Waits for every worker before returning; the first failure received
    /// is returned once all workers have finished.
    fn install_all(&self, locks: &DependencyLockSet, emit: &mut dyn FnMut(Event)) -> Result<()> {
        if locks.is_empty() {
            return Ok(());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs.max(1))
            .thread_name(|index| format!("buckaroo-install-{}", index))
            .build()
            .map_err(|e| Error::WorkerPool {
                message: e.to_string(),
            })?;

        let (sender, receiver) = mpsc::channel::<WorkerMessage>();
        let project = self.project.as_path();
        let acquirer: &dyn Acquirer = self.acquirer.as_ref();
        let cancellation = &self.cancellation;

        let mut snapshot = DependencyInstallationProgress::default();
        let mut first_error: Option<Error> = None;

        pool.in_place_scope(|scope| {
            for lock in locks.entries() {
                let sender = sender.clone();
                scope.spawn(move |_| {
                    let mut forward = |event: Event| {
                        if let Event::DownloadProgress(progress) = event {
                            let _ = sender.send(WorkerMessage::Progress(progress));
                        }
                    };
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        install_dependency_lock(project, lock, acquirer, cancellation, &mut forward)
                    }))
                    .unwrap_or_else(|payload| {
                        Err(Error::Panicked {
                            context: format!("installing {}", lock.identifier),
                            message: panic_message(payload.as_ref()),
                        })
                    });
                    let _ = sender.send(WorkerMessage::Finished {
                        identifier: lock.identifier.clone(),
                        result,
                    });
                });
            }
            drop(sender);

            for message in receiver {
                match message {
                    WorkerMessage::Progress(progress) => {
                        snapshot
                            .progress
                            .insert(progress.identifier.clone(), progress);
                        emit(snapshot.clone().into());
                    }
                    WorkerMessage::Finished {
                        identifier,
                        result: Ok(()),
                    } => debug!("{} finished", identifier),
                    WorkerMessage::Finished {
                        identifier,
                        result: Err(error),
                    } => {
                        warn!("installing {} failed: {}", identifier, error);
                        first_error.get_or_insert(error);
                    }
                }
            }
        });

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Text of a panic payload raised with `panic!`
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Write the project-level `BUCKAROO_DEPS`, `.buckconfig` and
/// `.buckconfig.local`.
pub(crate) fn finalize(
    project: &Path,
    locks: &DependencyLockSet,
    emit: &mut dyn FnMut(Event),
) -> Result<()> {
    let manifest = generate::buckaroo_deps(&locks.references());
    emit(generate::write_file(&project.join(layout::MANIFEST_FILE), &manifest)?.into());

    emit(generate::touch_file(&project.join(layout::BUCKCONFIG))?.into());

    let config = generate::buckconfig_local(
        project,
        project,
        locks.entries().iter().map(|lock| &lock.identifier),
    );
    emit(generate::write_file(&project.join(layout::BUCKCONFIG_LOCAL), &config)?.into());

    info!("installed {} dependencies", locks.len());
    Ok(())
}
