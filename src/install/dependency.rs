//! Installing one locked dependency
//!
//! Steps run strictly in order:
//!
//! 1. acquire the source tree unless the dependency directory exists;
//! 2. fetch `BUCKFILE` if it is missing and the lock names one;
//! 3. write `BUCKAROO_DEPS`;
//! 4. touch `.buckconfig`;
//! 5. write `.buckconfig.local`.
//!
//! Generated files are rewritten on every run, so they stay in sync with the
//! lock file even when the source tree came from an earlier run.

use std::path::Path;

use log::{debug, info};

use super::generate;
use crate::acquisition::{Acquirer, Cancellation, Reporter};
use crate::error::Result;
use crate::events::{DownloadPhase, DownloadProgress, Event};
use crate::layout;
use crate::lock::DependencyLock;

/// Install `lock` under `project`, reporting through `emit`.
///
/// Returns `Err(Error::Cancelled)` if `cancellation` fires between steps.
pub fn install_dependency_lock(
    project: &Path,
    lock: &DependencyLock,
    acquirer: &dyn Acquirer,
    cancellation: &Cancellation,
    emit: &mut dyn FnMut(Event),
) -> Result<()> {
    let identifier = &lock.identifier;
    let directory = layout::dependency_directory(project, identifier);
    debug!("installing {} into {}", identifier, directory.display());

    cancellation.check()?;
    if !directory.exists() {
        let mut on_phase = |phase: DownloadPhase| {
            emit(
                DownloadProgress {
                    identifier: identifier.clone(),
                    file: None,
                    phase,
                }
                .into(),
            )
        };
        let mut reporter = Reporter::new(&mut on_phase, cancellation);
        acquirer.acquire(&lock.origin.source, &directory, &mut reporter)?;
    }

    cancellation.check()?;
    let buck_file = directory.join(layout::BUCK_FILE);
    if let Some(buck) = &lock.origin.buck {
        if !buck_file.exists() {
            let mut on_phase = |phase: DownloadPhase| {
                emit(
                    DownloadProgress {
                        identifier: identifier.clone(),
                        file: Some(buck_file.clone()),
                        phase,
                    }
                    .into(),
                )
            };
            let mut reporter = Reporter::new(&mut on_phase, cancellation);
            acquirer.fetch_file(buck, &buck_file, &mut reporter)?;
        }
    }

    cancellation.check()?;
    let manifest = generate::buckaroo_deps(&lock.origin.dependencies);
    emit(generate::write_file(&directory.join(layout::MANIFEST_FILE), &manifest)?.into());

    emit(generate::touch_file(&directory.join(layout::BUCKCONFIG))?.into());

    let config = generate::buckconfig_local(
        &directory,
        project,
        lock.origin.dependencies.iter().map(|r| &r.identifier),
    );
    emit(generate::write_file(&directory.join(layout::BUCKCONFIG_LOCAL), &config)?.into());

    info!("installed {}", identifier);
    Ok(())
}
