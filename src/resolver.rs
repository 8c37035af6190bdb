//! Producing a lock file when the project has none
//!
//! Resolution itself lives outside the install engine. The installer only
//! needs something that, given a project directory, leaves a lock file
//! behind.

use std::path::Path;
use std::process::Command;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::events::Event;
use crate::layout;

/// Produces `buckaroo.lock.json` in a project directory.
///
/// Implementations may forward their own progress through `emit`; the
/// installer passes it on to the event stream unchanged.
pub trait Resolver: Send + Sync {
    fn resolve_dependencies(&self, project: &Path, emit: &mut dyn FnMut(Event)) -> Result<()>;
}

/// Resolver for setups without one: always fails, pointing at the fix.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableResolver;

impl Resolver for UnavailableResolver {
    fn resolve_dependencies(&self, project: &Path, _emit: &mut dyn FnMut(Event)) -> Result<()> {
        Err(Error::LockFile {
            path: layout::lock_file(project),
            message: "lock file not found".to_string(),
            hint: Some(
                "Run `buckaroo resolve` first, or pass --resolver with a command that writes the lock file"
                    .to_string(),
            ),
        })
    }
}

/// Runs an external command in the project directory.
///
/// The command line is split on whitespace; the first word is the program.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    command: String,
}

impl CommandResolver {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Resolver for CommandResolver {
    fn resolve_dependencies(&self, project: &Path, _emit: &mut dyn FnMut(Event)) -> Result<()> {
        let mut words = self.command.split_whitespace();
        let program = words.next().ok_or_else(|| Error::Resolution {
            message: "resolver command is empty".to_string(),
        })?;

        info!("resolving dependencies with `{}`", self.command);
        debug!("resolver working directory: {}", project.display());
        let output = Command::new(program)
            .args(words)
            .current_dir(project)
            .output()
            .map_err(|e| Error::Resolution {
                message: format!("failed to run `{}`: {}", self.command, e),
            })?;

        if !output.status.success() {
            return Err(Error::Resolution {
                message: format!(
                    "`{}` exited with {}: {}",
                    self.command,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}
