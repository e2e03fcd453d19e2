//! Agent installer
//!
//! Materializes the read-only agent installation into a writable scratch
//! directory. An existing scratch directory is treated as a valid earlier
//! staging, which lets warm execution environments skip the copy.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Stages the agent installation for this invocation
#[derive(Debug, Clone)]
pub struct AgentInstaller {
    install_dir: PathBuf,
    scratch_dir: PathBuf,
    tool_cache_dir: PathBuf,
}

impl AgentInstaller {
    pub fn new(install_dir: PathBuf, scratch_dir: PathBuf, tool_cache_dir: PathBuf) -> Self {
        Self {
            install_dir,
            scratch_dir,
            tool_cache_dir,
        }
    }

    /// Copies the installation into the scratch dir unless it already exists
    ///
    /// # Returns
    /// `true` if a copy was made, `false` if a previous staging was reused
    pub async fn ensure_staged(&self) -> Result<bool> {
        let install_dir = self.install_dir.clone();
        let scratch_dir = self.scratch_dir.clone();

        tokio::task::spawn_blocking(move || stage(&install_dir, &scratch_dir))
            .await
            .context("Staging task failed")?
    }

    /// Creates the tool cache directory; failures are only logged
    pub async fn ensure_tool_cache(&self) {
        if let Err(e) = tokio::fs::create_dir_all(&self.tool_cache_dir).await {
            warn!(
                "Unable to create tool cache {}: {}",
                self.tool_cache_dir.display(),
                e
            );
        }
    }
}

fn stage(install_dir: &Path, scratch_dir: &Path) -> Result<bool> {
    if scratch_dir.exists() {
        debug!(
            "Scratch directory {} already present, reusing it",
            scratch_dir.display()
        );
        return Ok(false);
    }

    if !install_dir.is_dir() {
        anyhow::bail!(
            "Runner installation {} is not a directory",
            install_dir.display()
        );
    }

    info!(
        "Copying runner from {} to {}",
        install_dir.display(),
        scratch_dir.display()
    );

    fs::create_dir_all(scratch_dir)
        .with_context(|| format!("Failed to create {}", scratch_dir.display()))?;

    if let Err(e) = copy_tree(install_dir, scratch_dir) {
        // A half-copied tree must not be mistaken for a finished staging next time
        if let Err(cleanup) = fs::remove_dir_all(scratch_dir) {
            warn!(
                "Failed to remove partial copy {}: {}",
                scratch_dir.display(),
                cleanup
            );
        }
        return Err(e);
    }

    Ok(true)
}

/// Recursively copies `source` into the existing directory `destination`
///
/// Directories are created before their contents. File permissions are
/// preserved so the agent scripts stay executable.
fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
    let mut entries = fs::read_dir(source)
        .with_context(|| format!("Failed to read {}", source.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to list {}", source.display()))?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let from = entry.path();
        let to = destination.join(entry.file_name());
        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to stat {}", from.display()))?;

        if file_type.is_dir() {
            fs::create_dir(&to).with_context(|| format!("Failed to create {}", to.display()))?;
            copy_tree(&from, &to)?;
        } else {
            fs::copy(&from, &to).with_context(|| {
                format!("Failed to copy {} to {}", from.display(), to.display())
            })?;
        }
    }

    Ok(())
}
