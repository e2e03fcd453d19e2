//! Agent diagnostics
//!
//! Dumps the agent's own `_diag` log directory to the invocation output.
//! Everything here is best effort and never fails the lifecycle.

use std::path::Path;
use tracing::{debug, info};

/// One file read from the agent's diagnostics directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticLog {
    pub name: String,
    pub contents: String,
}

impl DiagnosticLog {
    /// Joins logs into a single block for error context
    pub fn render(logs: &[DiagnosticLog]) -> String {
        logs.iter()
            .map(|log| format!("==> {} <==\n{}", log.name, log.contents))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Reads and logs every regular file in `diag_dir`, sorted by name
///
/// A missing directory or unreadable file is skipped silently.
pub async fn read_diagnostic_logs(diag_dir: &Path) -> Vec<DiagnosticLog> {
    info!("Reading logs...");

    let mut dir = match tokio::fs::read_dir(diag_dir).await {
        Ok(dir) => dir,
        Err(e) => {
            debug!("No diagnostics at {}: {}", diag_dir.display(), e);
            return Vec::new();
        }
    };

    let mut paths = Vec::new();
    while let Ok(Some(entry)) = dir.next_entry().await {
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut logs = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let contents = String::from_utf8_lossy(&bytes).to_string();
                info!("{}\n{}", name, contents);
                logs.push(DiagnosticLog { name, contents });
            }
            Err(e) => debug!("Skipping unreadable diagnostics file {}: {}", name, e),
        }
    }

    info!("Done reading logs...");
    logs
}
