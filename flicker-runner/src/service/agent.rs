//! Runner agent
//!
//! Wraps the agent's command-line entry points:
//! - `config.sh --url .. --token .. --name .. --replace` to register
//! - `run.sh` to start the listener, detached
//! - `config.sh remove --token ..` to deregister
//!
//! Non-zero exits are reported through [`AgentOutput`]; only failures to
//! launch a script are errors here.

use async_trait::async_trait;
use flicker_core::domain::runner::{RegistrationToken, RunnerIdentity};
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Marker file the agent writes once it is configured locally
const REGISTRATION_MARKER: &str = ".runner";

/// Errors launching an agent entry point
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Failed to launch {}: {source}", .script.display())]
    Launch {
        script: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Captured result of a finished agent command
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl AgentOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr, trimmed
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr.to_string(),
            (_, true) => stdout.to_string(),
            _ => format!("{}\n{}", stdout, stderr),
        }
    }

    fn from_output(output: std::process::Output) -> Self {
        Self {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// Registration settings passed to the configure entry point
#[derive(Debug, Clone)]
pub struct ConfigureArgs {
    pub repo_url: String,
    pub name: RunnerIdentity,
    pub group: String,
    pub labels: String,
    pub work_dir: String,
}

/// Entry points of the self-hosted runner agent
#[async_trait]
pub trait RunnerAgent: Send + Sync {
    /// Registers the agent, replacing any registration with the same name
    async fn configure(
        &self,
        args: &ConfigureArgs,
        token: RegistrationToken,
    ) -> Result<AgentOutput, AgentError>;

    /// Launches the listener without waiting for it
    ///
    /// # Returns
    /// The OS process id, when known
    fn start(&self) -> Result<Option<u32>, AgentError>;

    /// Deregisters the agent
    async fn remove(&self, token: RegistrationToken) -> Result<AgentOutput, AgentError>;

    /// Whether a local registration from an earlier invocation is present
    fn is_configured(&self) -> bool;
}

/// Agent driven through the shell scripts in its installation directory
pub struct ScriptAgent {
    root: PathBuf,
    tool_cache_dir: PathBuf,
}

impl ScriptAgent {
    /// # Arguments
    /// * `root` - Staged installation containing `config.sh` and `run.sh`
    /// * `tool_cache_dir` - Tool cache exported to the listener
    pub fn new(root: PathBuf, tool_cache_dir: PathBuf) -> Self {
        Self {
            root,
            tool_cache_dir,
        }
    }

    fn script(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    async fn run_config(&self, args: &[&str]) -> Result<AgentOutput, AgentError> {
        let script = self.script("config.sh");
        let output = Command::new(&script)
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| AgentError::Launch {
                script: script.clone(),
                source,
            })?;

        let output = AgentOutput::from_output(output);
        debug!(
            "config.sh exited with {:?}: {}",
            output.exit_code,
            output.combined()
        );
        Ok(output)
    }
}

#[async_trait]
impl RunnerAgent for ScriptAgent {
    async fn configure(
        &self,
        args: &ConfigureArgs,
        token: RegistrationToken,
    ) -> Result<AgentOutput, AgentError> {
        self.run_config(&[
            "--url",
            args.repo_url.as_str(),
            "--token",
            token.expose(),
            "--name",
            args.name.as_str(),
            "--runnergroup",
            args.group.as_str(),
            "--labels",
            args.labels.as_str(),
            "--work",
            args.work_dir.as_str(),
            "--replace",
        ])
        .await
    }

    fn start(&self) -> Result<Option<u32>, AgentError> {
        let script = self.script("run.sh");
        let child = Command::new(&script)
            .current_dir(&self.root)
            .env("RUNNER_TOOL_CACHE", &self.tool_cache_dir)
            .env("AGENT_TOOLSDIRECTORY", &self.tool_cache_dir)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| AgentError::Launch {
                script: script.clone(),
                source,
            })?;

        // Supervision happens through the completion queue, never by joining
        Ok(child.id())
    }

    async fn remove(&self, token: RegistrationToken) -> Result<AgentOutput, AgentError> {
        self.run_config(&["remove", "--token", token.expose()]).await
    }

    fn is_configured(&self) -> bool {
        self.root.join(REGISTRATION_MARKER).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_script(path: &Path, body: &str) {
        fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn args() -> ConfigureArgs {
        ConfigureArgs {
            repo_url: "https://github.com/acme/widgets".to_string(),
            name: RunnerIdentity::for_invocation(
                flicker_core::domain::invocation::LifecycleEvent::Run,
                "req-1",
                "lambda-",
                "SENTINEL",
            ),
            group: "lambda".to_string(),
            labels: "lambda".to_string(),
            work_dir: "_work".to_string(),
        }
    }

    // Scripts are all written up front and executed sequentially so no
    // script is executed while another thread still holds it open.
    #[tokio::test]
    async fn test_script_agent_entry_points() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("runner");
        let cache = tmp.path().join("toolcache");
        fs::create_dir_all(&root).unwrap();

        write_script(
            &root.join("config.sh"),
            r#"echo "$@" >> calls.txt
if [ "$1" = "remove" ]; then rm -f .runner; echo "Runner removed"; exit 0; fi
if [ "$6" = "broken" ]; then echo "bad name" >&2; exit 3; fi
touch .runner
echo configured"#,
        );
        write_script(&root.join("run.sh"), r#"echo "$RUNNER_TOOL_CACHE" > started.txt"#);

        let agent = ScriptAgent::new(root.clone(), cache.clone());
        assert!(!agent.is_configured());

        let output = agent
            .configure(&args(), RegistrationToken::new("tok-attach", None))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.combined(), "configured");
        assert!(agent.is_configured());

        let mut broken = args();
        broken.name = RunnerIdentity::for_invocation(
            flicker_core::domain::invocation::LifecycleEvent::Create,
            "",
            "",
            "broken",
        );
        let output = agent
            .configure(&broken, RegistrationToken::new("tok-broken", None))
            .await
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.combined(), "bad name");

        let output = agent
            .remove(RegistrationToken::new("tok-detach", None))
            .await
            .unwrap();
        assert!(output.success());
        assert!(!agent.is_configured());

        let calls = fs::read_to_string(root.join("calls.txt")).unwrap();
        let calls: Vec<_> = calls.lines().collect();
        assert_eq!(
            calls[0],
            "--url https://github.com/acme/widgets --token tok-attach --name lambda-req-1 \
             --runnergroup lambda --labels lambda --work _work --replace"
        );
        assert_eq!(calls[2], "remove --token tok-detach");

        agent.start().unwrap();
        let started = root.join("started.txt");
        for _ in 0..50 {
            if fs::read_to_string(&started).map(|s| !s.is_empty()).unwrap_or(false) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(
            fs::read_to_string(&started).unwrap().trim(),
            cache.to_string_lossy()
        );
    }

    #[tokio::test]
    async fn test_missing_script_is_launch_error() {
        let tmp = TempDir::new().unwrap();
        let agent = ScriptAgent::new(tmp.path().to_path_buf(), tmp.path().join("cache"));

        let err = agent
            .remove(RegistrationToken::new("tok", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Launch { .. }));
        assert!(agent.start().is_err());
    }

    #[test]
    fn test_combined_output() {
        let output = AgentOutput {
            exit_code: Some(1),
            stdout: "out\n".to_string(),
            stderr: "err\n".to_string(),
        };
        assert_eq!(output.combined(), "out\nerr");
        assert!(!output.success());
    }
}
