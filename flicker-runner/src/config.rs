//! Runner configuration
//!
//! Defines the filesystem layout, runner registration settings and the
//! timing knobs of the completion poll loop.

use std::path::PathBuf;
use std::time::Duration;

use flicker_client::DEFAULT_BASE_URL;

/// Runner configuration
///
/// All intervals are configurable so the poll loop can be tuned for the
/// host's time limit and queue latency.
#[derive(Debug, Clone)]
pub struct Config {
    /// Control-plane API base URL
    pub control_plane_url: String,

    /// Read-only agent installation shipped with the function
    pub install_dir: PathBuf,

    /// Writable copy of the installation used by this invocation
    pub scratch_dir: PathBuf,

    /// Tool cache handed to the agent
    pub tool_cache_dir: PathBuf,

    /// Runner group the agent registers into
    pub runner_group: String,

    /// Comma-separated labels applied at registration
    pub runner_labels: String,

    /// Agent work directory, relative to the scratch dir
    pub work_dir: String,

    /// Prefix of per-invocation runner names
    pub runner_name_prefix: String,

    /// Name of the long-lived sentinel runner registered by `create` events
    pub default_runner_name: String,

    /// Time reserved before the hard deadline for decommissioning
    pub deadline_margin: Duration,

    /// How long a received message stays hidden from other consumers
    pub visibility_timeout: Duration,

    /// Upper bound of a single long-poll receive
    pub max_wait_time: Duration,

    /// Pause after a failed receive
    pub receive_error_backoff: Duration,

    /// Timeout for control-plane HTTP calls
    pub http_timeout: Duration,

    /// Dump agent diagnostics after every configure, not only on failure
    pub always_print_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_plane_url: DEFAULT_BASE_URL.to_string(),
            install_dir: PathBuf::from("/runner"),
            scratch_dir: PathBuf::from("/tmp/runner"),
            tool_cache_dir: PathBuf::from("/tmp/toolcache"),
            runner_group: "lambda".to_string(),
            runner_labels: "lambda".to_string(),
            work_dir: "_work".to_string(),
            runner_name_prefix: "lambda-".to_string(),
            default_runner_name: "DEFAULT-LAMBDA-DO-NOT-REMOVE".to_string(),
            deadline_margin: Duration::from_secs(30),
            visibility_timeout: Duration::from_secs(60),
            max_wait_time: Duration::from_secs(20),
            receive_error_backoff: Duration::from_secs(1),
            http_timeout: Duration::from_secs(30),
            always_print_logs: false,
        }
    }
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Every variable is optional:
    /// - CONTROL_PLANE_URL (default: https://api.github.com)
    /// - RUNNER_INSTALL_DIR (default: /runner)
    /// - RUNNER_SCRATCH_DIR (default: /tmp/runner)
    /// - RUNNER_TOOL_CACHE_DIR (default: /tmp/toolcache)
    /// - RUNNER_GROUP, RUNNER_LABELS (default: lambda)
    /// - RUNNER_WORK_DIR (default: _work)
    /// - RUNNER_NAME_PREFIX (default: lambda-)
    /// - DEFAULT_RUNNER_NAME (default: DEFAULT-LAMBDA-DO-NOT-REMOVE)
    /// - DEADLINE_MARGIN, VISIBILITY_TIMEOUT, MAX_WAIT_TIME, HTTP_TIMEOUT (seconds)
    /// - ALWAYS_PRINT_LOGS ("true" to enable)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let string = |key: &str, default: String| lookup(key).unwrap_or(default);
        let path = |key: &str, default: PathBuf| lookup(key).map(PathBuf::from).unwrap_or(default);
        let seconds = |key: &str, default: Duration| -> anyhow::Result<Duration> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds", key)),
                None => Ok(default),
            }
        };

        let config = Self {
            control_plane_url: string("CONTROL_PLANE_URL", defaults.control_plane_url),
            install_dir: path("RUNNER_INSTALL_DIR", defaults.install_dir),
            scratch_dir: path("RUNNER_SCRATCH_DIR", defaults.scratch_dir),
            tool_cache_dir: path("RUNNER_TOOL_CACHE_DIR", defaults.tool_cache_dir),
            runner_group: string("RUNNER_GROUP", defaults.runner_group),
            runner_labels: string("RUNNER_LABELS", defaults.runner_labels),
            work_dir: string("RUNNER_WORK_DIR", defaults.work_dir),
            runner_name_prefix: string("RUNNER_NAME_PREFIX", defaults.runner_name_prefix),
            default_runner_name: string("DEFAULT_RUNNER_NAME", defaults.default_runner_name),
            deadline_margin: seconds("DEADLINE_MARGIN", defaults.deadline_margin)?,
            visibility_timeout: seconds("VISIBILITY_TIMEOUT", defaults.visibility_timeout)?,
            max_wait_time: seconds("MAX_WAIT_TIME", defaults.max_wait_time)?,
            receive_error_backoff: defaults.receive_error_backoff,
            http_timeout: seconds("HTTP_TIMEOUT", defaults.http_timeout)?,
            always_print_logs: lookup("ALWAYS_PRINT_LOGS").as_deref() == Some("true"),
        };

        Ok(config)
    }

    /// Directory the agent writes its own diagnostics to
    pub fn diag_dir(&self) -> PathBuf {
        self.scratch_dir.join("_diag")
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.control_plane_url.starts_with("http://")
            && !self.control_plane_url.starts_with("https://")
        {
            anyhow::bail!("control_plane_url must start with http:// or https://");
        }

        if self.install_dir == self.scratch_dir {
            anyhow::bail!("scratch_dir must differ from install_dir");
        }

        if self.runner_group.is_empty() {
            anyhow::bail!("runner_group cannot be empty");
        }

        if self.default_runner_name.is_empty() {
            anyhow::bail!("default_runner_name cannot be empty");
        }

        if self.visibility_timeout < Duration::from_secs(60) {
            anyhow::bail!("visibility_timeout must be at least 60 seconds");
        }

        // SQS caps a single long poll at 20 seconds
        if self.max_wait_time > Duration::from_secs(20) {
            anyhow::bail!("max_wait_time cannot exceed 20 seconds");
        }

        if self.http_timeout.is_zero() {
            anyhow::bail!("http_timeout must be greater than 0");
        }

        Ok(())
    }
}
