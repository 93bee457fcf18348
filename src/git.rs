//! Structured git invocation: argument vectors, never shell strings.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of one git invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout followed by stderr, trimmed. Git reports progress on stderr.
    pub fn combined(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr.to_string(),
            (false, true) => stdout.to_string(),
            (false, false) => format!("{}\n{}", stdout, stderr),
        }
    }
}

/// Runs git with `args` inside a working directory.
#[async_trait]
pub trait GitCommand: Send + Sync {
    async fn run(&self, dir: &Path, args: &[&str]) -> io::Result<CommandOutput>;

    /// Binary name or path, for diagnostics.
    fn program(&self) -> &str;
}

/// `GitCommand` backed by the git binary at `git_path`
#[derive(Debug, Clone)]
pub struct GitCli {
    git_path: String,
    timeout: Option<Duration>,
}

impl GitCli {
    pub fn new(git_path: impl Into<String>) -> Self {
        Self {
            git_path: git_path.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns true if the git binary can be started at all.
    pub async fn is_available(&self) -> bool {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        match self.run(&cwd, &["--version"]).await {
            Ok(output) if output.success => {
                debug!("Using {}", output.stdout.trim());
                true
            }
            Ok(output) => {
                warn!(
                    "'{} --version' exited unsuccessfully: {}",
                    self.git_path,
                    output.combined()
                );
                false
            }
            Err(e) => {
                warn!("'{}' could not be started: {}", self.git_path, e);
                false
            }
        }
    }
}

#[async_trait]
impl GitCommand for GitCli {
    async fn run(&self, dir: &Path, args: &[&str]) -> io::Result<CommandOutput> {
        debug!(
            "Running (cwd = '{}'): {} {}",
            dir.display(),
            self.git_path,
            args.join(" ")
        );

        let mut command = Command::new(&self.git_path);
        command
            .current_dir(dir)
            .args(args)
            .stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("git {} timed out after {:?}", args.join(" "), limit),
                    )
                })??,
            None => command.output().await?,
        };

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn program(&self) -> &str {
        &self.git_path
    }
}
