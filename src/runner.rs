//! Repository synchronisation for one matched site.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{DeployError, Result};
use crate::git::{CommandOutput, GitCommand};
use crate::payload::{PushPayload, RawRequest};
use crate::site::SiteConfig;

/// Success, or the first step that failed
pub type DeploymentOutcome = Result<()>;

/// Request-scoped data the runner needs besides the site itself
#[derive(Debug, Clone, Copy)]
pub struct DeployContext<'a> {
    pub payload: &'a PushPayload,
    pub request: &'a RawRequest,
}

/// Diagnostics appended to the log after a successful pull
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticOptions {
    pub log_payload_data: bool,
    pub log_server_request: bool,
}

pub struct DeploymentRunner {
    git: Arc<dyn GitCommand>,
    execution_enabled: bool,
    diagnostics: DiagnosticOptions,
}

impl DeploymentRunner {
    /// `execution_enabled` is the result of probing the git binary once at startup.
    pub fn new(git: Arc<dyn GitCommand>, execution_enabled: bool) -> Self {
        Self {
            git,
            execution_enabled,
            diagnostics: DiagnosticOptions::default(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticOptions) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Fetch, reset, pull and (optionally) update submodules in `site.directory`.
    ///
    /// Steps run strictly in order and stop at the first fatal failure. A
    /// failed fetch or submodule update is logged and deployment continues.
    pub async fn deploy(&self, site: &SiteConfig, ctx: DeployContext<'_>) -> DeploymentOutcome {
        let directory = resolve_directory(site).await?;

        if !self.execution_enabled {
            return Err(DeployError::ExecutionDisabled {
                git_path: self.git.program().to_string(),
            });
        }

        info!(
            "Attempting deployment for {} by {}",
            site.branch, ctx.payload.user
        );

        self.fetch(site, &directory).await;
        self.reset(site, &directory).await?;
        self.pull(site, &directory).await?;
        if site.has_submodules {
            self.update_submodules(&directory).await;
        }

        if self.diagnostics.log_payload_data {
            info!(
                "Payload data as follows\n{}",
                ctx.request.payload_text().unwrap_or_default()
            );
        }
        if self.diagnostics.log_server_request {
            info!(
                "Server data as follows\n{}",
                ctx.request.describe_metadata()
            );
        }

        info!("Deployment successful for site '{}'", site.name);
        Ok(())
    }

    async fn fetch(&self, site: &SiteConfig, dir: &Path) {
        match self.git.run(dir, &["fetch", site.remote.as_str()]).await {
            Ok(output) if output.success => {
                info!(
                    target: "deploy_hook::git::fetch",
                    "Fetching repo on {}\n{}",
                    dir.display(),
                    output.combined()
                );
            }
            Ok(output) => {
                warn!(
                    target: "deploy_hook::git::fetch",
                    "Fetching repo on {} failed, continuing\n{}",
                    dir.display(),
                    output.combined()
                );
            }
            Err(e) => {
                warn!(
                    target: "deploy_hook::git::fetch",
                    "git fetch failed to start in {}: {}",
                    dir.display(),
                    e
                );
            }
        }
    }

    async fn reset(&self, site: &SiteConfig, dir: &Path) -> Result<()> {
        let output = self
            .git
            .run(dir, &["reset", "--hard", "HEAD"])
            .await
            .map_err(|e| DeployError::ResetFailed(format!("git reset failed to start: {}", e)))?;
        info!(
            target: "deploy_hook::git::reset",
            "Resetting repository\n{}",
            output.combined()
        );
        ensure_success(&output, DeployError::ResetFailed)?;

        if site.clear_directory_on_deploy {
            let output = self
                .git
                .run(dir, &["clean", "-f"])
                .await
                .map_err(|e| DeployError::ResetFailed(format!("git clean failed to start: {}", e)))?;
            info!(
                target: "deploy_hook::git::reset",
                "Removing untracked files\n{}",
                output.combined()
            );
            ensure_success(&output, DeployError::ResetFailed)?;
        }

        Ok(())
    }

    async fn pull(&self, site: &SiteConfig, dir: &Path) -> Result<()> {
        let output = self
            .git
            .run(dir, &["pull", site.remote.as_str(), site.branch.as_str()])
            .await
            .map_err(|e| DeployError::PullFailed(format!("git pull failed to start: {}", e)))?;
        info!(
            target: "deploy_hook::git::pull",
            "Pulling in changes\n{}",
            output.combined()
        );
        ensure_success(&output, DeployError::PullFailed)
    }

    async fn update_submodules(&self, dir: &Path) {
        match self
            .git
            .run(dir, &["submodule", "update", "--recursive"])
            .await
        {
            Ok(output) if output.success => {
                info!(
                    target: "deploy_hook::git::submodule",
                    "Updating submodules\n{}",
                    output.combined()
                );
            }
            Ok(output) => {
                error!(
                    target: "deploy_hook::git::submodule",
                    "Updating submodules failed\n{}",
                    output.combined()
                );
            }
            Err(e) => {
                error!(
                    target: "deploy_hook::git::submodule",
                    "git submodule failed to start: {}",
                    e
                );
            }
        }
    }
}

async fn resolve_directory(site: &SiteConfig) -> Result<PathBuf> {
    let not_found = || DeployError::DirectoryNotFound {
        site: site.name.clone(),
        directory: site.directory.clone(),
    };
    let directory = tokio::fs::canonicalize(&site.directory)
        .await
        .map_err(|_| not_found())?;
    if !directory.is_dir() {
        return Err(not_found());
    }
    Ok(directory)
}

fn ensure_success(output: &CommandOutput, fail: fn(String) -> DeployError) -> Result<()> {
    if output.success {
        Ok(())
    } else {
        Err(fail(output.combined()))
    }
}
