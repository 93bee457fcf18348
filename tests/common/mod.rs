//! Shared fixtures: a recording git fake and site builders

#![allow(dead_code)]

use async_trait::async_trait;
use deploy_hook::dispatcher::DeploymentDispatcher;
use deploy_hook::git::{CommandOutput, GitCommand};
use deploy_hook::runner::DeploymentRunner;
use deploy_hook::site::{SiteConfig, SiteRegistry};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const SOURCE: &str = "Bitbucket.org";

/// One recorded git invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub dir: PathBuf,
    pub args: String,
}

/// Records every invocation; fails the subcommands listed in `failing`.
#[derive(Default)]
pub struct FakeGit {
    calls: Mutex<Vec<Call>>,
    failing: Vec<String>,
}

impl FakeGit {
    pub fn failing(subcommands: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: subcommands.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of `pull` invocations issued inside `dir`.
    pub fn pulls_in(&self, dir: &Path) -> usize {
        let dir = dir.canonicalize().unwrap();
        self.calls()
            .iter()
            .filter(|c| c.dir == dir && c.args.starts_with("pull"))
            .count()
    }
}

#[async_trait]
impl GitCommand for FakeGit {
    async fn run(&self, dir: &Path, args: &[&str]) -> io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(Call {
            dir: dir.to_path_buf(),
            args: args.join(" "),
        });
        if self.failing.iter().any(|f| f == args[0]) {
            Ok(CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: format!("fatal: {} failed", args[0]),
            })
        } else {
            Ok(CommandOutput {
                success: true,
                stdout: format!("{} done", args[0]),
                stderr: String::new(),
            })
        }
    }

    fn program(&self) -> &str {
        "git"
    }
}

pub fn site(name: &str, branch: &str, directory: &Path, users: &[&str]) -> SiteConfig {
    SiteConfig {
        name: name.to_string(),
        branch: branch.to_string(),
        directory: directory.to_path_buf(),
        remote: "origin".to_string(),
        clear_directory_on_deploy: false,
        has_submodules: false,
        authorized_users: users.iter().map(|u| u.to_string()).collect(),
    }
}

pub fn dispatcher(sites: Vec<SiteConfig>, git: Arc<FakeGit>) -> DeploymentDispatcher {
    let runner = DeploymentRunner::new(git, true);
    DeploymentDispatcher::new(SiteRegistry::from(sites), runner, SOURCE)
}

pub fn push_json(user: &str, branches: &[&str]) -> String {
    let commits: Vec<_> = branches
        .iter()
        .map(|b| serde_json::json!({ "branch": b, "node": "abc123" }))
        .collect();
    serde_json::json!({ "user": user, "commits": commits }).to_string()
}
