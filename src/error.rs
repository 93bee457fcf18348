use std::path::PathBuf;

/// Custom error type for deploy_hook operations
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Unattended access with user agent '{source_id}'")]
    UnauthorizedSource { source_id: String },

    #[error("Correct post data required for this hook to run")]
    MissingPayload,

    #[error("Malformed push payload: {0}")]
    MalformedPayload(String),

    #[error("Commit has not been found in payload")]
    NoCommits,

    #[error("User {user} is not authorized to deploy '{site}' site")]
    UnauthorizedUser { user: String, site: String },

    #[error("Deployment branch has not been found in branches: {}", .pushed.join(", "))]
    NoMatchingBranch { pushed: Vec<String> },

    #[error("Couldn't find directory ({}) on server which is specified in config for site {site}", .directory.display())]
    DirectoryNotFound { site: String, directory: PathBuf },

    #[error("Git command execution is not available on the server (checked '{git_path}')")]
    ExecutionDisabled { git_path: String },

    #[error("Resetting repository failed: {0}")]
    ResetFailed(String),

    #[error("Pulling changes failed: {0}")]
    PullFailed(String),

    #[error("Config file could not be read: {path}: {reason}")]
    ConfigReadError { path: String, reason: String },

    #[error("Couldn't find any site in config. At least one site must be specified")]
    ConfigNoSites,
}

impl DeployError {
    /// Errors the transport answers with a 403 instead of a plain 200.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            DeployError::UnauthorizedSource { .. } | DeployError::MissingPayload
        )
    }
}

/// Helper type for Results that use DeployError
pub type Result<T> = std::result::Result<T, DeployError>;
