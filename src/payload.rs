//! Inbound push request and payload structures

use serde::Deserialize;

use crate::error::{DeployError, Result};

/// Transport-neutral view of one inbound webhook request
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    /// Origin identity declared by the caller (the `User-Agent` header over HTTP)
    pub source: Option<String>,
    /// Raw JSON push payload, if any was supplied
    pub payload: Option<String>,
    /// Request line and headers, kept for diagnostics only
    pub metadata: Vec<(String, String)>,
}

impl RawRequest {
    pub fn new(source: Option<String>, payload: Option<String>) -> Self {
        Self {
            source,
            payload,
            metadata: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Vec<(String, String)>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Payload text, treating an empty or blank body as absent.
    pub fn payload_text(&self) -> Option<&str> {
        self.payload
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }

    pub fn describe_metadata(&self) -> String {
        self.metadata
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A single pushed commit. Only `branch` takes part in matching.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Commit {
    pub branch: String,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Push notification: who pushed and which commits
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PushPayload {
    pub user: String,
    #[serde(default)]
    pub commits: Vec<Commit>,
}

impl PushPayload {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| DeployError::MalformedPayload(e.to_string()))
    }

    /// Branch names in commit order, duplicates included.
    pub fn branch_names(&self) -> Vec<String> {
        self.commits.iter().map(|c| c.branch.clone()).collect()
    }
}
