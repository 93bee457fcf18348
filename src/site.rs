//! Deployment targets ("sites") and the registry they are looked up in

use serde::Deserialize;
use std::path::PathBuf;

fn default_remote() -> String {
    "origin".to_string()
}

/// One configured deployment target: a working directory kept in sync with
/// `remote/branch`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub name: String,
    pub branch: String,
    pub directory: PathBuf,
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default)]
    pub clear_directory_on_deploy: bool,
    #[serde(default)]
    pub has_submodules: bool,
    #[serde(default)]
    pub authorized_users: Vec<String>,
}

impl SiteConfig {
    /// Returns true if `user` may deploy this site (exact, case-sensitive match).
    pub fn is_authorized(&self, user: &str) -> bool {
        self.authorized_users.iter().any(|u| u == user)
    }
}

/// Ordered, read-only view over the configured sites.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: Vec<SiteConfig>,
}

impl SiteRegistry {
    pub fn new(sites: Vec<SiteConfig>) -> Self {
        Self { sites }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteConfig> {
        self.sites.iter()
    }

    /// Sites declaring `branch`, in configuration order.
    pub fn sites_for_branch<'a>(
        &'a self,
        branch: &'a str,
    ) -> impl Iterator<Item = &'a SiteConfig> + 'a {
        self.sites.iter().filter(move |site| site.branch == branch)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

impl From<Vec<SiteConfig>> for SiteRegistry {
    fn from(sites: Vec<SiteConfig>) -> Self {
        Self::new(sites)
    }
}
