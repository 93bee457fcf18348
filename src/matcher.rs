//! Decides which pushed branches map to configured sites, and whether the
//! pusher may deploy them.

use crate::error::{DeployError, Result};
use crate::payload::PushPayload;
use crate::site::SiteRegistry;

/// Outcome of matching one push against the site registry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    /// Every pushed branch, in commit order (diagnostics only)
    pub pushed_branches: Vec<String>,
    /// Branches that matched a site and passed authorization.
    /// May contain repeats; callers deduplicate before deploying.
    pub matched_branches: Vec<String>,
}

impl MatchResult {
    /// Matched branches with repeats removed, first occurrence wins.
    pub fn unique_matched(&self) -> Vec<String> {
        let mut unique: Vec<String> = Vec::new();
        for branch in &self.matched_branches {
            if !unique.contains(branch) {
                unique.push(branch.clone());
            }
        }
        unique
    }
}

pub struct BranchMatcher<'a> {
    registry: &'a SiteRegistry,
}

impl<'a> BranchMatcher<'a> {
    pub fn new(registry: &'a SiteRegistry) -> Self {
        Self { registry }
    }

    /// Match every commit of `payload` against the registry.
    ///
    /// Fails closed: one commit targeting a site the pusher is not
    /// authorized for fails the whole push, including sites they could
    /// otherwise deploy.
    pub fn match_branches(&self, payload: &PushPayload) -> Result<MatchResult> {
        if payload.commits.is_empty() {
            return Err(DeployError::NoCommits);
        }

        let mut result = MatchResult::default();
        for commit in &payload.commits {
            result.pushed_branches.push(commit.branch.clone());

            for site in self.registry.sites_for_branch(&commit.branch) {
                if !site.is_authorized(&payload.user) {
                    return Err(DeployError::UnauthorizedUser {
                        user: payload.user.clone(),
                        site: site.name.clone(),
                    });
                }
                result.matched_branches.push(commit.branch.clone());
            }
        }

        Ok(result)
    }
}
