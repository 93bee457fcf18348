//! Top-level handling of one push: source check, matching, then one
//! deployment per matched site.

use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::error::{DeployError, Result};
use crate::matcher::BranchMatcher;
use crate::payload::{PushPayload, RawRequest};
use crate::runner::{DeployContext, DeploymentOutcome, DeploymentRunner};
use crate::site::SiteRegistry;

/// Result of deploying one site
#[derive(Debug)]
pub struct SiteOutcome {
    pub site: String,
    pub branch: String,
    pub outcome: DeploymentOutcome,
}

/// Everything one dispatch did, for callers and tests
#[derive(Debug)]
pub struct DispatchReport {
    pub id: Uuid,
    pub pushed_branches: Vec<String>,
    /// Matched branches, deduplicated, in first-push order
    pub matched_branches: Vec<String>,
    pub outcomes: Vec<SiteOutcome>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_ok()).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded() == self.outcomes.len()
    }
}

pub type DispatchResult = Result<DispatchReport>;

pub struct DeploymentDispatcher {
    registry: SiteRegistry,
    runner: DeploymentRunner,
    expected_source: String,
}

impl DeploymentDispatcher {
    pub fn new(
        registry: SiteRegistry,
        runner: DeploymentRunner,
        expected_source: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            runner,
            expected_source: expected_source.into(),
        }
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    /// Handle one webhook request.
    ///
    /// Every outcome, including rejections, is logged before returning.
    pub async fn handle(&self, request: &RawRequest) -> DispatchResult {
        let id = Uuid::now_v7();
        let span = info_span!("dispatch", id = %id);

        async {
            let result = self.dispatch(id, request).await;
            match &result {
                Ok(report) => info!(
                    "Push handled: {} of {} site(s) deployed",
                    report.succeeded(),
                    report.outcomes.len()
                ),
                Err(e) => error!("{}", e),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, id: Uuid, request: &RawRequest) -> DispatchResult {
        let source = request.source.as_deref().unwrap_or_default();
        if source != self.expected_source {
            return Err(DeployError::UnauthorizedSource {
                source_id: source.to_string(),
            });
        }

        let raw = request.payload_text().ok_or(DeployError::MissingPayload)?;
        let payload = PushPayload::parse(raw)?;

        let matched = BranchMatcher::new(&self.registry).match_branches(&payload)?;
        if matched.matched_branches.is_empty() {
            return Err(DeployError::NoMatchingBranch {
                pushed: matched.pushed_branches,
            });
        }

        let ctx = DeployContext {
            payload: &payload,
            request,
        };
        let unique = matched.unique_matched();
        let mut outcomes = Vec::new();
        for branch in &unique {
            for site in self.registry.sites_for_branch(branch) {
                let outcome = self.runner.deploy(site, ctx).await;
                if let Err(e) = &outcome {
                    error!("Deployment of site '{}' failed: {}", site.name, e);
                }
                outcomes.push(SiteOutcome {
                    site: site.name.clone(),
                    branch: branch.clone(),
                    outcome,
                });
            }
        }

        Ok(DispatchReport {
            id,
            pushed_branches: matched.pushed_branches,
            matched_branches: unique,
            outcomes,
        })
    }
}
