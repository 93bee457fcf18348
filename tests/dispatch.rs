//! End-to-end dispatch behaviour against a recording git fake

mod common;

use common::{FakeGit, SOURCE, dispatcher, push_json, site};
use deploy_hook::error::DeployError;
use deploy_hook::logging::{DeployLog, DeployLogLayer};
use deploy_hook::payload::RawRequest;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;

fn request(payload: &str) -> RawRequest {
    RawRequest::new(Some(SOURCE.to_string()), Some(payload.to_string()))
}

#[tokio::test]
async fn authorized_push_deploys_matching_site() {
    let dir = tempfile::tempdir().unwrap();
    let git = Arc::new(FakeGit::default());
    let dispatcher = dispatcher(vec![site("www", "main", dir.path(), &["alice"])], git.clone());

    let report = dispatcher
        .handle(&request(r#"{"user":"alice","commits":[{"branch":"main"}]}"#))
        .await
        .unwrap();

    assert_eq!(report.matched_branches, vec!["main"]);
    assert_eq!(report.outcomes.len(), 1);
    assert!(report.all_succeeded());
    assert_eq!(report.outcomes[0].site, "www");
    assert_eq!(git.pulls_in(dir.path()), 1);
}

#[tokio::test]
async fn unauthorized_pusher_deploys_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let git = Arc::new(FakeGit::default());
    let dispatcher = dispatcher(vec![site("www", "main", dir.path(), &["bob"])], git.clone());

    let err = dispatcher
        .handle(&request(r#"{"user":"alice","commits":[{"branch":"main"}]}"#))
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::UnauthorizedUser { .. }));
    assert!(git.calls().is_empty());
}

#[tokio::test]
async fn one_unauthorized_site_blocks_every_site_in_the_push() {
    let staging = tempfile::tempdir().unwrap();
    let www = tempfile::tempdir().unwrap();
    let git = Arc::new(FakeGit::default());
    let dispatcher = dispatcher(
        vec![
            site("staging", "develop", staging.path(), &["alice", "bob"]),
            site("www", "main", www.path(), &["alice"]),
        ],
        git.clone(),
    );

    let err = dispatcher
        .handle(&request(&push_json("bob", &["develop", "main"])))
        .await
        .unwrap_err();

    match err {
        DeployError::UnauthorizedUser { user, site } => {
            assert_eq!(user, "bob");
            assert_eq!(site, "www");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(git.calls().is_empty());
}

#[tokio::test]
async fn branch_shared_by_two_sites_deploys_each_once() {
    let www = tempfile::tempdir().unwrap();
    let mirror = tempfile::tempdir().unwrap();
    let git = Arc::new(FakeGit::default());
    let dispatcher = dispatcher(
        vec![
            site("www", "main", www.path(), &["alice"]),
            site("mirror", "main", mirror.path(), &["alice"]),
        ],
        git.clone(),
    );

    let report = dispatcher
        .handle(&request(&push_json("alice", &["main"])))
        .await
        .unwrap();

    let sites: Vec<_> = report.outcomes.iter().map(|o| o.site.as_str()).collect();
    assert_eq!(sites, vec!["www", "mirror"]);
    assert_eq!(git.pulls_in(www.path()), 1);
    assert_eq!(git.pulls_in(mirror.path()), 1);
}

#[tokio::test]
async fn branch_pushed_twice_deploys_once() {
    let dir = tempfile::tempdir().unwrap();
    let git = Arc::new(FakeGit::default());
    let dispatcher = dispatcher(vec![site("www", "main", dir.path(), &["alice"])], git.clone());

    let report = dispatcher
        .handle(&request(&push_json("alice", &["main", "feature", "main"])))
        .await
        .unwrap();

    assert_eq!(report.pushed_branches, vec!["main", "feature", "main"]);
    assert_eq!(report.matched_branches, vec!["main"]);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(git.pulls_in(dir.path()), 1);
}

#[tokio::test]
async fn failing_site_does_not_stop_the_next() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("not-there");
    let good = tempfile::tempdir().unwrap();
    let git = Arc::new(FakeGit::default());
    let dispatcher = dispatcher(
        vec![
            site("broken", "main", &missing, &["alice"]),
            site("www", "main", good.path(), &["alice"]),
        ],
        git.clone(),
    );

    let report = dispatcher
        .handle(&request(&push_json("alice", &["main"])))
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert!(matches!(
        report.outcomes[0].outcome,
        Err(DeployError::DirectoryNotFound { .. })
    ));
    assert!(report.outcomes[1].outcome.is_ok());
    assert_eq!(report.succeeded(), 1);
    assert!(!report.all_succeeded());
    assert_eq!(git.pulls_in(good.path()), 1);
}

#[tokio::test]
async fn pull_failure_is_reported_per_site() {
    let dir = tempfile::tempdir().unwrap();
    let git = Arc::new(FakeGit::failing(&["pull"]));
    let dispatcher = dispatcher(vec![site("www", "main", dir.path(), &["alice"])], git.clone());

    let report = dispatcher
        .handle(&request(&push_json("alice", &["main"])))
        .await
        .unwrap();

    match &report.outcomes[0].outcome {
        Err(DeployError::PullFailed(msg)) => assert_eq!(msg, "fatal: pull failed"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn request_level_failures() {
    let dir = tempfile::tempdir().unwrap();
    let git = Arc::new(FakeGit::default());
    let dispatcher = dispatcher(vec![site("www", "main", dir.path(), &["alice"])], git.clone());

    let foreign = RawRequest::new(Some("curl/8.5".into()), Some(push_json("alice", &["main"])));
    assert!(matches!(
        dispatcher.handle(&foreign).await,
        Err(DeployError::UnauthorizedSource { .. })
    ));

    // Source identity is compared case-sensitively
    let lowercase = RawRequest::new(Some("bitbucket.org".into()), Some(push_json("alice", &["main"])));
    assert!(matches!(
        dispatcher.handle(&lowercase).await,
        Err(DeployError::UnauthorizedSource { .. })
    ));

    let anonymous = RawRequest::new(None, Some(push_json("alice", &["main"])));
    assert!(matches!(
        dispatcher.handle(&anonymous).await,
        Err(DeployError::UnauthorizedSource { .. })
    ));

    let empty = RawRequest::new(Some(SOURCE.into()), None);
    assert!(matches!(
        dispatcher.handle(&empty).await,
        Err(DeployError::MissingPayload)
    ));

    assert!(matches!(
        dispatcher.handle(&request("{not json")).await,
        Err(DeployError::MalformedPayload(_))
    ));

    assert!(matches!(
        dispatcher.handle(&request(r#"{"user":"alice","commits":[]}"#)).await,
        Err(DeployError::NoCommits)
    ));

    match dispatcher.handle(&request(&push_json("alice", &["dev", "feature/x"]))).await {
        Err(DeployError::NoMatchingBranch { pushed }) => {
            assert_eq!(pushed, vec!["dev", "feature/x"]);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert!(git.calls().is_empty());
}

#[tokio::test]
async fn outcomes_reach_the_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("deploy.log");
    let sink = Arc::new(DeployLog::new(&log_path));
    let _guard = tracing::subscriber::set_default(
        tracing_subscriber::registry().with(DeployLogLayer::new(sink)),
    );

    let git = Arc::new(FakeGit::default());
    let dispatcher = dispatcher(vec![site("www", "main", dir.path(), &["alice"])], git);

    dispatcher
        .handle(&request(&push_json("alice", &["main"])))
        .await
        .unwrap();
    let _ = dispatcher
        .handle(&request(&push_json("mallory", &["main"])))
        .await;

    let contents = std::fs::read_to_string(&log_path).unwrap();
    assert!(contents.contains("- [INFO] Attempting deployment for main by alice"));
    assert!(contents.contains("- [INFO] Pulling in changes\npull done"));
    assert!(contents.contains("- [INFO] Deployment successful for site 'www'"));
    assert!(contents.contains("- [ERROR] User mallory is not authorized to deploy 'www' site"));
}
