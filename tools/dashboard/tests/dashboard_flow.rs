use std::time::Duration;

use dashboard::{
    cache::LocalCache,
    client::CaseApiClient,
    detail::{ConfirmOutcome, confirm},
    state::Dashboard,
};
use schema::CaseRecord;
use serde_json::json;
use tokio::sync::watch;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(id: i64, title: &str) -> CaseRecord {
    CaseRecord {
        id,
        title: title.to_string(),
        status: "Offen".to_string(),
        ..CaseRecord::default()
    }
}

async fn mock_cases(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/cases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn dashboard_for(server: &MockServer, cache: &LocalCache) -> Dashboard {
    Dashboard::new(CaseApiClient::new(&server.uri()).unwrap(), cache.clone())
}

#[tokio::test]
async fn empty_server_list_keeps_cached_cases() {
    let server = MockServer::start().await;
    mock_cases(&server, json!({"cases": []})).await;
    let temp = tempfile::tempdir().unwrap();
    let cache = LocalCache::new(temp.path().join("cachedCaseData.json"));
    cache.store(&[record(1, "Cached")]).unwrap();

    let mut dashboard = dashboard_for(&server, &cache);
    dashboard.mount().await;

    assert!(!dashboard.state().loading);
    assert_eq!(dashboard.state().cases, vec![record(1, "Cached")]);
    assert_eq!(cache.load(), vec![record(1, "Cached")]);
}

#[tokio::test]
async fn non_empty_server_list_replaces_state_and_cache() {
    let server = MockServer::start().await;
    mock_cases(&server, json!([{"id": 2, "title": "Fresh", "status": "Offen"}])).await;
    let temp = tempfile::tempdir().unwrap();
    let cache = LocalCache::new(temp.path().join("cachedCaseData.json"));
    cache.store(&[record(1, "Cached")]).unwrap();

    let mut dashboard = dashboard_for(&server, &cache);
    dashboard.mount().await;

    assert_eq!(dashboard.state().cases, vec![record(2, "Fresh")]);
    assert_eq!(cache.load(), vec![record(2, "Fresh")]);
}

#[tokio::test]
async fn unreachable_server_ends_loading_with_empty_state() {
    let temp = tempfile::tempdir().unwrap();
    let cache = LocalCache::new(temp.path().join("cachedCaseData.json"));
    let mut dashboard = Dashboard::new(CaseApiClient::new("http://127.0.0.1:9").unwrap(), cache);
    dashboard.mount().await;
    assert!(!dashboard.state().loading);
    assert!(dashboard.state().cases.is_empty());
}

#[tokio::test]
async fn polling_applies_found_links_and_skips_failures() {
    let server = MockServer::start().await;
    mock_cases(
        &server,
        json!({"cases": [
            {"id": 1, "title": "A", "status": "Offen"},
            {"id": 2, "title": "B", "status": "Offen"},
            {"id": 3, "title": "C", "status": "Offen", "confirm_url": "https://c/3"}
        ]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/caselink"))
        .and(query_param("caseId", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "confirm_url": "https://c/1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/caselink"))
        .and(query_param("caseId", "2"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "missing"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/caselink"))
        .and(query_param("caseId", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 3, "confirm_url": "x"})))
        .expect(0)
        .mount(&server)
        .await;

    let temp = tempfile::tempdir().unwrap();
    let cache = LocalCache::new(temp.path().join("cachedCaseData.json"));
    let mut dashboard = dashboard_for(&server, &cache);
    dashboard.mount().await;

    assert_eq!(dashboard.poll_links().await, 1);
    let state = dashboard.state();
    assert_eq!(state.find(1).unwrap().confirm_url(), Some("https://c/1"));
    assert_eq!(state.find(2).unwrap().confirm_url(), None);
    assert_eq!(
        cache.load().iter().find(|r| r.id == 1).unwrap().confirm_url(),
        Some("https://c/1")
    );

    // only case 2 is still pending; its 404 changes nothing
    assert_eq!(dashboard.poll_links().await, 0);
}

#[tokio::test]
async fn results_arriving_after_shutdown_are_discarded() {
    let server = MockServer::start().await;
    mock_cases(&server, json!([{"id": 1, "title": "A"}])).await;
    Mock::given(method("GET"))
        .and(path("/api/caselink"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "confirm_url": "https://c/1"})))
        .mount(&server)
        .await;

    let temp = tempfile::tempdir().unwrap();
    let cache = LocalCache::new(temp.path().join("cachedCaseData.json"));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut dashboard = dashboard_for(&server, &cache).with_shutdown(shutdown_rx);
    dashboard.mount().await;

    shutdown_tx.send(true).unwrap();
    assert_eq!(dashboard.poll_links().await, 0);
    assert_eq!(dashboard.state().find(1).unwrap().confirm_url(), None);
}

#[tokio::test]
async fn watch_polls_on_interval_until_shutdown() {
    let server = MockServer::start().await;
    mock_cases(&server, json!([{"id": 5, "title": "E"}])).await;
    Mock::given(method("GET"))
        .and(path("/api/caselink"))
        .and(query_param("caseId", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5, "confirm_url": "https://c/5"})))
        .mount(&server)
        .await;

    let temp = tempfile::tempdir().unwrap();
    let cache = LocalCache::new(temp.path().join("cachedCaseData.json"));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut dashboard = dashboard_for(&server, &cache).with_shutdown(shutdown_rx);
    dashboard.mount().await;

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        shutdown_tx.send(true).unwrap();
    });
    let mut renders = 0;
    dashboard
        .watch(Duration::from_millis(50), |state| {
            renders += 1;
            assert!(state.pending_link_ids().is_empty());
        })
        .await;
    stopper.await.unwrap();

    assert_eq!(renders, 1);
    assert_eq!(dashboard.state().find(5).unwrap().confirm_url(), Some("https://c/5"));
}

#[tokio::test]
async fn confirm_posts_to_assigned_link() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/confirm/7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/confirm/8"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = CaseApiClient::new(&server.uri()).unwrap();
    let mut item = record(7, "G");
    item.confirm_url = Some(format!("{}/confirm/7", server.uri()));
    assert_eq!(confirm(&client, &item).await, ConfirmOutcome::Sent);

    let mut failing = record(8, "H");
    failing.confirm_url = Some(format!("{}/confirm/8", server.uri()));
    assert!(matches!(confirm(&client, &failing).await, ConfirmOutcome::Failed(_)));

    assert_eq!(confirm(&client, &record(9, "I")).await, ConfirmOutcome::NoUrl);
}
