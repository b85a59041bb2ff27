use super::*;
use schema::{CaseRecord, Contact};
use std::collections::HashMap;
use std::sync::Arc;

use super::request::{parse_http_request_bytes, parse_request_line, split_target};

fn sample_runtime() -> SharedRuntime {
    Arc::new(CaseRuntime::in_memory())
}

fn guarded_runtime(secret: &str) -> SharedRuntime {
    Arc::new(
        CaseRuntime::in_memory().with_shared_secret(SharedSecret::from_configured(Some(
            secret.to_string(),
        ))),
    )
}

fn request(method: &str, target: &str, body: &str) -> HttpRequest {
    let mut headers = HashMap::new();
    if !body.is_empty() {
        headers.insert("content-type".to_string(), "application/json".to_string());
    }
    HttpRequest {
        method: method.to_string(),
        target: target.to_string(),
        headers,
        body: body.as_bytes().to_vec(),
    }
}

fn with_token(mut request: HttpRequest, token: &str) -> HttpRequest {
    request
        .headers
        .insert(SHARED_SECRET_HEADER.to_string(), token.to_string());
    request
}

fn body_json(response: &HttpResponse) -> serde_json::Value {
    serde_json::from_slice(&response.body).expect("response body should be JSON")
}

fn sample_case(id: i64) -> CaseRecord {
    CaseRecord {
        id,
        title: format!("Case {id}"),
        status: "Offen".to_string(),
        contacts: vec![Contact {
            company: "Acme GmbH".to_string(),
            email: "hr@acme.example".to_string(),
            postal_code: "10117".to_string(),
        }],
        ..CaseRecord::default()
    }
}

async fn seed(runtime: &SharedRuntime, ids: &[i64]) {
    runtime
        .store()
        .set_all(ids.iter().map(|id| sample_case(*id)).collect())
        .await
        .unwrap();
}

#[tokio::test]
async fn full_case_lifecycle_round_trips_through_routes() {
    let runtime = sample_runtime();

    let created = handle_request(
        &runtime,
        &request(
            "POST",
            "/api/cases",
            r#"{"id":1,"title":"X","status":"Open","createdAt":"2025-01-01","summary":"s","applicantName":"A","postalCode":"10115","original_cv_url":"","redacted_cv_url":"","email_subject":"","email_body":"","contacts":[]}"#,
        ),
    )
    .await;
    assert_eq!(created.status, 200);
    assert_eq!(body_json(&created), serde_json::json!({"ok": true, "count": 1}));

    let listed = handle_request(&runtime, &request("GET", "/api/cases", "")).await;
    assert_eq!(listed.status, 200);
    let listed = body_json(&listed);
    assert_eq!(listed["cases"][0]["title"], "X");
    assert_eq!(listed["cases"][0]["applicantName"], "A");

    let patched = handle_request(
        &runtime,
        &request("PATCH", "/api/cases/1", r#"{"status":"Closed"}"#),
    )
    .await;
    assert_eq!(patched.status, 200);
    let patched = body_json(&patched);
    assert_eq!(patched["ok"], true);
    assert_eq!(patched["case"]["status"], "Closed");
    assert_eq!(patched["case"]["title"], "X");
    assert_eq!(patched["case"]["summary"], "s");

    let assigned = handle_request(
        &runtime,
        &request(
            "POST",
            "/api/caselink",
            r#"{"caseId":"1","link":"https://x/y"}"#,
        ),
    )
    .await;
    assert_eq!(assigned.status, 200);
    let assigned = body_json(&assigned);
    assert_eq!(assigned["message"], "Case link updated successfully.");
    assert_eq!(assigned["case"]["confirm_url"], "https://x/y");

    let status = handle_request(&runtime, &request("GET", "/api/caselink?caseId=1", "")).await;
    assert_eq!(status.status, 200);
    assert_eq!(
        body_json(&status),
        serde_json::json!({"id": 1, "confirm_url": "https://x/y"})
    );
}

#[tokio::test]
async fn bulk_insert_accepts_arrays_and_rejects_invalid_json() {
    let runtime = sample_runtime();
    let response = handle_request(
        &runtime,
        &request("POST", "/api/cases", r#"[{"id":1},{"id":2},{"id":3}]"#),
    )
    .await;
    assert_eq!(body_json(&response)["count"], 3);

    let response = handle_request(&runtime, &request("POST", "/api/cases", "{not json")).await;
    assert_eq!(response.status, 400);
    assert_eq!(body_json(&response), serde_json::json!({"error": "invalid_json"}));
    assert_eq!(runtime.store().len().await.unwrap(), 3);
}

#[tokio::test]
async fn write_routes_require_shared_secret_when_configured() {
    let runtime = guarded_runtime("s3cret");
    seed(&runtime, &[1]).await;

    let missing = handle_request(&runtime, &request("POST", "/api/cases", r#"{"id":2}"#)).await;
    assert_eq!(missing.status, 401);
    assert_eq!(body_json(&missing), serde_json::json!({"error": "unauthorized"}));

    let wrong = handle_request(
        &runtime,
        &with_token(request("POST", "/api/cases", r#"{"id":2}"#), "nope"),
    )
    .await;
    assert_eq!(wrong.status, 401);
    assert_eq!(runtime.store().len().await.unwrap(), 1);

    let patch_denied = handle_request(
        &runtime,
        &request("PATCH", "/api/cases/1", r#"{"status":"Closed"}"#),
    )
    .await;
    assert_eq!(patch_denied.status, 401);
    assert_eq!(runtime.store().find(1).await.unwrap().unwrap().status, "Offen");

    let allowed = handle_request(
        &runtime,
        &with_token(request("POST", "/api/cases", r#"{"id":2}"#), "s3cret"),
    )
    .await;
    assert_eq!(allowed.status, 200);
    assert_eq!(runtime.store().len().await.unwrap(), 2);
}

#[tokio::test]
async fn auth_is_checked_before_body_and_id_validation() {
    let runtime = guarded_runtime("s3cret");
    let response = handle_request(&runtime, &request("PATCH", "/api/cases/abc", "{bad")).await;
    assert_eq!(response.status, 401);
    let response = handle_request(&runtime, &request("POST", "/api/cases", "{bad")).await;
    assert_eq!(response.status, 401);
}

#[tokio::test]
async fn read_routes_stay_open_with_shared_secret() {
    let runtime = guarded_runtime("s3cret");
    seed(&runtime, &[4]).await;
    let listed = handle_request(&runtime, &request("GET", "/api/cases", "")).await;
    assert_eq!(listed.status, 200);
    let status = handle_request(&runtime, &request("GET", "/api/caselink?caseId=4", "")).await;
    assert_eq!(status.status, 200);
    let assigned = handle_request(
        &runtime,
        &request("POST", "/api/caselink", r#"{"caseId":4,"link":"https://c/4"}"#),
    )
    .await;
    assert_eq!(assigned.status, 200);
}

#[tokio::test]
async fn patch_validates_id_body_and_existence() {
    let runtime = sample_runtime();
    seed(&runtime, &[1]).await;

    let response = handle_request(&runtime, &request("PATCH", "/api/cases/abc", "{}")).await;
    assert_eq!(response.status, 400);
    assert_eq!(body_json(&response), serde_json::json!({"error": "invalid_id"}));

    let response = handle_request(&runtime, &request("PATCH", "/api/cases/1", "[1,2]")).await;
    assert_eq!(response.status, 400);
    assert_eq!(body_json(&response), serde_json::json!({"error": "invalid_json"}));

    let response = handle_request(
        &runtime,
        &request("PATCH", "/api/cases/99", r#"{"status":"Closed"}"#),
    )
    .await;
    assert_eq!(response.status, 404);
    assert_eq!(body_json(&response), serde_json::json!({"error": "not_found"}));
    assert_eq!(runtime.store().list().await.unwrap(), vec![sample_case(1)]);
}

#[tokio::test]
async fn patch_cannot_rewrite_id_or_contacts() {
    let runtime = sample_runtime();
    seed(&runtime, &[1]).await;
    let response = handle_request(
        &runtime,
        &request("PATCH", "/api/cases/1", r#"{"id":5,"contacts":[],"title":"neu"}"#),
    )
    .await;
    assert_eq!(response.status, 200);
    let stored = runtime.store().find(1).await.unwrap().unwrap();
    assert_eq!(stored.title, "neu");
    assert_eq!(stored.contacts.len(), 1);
    assert!(runtime.store().find(5).await.unwrap().is_none());
}

#[tokio::test]
async fn link_status_requires_known_numeric_case_id() {
    let runtime = sample_runtime();
    seed(&runtime, &[1]).await;

    let missing = handle_request(&runtime, &request("GET", "/api/caselink", "")).await;
    assert_eq!(missing.status, 400);
    let empty = handle_request(&runtime, &request("GET", "/api/caselink?caseId=", "")).await;
    assert_eq!(empty.status, 400);
    let invalid = handle_request(&runtime, &request("GET", "/api/caselink?caseId=abc", "")).await;
    assert_eq!(invalid.status, 400);

    let unknown = handle_request(&runtime, &request("GET", "/api/caselink?caseId=9", "")).await;
    assert_eq!(unknown.status, 404);

    let known = handle_request(&runtime, &request("GET", "/api/caselink?caseId=1", "")).await;
    assert_eq!(
        body_json(&known),
        serde_json::json!({"id": 1, "confirm_url": null})
    );
}

#[tokio::test]
async fn link_assignment_validates_body() {
    let runtime = sample_runtime();
    seed(&runtime, &[1]).await;

    let missing_link = handle_request(
        &runtime,
        &request("POST", "/api/caselink", r#"{"caseId":1}"#),
    )
    .await;
    assert_eq!(missing_link.status, 400);

    let empty_id = handle_request(
        &runtime,
        &request("POST", "/api/caselink", r#"{"caseId":"","link":"https://x"}"#),
    )
    .await;
    assert_eq!(empty_id.status, 400);

    let unknown = handle_request(
        &runtime,
        &request("POST", "/api/caselink", r#"{"caseId":2,"link":"https://x"}"#),
    )
    .await;
    assert_eq!(unknown.status, 404);

    let broken = handle_request(&runtime, &request("POST", "/api/caselink", "{oops")).await;
    assert_eq!(broken.status, 500);
    assert_eq!(
        body_json(&broken),
        serde_json::json!({"error": "Internal Server Error"})
    );
    assert!(runtime.store().find(1).await.unwrap().unwrap().confirm_url.is_none());
}

#[tokio::test]
async fn link_assignment_store_failure_is_internal_error() {
    let server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .respond_with(
            wiremock::ResponseTemplate::new(500)
                .set_body_json(serde_json::json!({"error": "ERR down"})),
        )
        .mount(&server)
        .await;
    let backend = store::KvBackend::new(&server.uri(), "kv-token").unwrap();
    let runtime: SharedRuntime = Arc::new(CaseRuntime::new(
        CaseStore::new(Arc::new(backend)),
        BackendSelection {
            kind: store::BackendKind::ExternalKv,
            fallback_reason: None,
        },
        SharedSecret::open(),
        UploadTarget::LocalDir(std::env::temp_dir()),
    ));

    let response = handle_request(
        &runtime,
        &request("POST", "/api/caselink", r#"{"caseId":1,"link":"https://x/y"}"#),
    )
    .await;
    assert_eq!(response.status, 500);
    assert_eq!(
        body_json(&response),
        serde_json::json!({"error": "Internal Server Error"})
    );

    let listed = handle_request(&runtime, &request("GET", "/api/cases", "")).await;
    assert_eq!(listed.status, 500);
    assert_eq!(body_json(&listed), serde_json::json!({"error": "store_unavailable"}));

    let metrics = handle_request(&runtime, &request("GET", "/metrics", "")).await;
    let text = String::from_utf8(metrics.body).unwrap();
    assert!(text.contains("casedesk_request_failure_total 2\n"));
}

#[tokio::test]
async fn later_link_assignment_overwrites_earlier_one() {
    let runtime = sample_runtime();
    seed(&runtime, &[1]).await;
    for link in ["https://first", "https://second"] {
        let body = format!(r#"{{"caseId":1,"link":"{link}"}}"#);
        let response = handle_request(&runtime, &request("POST", "/api/caselink", &body)).await;
        assert_eq!(response.status, 200);
    }
    let status = handle_request(&runtime, &request("GET", "/api/caselink?caseId=1", "")).await;
    assert_eq!(body_json(&status)["confirm_url"], "https://second");
}

#[tokio::test]
async fn unknown_paths_and_methods_are_rejected() {
    let runtime = sample_runtime();
    let response = handle_request(&runtime, &request("GET", "/api/nothing", "")).await;
    assert_eq!(response.status, 404);
    let response = handle_request(&runtime, &request("DELETE", "/api/cases", "")).await;
    assert_eq!(response.status, 405);
    let response = handle_request(&runtime, &request("GET", "/api/cases/1", "")).await;
    assert_eq!(response.status, 405);
    let response = handle_request(&runtime, &request("PUT", "/api/caselink", "")).await;
    assert_eq!(response.status, 405);
}

#[tokio::test]
async fn uploads_route_hides_missing_and_unsafe_files() {
    let temp = tempfile::tempdir().unwrap();
    std::fs::write(temp.path().join("original-1-abc.pdf"), b"%PDF").unwrap();
    let runtime: SharedRuntime = Arc::new(
        CaseRuntime::in_memory()
            .with_upload_target(UploadTarget::LocalDir(temp.path().to_path_buf())),
    );

    let found = handle_request(&runtime, &request("GET", "/uploads/original-1-abc.pdf", "")).await;
    assert_eq!(found.status, 200);
    assert_eq!(found.content_type, "application/pdf");
    assert_eq!(found.body, b"%PDF");

    let missing = handle_request(&runtime, &request("GET", "/uploads/other.pdf", "")).await;
    assert_eq!(missing.status, 404);
    let traversal = handle_request(&runtime, &request("GET", "/uploads/../secret", "")).await;
    assert_eq!(traversal.status, 404);
}

#[tokio::test]
async fn metrics_endpoint_reports_counters() {
    let runtime = guarded_runtime("s3cret");
    let _ = handle_request(
        &runtime,
        &with_token(request("POST", "/api/cases", r#"[{"id":1},{"id":2}]"#), "s3cret"),
    )
    .await;
    let _ = handle_request(&runtime, &request("POST", "/api/cases", r#"{"id":3}"#)).await;
    let _ = handle_request(
        &runtime,
        &with_token(request("PATCH", "/api/cases/1", r#"{"title":"t"}"#), "s3cret"),
    )
    .await;
    let _ = handle_request(
        &runtime,
        &request("POST", "/api/caselink", r#"{"caseId":2,"link":"https://c"}"#),
    )
    .await;
    let _ = handle_request(&runtime, &request("POST", "/api/caselink", "{")).await;

    let response = handle_request(&runtime, &request("GET", "/metrics", "")).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "text/plain; version=0.0.4; charset=utf-8");
    let text = String::from_utf8(response.body).unwrap();
    assert!(text.contains("casedesk_cases_inserted_total 2\n"));
    assert!(text.contains("casedesk_case_patches_total 1\n"));
    assert!(text.contains("casedesk_links_assigned_total 1\n"));
    assert!(text.contains("casedesk_auth_failure_total 1\n"));
    assert!(text.contains("casedesk_request_failure_total 1\n"));
    assert!(text.contains("casedesk_records_total 2\n"));
    assert!(text.contains("# TYPE casedesk_uptime_seconds gauge"));
}

#[tokio::test]
async fn health_reports_fallback_reason() {
    let (store, selection) = store::CaseStore::from_config(&store::StoreConfig {
        kv_rest_url: Some("not a url".to_string()),
        kv_rest_token: Some("token".to_string()),
    });
    let runtime: SharedRuntime = Arc::new(CaseRuntime::new(
        store,
        selection,
        SharedSecret::open(),
        UploadTarget::LocalDir(std::path::PathBuf::from("unused")),
    ));
    let response = handle_request(&runtime, &request("GET", "/health", "")).await;
    let body = body_json(&response);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store_backend"], "memory");
    assert!(body["store_fallback_reason"].is_string());
}

#[test]
fn split_target_decodes_query_values() {
    let (path, query) = split_target("/api/caselink?caseId=%2012&x=a+b&caseId=9&flag");
    assert_eq!(path, "/api/caselink");
    assert_eq!(query.get("caseId").map(String::as_str), Some(" 12"));
    assert_eq!(query.get("x").map(String::as_str), Some("a b"));
    assert_eq!(query.get("flag").map(String::as_str), Some(""));
}

#[test]
fn parse_request_line_rejects_non_http1() {
    assert_eq!(
        parse_request_line("GET /health HTTP/1.1\r\n").unwrap(),
        ("GET".to_string(), "/health".to_string())
    );
    assert!(parse_request_line("GET /health HTTP/2").is_err());
    assert!(parse_request_line("GET").is_err());
}

#[test]
fn parse_http_request_bytes_reads_headers_and_body() {
    let raw = b"POST /api/cases HTTP/1.1\r\nX-Cases-Token: abc\r\nContent-Length: 8\r\n\r\n{\"id\":1}";
    let request = parse_http_request_bytes(raw).unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(request.header("x-cases-token"), Some("abc"));
    assert_eq!(request.body, b"{\"id\":1}");

    let truncated = b"POST /api/cases HTTP/1.1\r\nContent-Length: 20\r\n\r\n{}";
    assert!(parse_http_request_bytes(truncated).is_err());
    assert!(parse_http_request_bytes(b"GET / HTTP/1.1\r\n").is_err());
}

#[test]
fn rendered_response_carries_status_line_and_length() {
    let response = HttpResponse::error(404, "not_found");
    let rendered = String::from_utf8(render_response_bytes(&response)).unwrap();
    assert!(rendered.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(rendered.contains("Content-Length: 21\r\n"));
    assert!(rendered.ends_with("{\"error\":\"not_found\"}"));
}
