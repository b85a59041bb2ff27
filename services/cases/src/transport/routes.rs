use std::collections::HashMap;

use auth::SHARED_SECRET_HEADER;
use schema::{CaseBatch, CasePatch, parse_case_id};

use super::{
    CaseRuntime, HttpRequest, HttpResponse, SharedRuntime, map_store_error, map_upload_error,
    request::split_target,
};
use crate::{
    api::{
        AssignLinkRequest, AssignLinkResponse, InsertCasesResponse, ListCasesResponse,
        PatchCaseResponse, UploadResponse, UploadUrls,
    },
    assign_confirm_link, insert_cases, link_status, patch_case,
    upload::{UploadError, UploadForm, read_upload_form},
};

const KNOWN_PATHS: &[&str] = &[
    "/health",
    "/metrics",
    "/api/cases",
    "/api/caselink",
    "/api/upload",
];
const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

pub(crate) async fn handle_request(runtime: &SharedRuntime, request: &HttpRequest) -> HttpResponse {
    let (path, query) = split_target(&request.target);
    let method = request.method.as_str();
    let response = match (method, path.as_str()) {
        ("GET", "/health") => health(runtime),
        ("GET", "/metrics") => HttpResponse::ok_text(runtime.metrics_text().await),
        ("GET", "/api/cases") => list_cases(runtime).await,
        ("POST", "/api/cases") => insert(runtime, request).await,
        ("GET", "/api/caselink") => read_link(runtime, &query).await,
        ("POST", "/api/caselink") => assign_link(runtime, request).await,
        ("POST", "/api/upload") => upload(runtime, request).await,
        (_, known) if KNOWN_PATHS.contains(&known) => HttpResponse::method_not_allowed(),
        (method, other) => {
            if let Some(raw_id) = other.strip_prefix("/api/cases/") {
                match method {
                    "PATCH" => patch(runtime, raw_id, request).await,
                    _ => HttpResponse::method_not_allowed(),
                }
            } else if let Some(file_name) = other.strip_prefix("/uploads/") {
                match method {
                    "GET" => serve_upload(runtime, file_name).await,
                    _ => HttpResponse::method_not_allowed(),
                }
            } else {
                HttpResponse::not_found("not_found")
            }
        }
    };
    if response.status >= 500 {
        runtime.observe_failure();
    }
    response
}

fn health(runtime: &CaseRuntime) -> HttpResponse {
    let selection = runtime.backend_selection();
    HttpResponse::ok_json(&serde_json::json!({
        "status": "ok",
        "store_backend": selection.kind.as_str(),
        "store_fallback_reason": selection.fallback_reason,
        "upload_target": runtime.upload_target().describe(),
    }))
}

fn store_failure(error: &store::StoreError) -> HttpResponse {
    let (status, code) = map_store_error(error);
    HttpResponse::error(status, code)
}

async fn list_cases(runtime: &CaseRuntime) -> HttpResponse {
    match runtime.store().list().await {
        Ok(cases) => HttpResponse::ok_json(&ListCasesResponse { cases }),
        Err(err) => store_failure(&err),
    }
}

async fn insert(runtime: &CaseRuntime, request: &HttpRequest) -> HttpResponse {
    if let Some(denied) = runtime.authorize_write("/api/cases", request.header(SHARED_SECRET_HEADER)) {
        return denied;
    }
    let batch: CaseBatch = match serde_json::from_slice(&request.body) {
        Ok(batch) => batch,
        Err(err) => {
            tracing::debug!(error = %err, "insert body rejected");
            return HttpResponse::bad_request("invalid_json");
        }
    };
    match insert_cases(runtime.store(), batch).await {
        Ok(count) => {
            runtime.observe_inserted(count);
            HttpResponse::ok_json(&InsertCasesResponse { ok: true, count })
        }
        Err(err) => store_failure(&err),
    }
}

async fn patch(runtime: &CaseRuntime, raw_id: &str, request: &HttpRequest) -> HttpResponse {
    if let Some(denied) =
        runtime.authorize_write("/api/cases/{id}", request.header(SHARED_SECRET_HEADER))
    {
        return denied;
    }
    let Some(id) = parse_case_id(raw_id) else {
        return HttpResponse::bad_request("invalid_id");
    };
    let patch: CasePatch = match serde_json::from_slice(&request.body) {
        Ok(patch) => patch,
        Err(err) => {
            tracing::debug!(case_id = id, error = %err, "patch body rejected");
            return HttpResponse::bad_request("invalid_json");
        }
    };
    match patch_case(runtime.store(), id, &patch).await {
        Ok(Some(case)) => {
            runtime.observe_patch();
            HttpResponse::ok_json(&PatchCaseResponse { ok: true, case })
        }
        Ok(None) => HttpResponse::not_found("not_found"),
        Err(err) => store_failure(&err),
    }
}

async fn read_link(runtime: &CaseRuntime, query: &HashMap<String, String>) -> HttpResponse {
    let Some(raw_id) = query.get("caseId").filter(|value| !value.trim().is_empty()) else {
        return HttpResponse::bad_request("Missing caseId query parameter.");
    };
    let Some(id) = parse_case_id(raw_id) else {
        return HttpResponse::bad_request("invalid_id");
    };
    match link_status(runtime.store(), id).await {
        Ok(Some(status)) => HttpResponse::ok_json(&status),
        Ok(None) => HttpResponse::not_found(&format!("Case with ID {id} not found in store.")),
        Err(err) => store_failure(&err),
    }
}

async fn assign_link(runtime: &CaseRuntime, request: &HttpRequest) -> HttpResponse {
    let body: AssignLinkRequest = match serde_json::from_slice(&request.body) {
        Ok(body) => body,
        Err(err) => {
            tracing::error!(error = %err, "link assignment body could not be parsed");
            return HttpResponse::error(500, INTERNAL_SERVER_ERROR);
        }
    };
    let (Some(case_id), Some(link)) = (body.case_id(), body.link()) else {
        return HttpResponse::bad_request("Missing caseId or link in request body.");
    };
    let Some(id) = case_id else {
        return HttpResponse::bad_request("invalid_id");
    };
    match assign_confirm_link(runtime.store(), id, link).await {
        Ok(Some(case)) => {
            runtime.observe_link_assigned();
            HttpResponse::ok_json(&AssignLinkResponse {
                message: "Case link updated successfully.".to_string(),
                case,
            })
        }
        Ok(None) => HttpResponse::not_found(&format!("Case with ID {id} not found in store.")),
        Err(err) => {
            tracing::error!(case_id = id, error = %err, "link assignment could not be stored");
            HttpResponse::error(500, INTERNAL_SERVER_ERROR)
        }
    }
}

async fn upload(runtime: &CaseRuntime, request: &HttpRequest) -> HttpResponse {
    if let Some(denied) = runtime.authorize_write("/api/upload", request.header(SHARED_SECRET_HEADER)) {
        return denied;
    }
    let form = read_upload_form(request.header("content-type"), &request.body).await;
    store_upload_form(runtime, form).await
}

/// Persist the parts of an already authorized upload form.
pub(crate) async fn store_upload_form(
    runtime: &CaseRuntime,
    form: Result<UploadForm, UploadError>,
) -> HttpResponse {
    let form = match form {
        Ok(form) => form,
        Err(err) => {
            let (status, code) = map_upload_error(&err);
            return HttpResponse::error(status, code);
        }
    };
    if form.is_empty() {
        return HttpResponse::bad_request("no_files");
    }

    let target = runtime.upload_target();
    let mut urls = UploadUrls::default();
    let parts = [
        ("original", form.original.as_ref(), &mut urls.original),
        ("redacted", form.redacted.as_ref(), &mut urls.redacted),
    ];
    let mut stored = 0;
    for (prefix, file, url) in parts {
        let Some(file) = file else {
            continue;
        };
        match target.store(prefix, file).await {
            Ok(location) => {
                *url = Some(location);
                stored += 1;
            }
            Err(err) => {
                let (status, code) = map_upload_error(&err);
                return HttpResponse::error(status, code);
            }
        }
    }
    runtime.observe_uploads(stored);
    HttpResponse::ok_json(&UploadResponse { ok: true, urls })
}

async fn serve_upload(runtime: &CaseRuntime, file_name: &str) -> HttpResponse {
    match runtime.upload_target().read_local(file_name).await {
        Ok(Some(bytes)) => {
            let content_type = mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .to_string();
            HttpResponse::ok_bytes(content_type, bytes)
        }
        Ok(None) => HttpResponse::not_found("not_found"),
        Err(err) => {
            tracing::error!(file = file_name, error = %err, "stored upload could not be read");
            HttpResponse::error(500, INTERNAL_SERVER_ERROR)
        }
    }
}
