use std::collections::HashMap;

use auth::SHARED_SECRET_HEADER;
use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{Multipart, State, multipart::MultipartRejection},
    http::{HeaderMap, HeaderValue, Request, Response, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
    routing::{any, post},
};

use crate::{
    transport::{
        CaseRuntime, HttpRequest, HttpResponse, MAX_HTTP_BODY_BYTES, SharedRuntime,
        handle_request, store_upload_form,
    },
    upload::{UploadError, read_multipart},
};

#[derive(Clone)]
struct AppState {
    runtime: SharedRuntime,
}

pub fn serve_http_with_axum(
    case_runtime: CaseRuntime,
    bind_addr: &str,
    worker_threads: usize,
) -> Result<(), String> {
    let worker_threads = worker_threads.max(1);
    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build tokio runtime: {e}"))?;

    let bind_addr = bind_addr.to_string();
    tokio_runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| format!("failed to bind {bind_addr}: {e}"))?;
        tracing::info!(bind_addr = %bind_addr, worker_threads, "case api listening");

        let app = router(std::sync::Arc::new(case_runtime));
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| format!("axum server failed: {e}"))
    })
}

fn router(runtime: SharedRuntime) -> Router {
    Router::new()
        .route(
            "/api/upload",
            post(upload_route).fallback(upload_method_not_allowed),
        )
        .fallback(any(dispatch))
        .with_state(AppState { runtime })
        .layer(axum::extract::DefaultBodyLimit::max(MAX_HTTP_BODY_BYTES))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> impl IntoResponse {
    let method = request.method().to_string();
    let target = request
        .uri()
        .path_and_query()
        .map(|value| value.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let mut headers = HashMap::new();
    for (name, value) in request.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
        }
    }

    let body = match to_bytes(request.into_body(), MAX_HTTP_BODY_BYTES).await {
        Ok(bytes) => bytes.to_vec(),
        Err(err) => {
            tracing::warn!(error = %err, "request body rejected");
            return response_from_transport(HttpResponse::error(413, "payload_too_large"));
        }
    };

    let request = HttpRequest {
        method,
        target,
        headers,
        body,
    };

    let response = handle_request(&state.runtime, &request).await;
    tracing::debug!(
        method = %request.method,
        target = %request.target,
        status = response.status,
        "request handled"
    );
    response_from_transport(response)
}

fn response_from_transport(response: HttpResponse) -> Response<Body> {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = status;
    out.headers_mut().insert(
        CONTENT_TYPE,
        response
            .content_type
            .parse()
            .unwrap_or(HeaderValue::from_static("application/json")),
    );
    out
}

async fn upload_method_not_allowed() -> Response<Body> {
    response_from_transport(HttpResponse::method_not_allowed())
}

/// Multipart uploads get their own route so the body limit layer applies to
/// the streamed form. Authorization runs before any part is read.
async fn upload_route(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response<Body> {
    let runtime = &state.runtime;
    let presented = headers
        .get(SHARED_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    if let Some(denied) = runtime.authorize_write("/api/upload", presented) {
        return response_from_transport(denied);
    }
    let form = match multipart {
        Ok(multipart) => read_multipart(multipart).await,
        Err(rejection) => Err(UploadError::Form(rejection.to_string())),
    };
    let response = store_upload_form(runtime, form).await;
    if response.status >= 500 {
        runtime.observe_failure();
    }
    response_from_transport(response)
}
