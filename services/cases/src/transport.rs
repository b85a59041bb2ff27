use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use auth::{AuthDecision, SHARED_SECRET_HEADER, SharedSecret};
use store::{BackendSelection, CaseStore};

use crate::{
    config::{ServiceConfig, UploadConfig},
    upload::{UploadError, UploadTarget},
};

mod http;
mod persistence;
mod request;
mod routes;
#[cfg(test)]
mod tests;

pub(crate) use http::{HttpRequest, HttpResponse, render_response_bytes};
pub(crate) use persistence::{map_store_error, map_upload_error};
pub(crate) use routes::{handle_request, store_upload_form};

use request::parse_http_request_bytes;

pub(crate) const MAX_HTTP_BODY_BYTES: usize = 16 * 1024 * 1024;

pub type SharedRuntime = Arc<CaseRuntime>;

pub struct CaseRuntime {
    store: CaseStore,
    selection: BackendSelection,
    secret: SharedSecret,
    uploads: UploadTarget,
    metrics: TransportMetrics,
}

#[derive(Debug)]
struct TransportMetrics {
    cases_inserted_total: AtomicU64,
    case_patches_total: AtomicU64,
    links_assigned_total: AtomicU64,
    uploads_stored_total: AtomicU64,
    auth_failure_total: AtomicU64,
    request_failure_total: AtomicU64,
    started_at: Instant,
}

impl TransportMetrics {
    fn new() -> Self {
        Self {
            cases_inserted_total: AtomicU64::new(0),
            case_patches_total: AtomicU64::new(0),
            links_assigned_total: AtomicU64::new(0),
            uploads_stored_total: AtomicU64::new(0),
            auth_failure_total: AtomicU64::new(0),
            request_failure_total: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }
}

impl CaseRuntime {
    pub fn new(
        store: CaseStore,
        selection: BackendSelection,
        secret: SharedSecret,
        uploads: UploadTarget,
    ) -> Self {
        Self {
            store,
            selection,
            secret,
            uploads,
            metrics: TransportMetrics::new(),
        }
    }
    pub fn in_memory() -> Self {
        let store = CaseStore::in_memory();
        let selection = BackendSelection {
            kind: store.backend_kind(),
            fallback_reason: None,
        };
        Self::new(
            store,
            selection,
            SharedSecret::open(),
            UploadTarget::LocalDir(UploadConfig::default().local_dir),
        )
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, UploadError> {
        let (store, selection) = CaseStore::from_config(&config.store);
        let uploads = UploadTarget::from_config(&config.upload)?;
        Ok(Self::new(
            store,
            selection,
            SharedSecret::from_configured(config.shared_secret.clone()),
            uploads,
        ))
    }

    pub fn with_shared_secret(mut self, secret: SharedSecret) -> Self {
        self.secret = secret;
        self
    }

    pub fn with_upload_target(mut self, uploads: UploadTarget) -> Self {
        self.uploads = uploads;
        self
    }

    pub fn store(&self) -> &CaseStore {
        &self.store
    }

    pub fn backend_selection(&self) -> &BackendSelection {
        &self.selection
    }

    pub fn upload_target(&self) -> &UploadTarget {
        &self.uploads
    }
    pub(crate) fn authorize_write(&self, route: &str, presented: Option<&str>) -> Option<HttpResponse> {
        match self.secret.authorize(presented) {
            AuthDecision::Allowed => None,
            AuthDecision::Unauthorized(reason) => {
                self.metrics.auth_failure_total.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(route, reason, header = SHARED_SECRET_HEADER, "write rejected");
                Some(HttpResponse::unauthorized())
            }
        }
    }

    fn observe_inserted(&self, count: usize) {
        self.metrics
            .cases_inserted_total
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn observe_patch(&self) {
        self.metrics.case_patches_total.fetch_add(1, Ordering::Relaxed);
    }

    fn observe_link_assigned(&self) {
        self.metrics.links_assigned_total.fetch_add(1, Ordering::Relaxed);
    }

    fn observe_uploads(&self, count: usize) {
        self.metrics
            .uploads_stored_total
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn observe_failure(&self) {
        self.metrics.request_failure_total.fetch_add(1, Ordering::Relaxed);
    }

    async fn metrics_text(&self) -> String {
        let records = match self.store.len().await {
            Ok(count) => format!(
                "# TYPE casedesk_records_total gauge\ncasedesk_records_total {count}\n"
            ),
            Err(err) => {
                tracing::warn!(error = %err, "record count unavailable for metrics");
                "# TYPE casedesk_store_unavailable gauge\ncasedesk_store_unavailable 1\n"
                    .to_string()
            }
        };
        let metrics = &self.metrics;
        format!(
            "# TYPE casedesk_cases_inserted_total counter\n\
casedesk_cases_inserted_total {}\n\
# TYPE casedesk_case_patches_total counter\n\
casedesk_case_patches_total {}\n\
# TYPE casedesk_links_assigned_total counter\n\
casedesk_links_assigned_total {}\n\
# TYPE casedesk_uploads_stored_total counter\n\
casedesk_uploads_stored_total {}\n\
# TYPE casedesk_auth_failure_total counter\n\
casedesk_auth_failure_total {}\n\
# TYPE casedesk_request_failure_total counter\n\
casedesk_request_failure_total {}\n\
{records}\
# TYPE casedesk_uptime_seconds gauge\n\
casedesk_uptime_seconds {}\n",
            metrics.cases_inserted_total.load(Ordering::Relaxed),
            metrics.case_patches_total.load(Ordering::Relaxed),
            metrics.links_assigned_total.load(Ordering::Relaxed),
            metrics.uploads_stored_total.load(Ordering::Relaxed),
            metrics.auth_failure_total.load(Ordering::Relaxed),
            metrics.request_failure_total.load(Ordering::Relaxed),
            metrics.started_at.elapsed().as_secs(),
        )
    }
}

impl std::fmt::Debug for CaseRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseRuntime")
            .field("selection", &self.selection)
            .field("secret", &self.secret)
            .field("uploads", &self.uploads.describe())
            .finish()
    }
}

pub async fn handle_http_request_bytes(
    runtime: &SharedRuntime,
    raw_request: &[u8],
) -> Result<Vec<u8>, String> {
    let request = parse_http_request_bytes(raw_request)?;
    let response = handle_request(runtime, &request).await;
    Ok(render_response_bytes(&response))
}
