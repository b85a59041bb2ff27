use cases::{config::ServiceConfig, transport::CaseRuntime, transport_axum::serve_http_with_axum};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Case API: stores application cases and serves the dashboard's JSON routes.
#[derive(Debug, Parser)]
#[command(name = "cases", version)]
struct Args {
    /// Listen address; overrides CASES_BIND.
    #[arg(long)]
    bind: Option<String>,

    /// Tokio worker threads; overrides CASES_HTTP_WORKERS.
    #[arg(long)]
    workers: Option<usize>,
}

fn main() {
    let args = Args::parse();
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = ServiceConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(workers) = args.workers.filter(|workers| *workers > 0) {
        config.http_workers = workers;
    }
    tracing::debug!(?config, "configuration loaded");

    let runtime = match CaseRuntime::from_config(&config) {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "case service configuration rejected");
            std::process::exit(2);
        }
    };

    let selection = runtime.backend_selection();
    if let Some(reason) = selection.fallback_reason.as_deref() {
        tracing::warn!(reason, "external store unavailable, serving from memory");
    }
    tracing::info!(
        store_backend = selection.kind.as_str(),
        upload_target = runtime.upload_target().describe(),
        shared_secret = config.shared_secret.is_some(),
        "case service starting on http://{}",
        config.bind_addr
    );
    tracing::info!("endpoints: GET /api/cases, POST /api/cases, PATCH /api/cases/{{id}}, GET|POST /api/caselink, POST /api/upload, GET /uploads/{{file}}, GET /health, GET /metrics");

    if let Err(err) = serve_http_with_axum(runtime, &config.bind_addr, config.http_workers) {
        tracing::error!(error = %err, "case service failed");
        std::process::exit(1);
    }
}
