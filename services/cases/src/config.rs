use std::path::PathBuf;

use store::StoreConfig;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_UPLOAD_DIR: &str = "public/uploads";
pub const DEFAULT_BLOB_API_URL: &str = "https://blob.vercel-storage.com";

/// Process configuration, read once at startup and injected into the runtime.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub http_workers: usize,
    pub shared_secret: Option<String>,
    pub store: StoreConfig,
    pub upload: UploadConfig,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("bind_addr", &self.bind_addr)
            .field("http_workers", &self.http_workers)
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "<set>"))
            .field("kv_rest_url", &self.store.kv_rest_url)
            .field("upload", &self.upload)
            .finish()
    }
}

/// Upload persistence settings. Decided independently of the store backend.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub local_dir: PathBuf,
    pub blob_token: Option<String>,
    pub blob_api_url: String,
}

impl std::fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadConfig")
            .field("local_dir", &self.local_dir)
            .field("blob_token", &self.blob_token.as_ref().map(|_| "<set>"))
            .field("blob_api_url", &self.blob_api_url)
            .finish()
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            local_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            blob_token: None,
            blob_api_url: DEFAULT_BLOB_API_URL.to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            http_workers: default_http_workers(),
            shared_secret: None,
            store: StoreConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();
        Self {
            bind_addr: get("CASES_BIND").unwrap_or(defaults.bind_addr),
            http_workers: get("CASES_HTTP_WORKERS")
                .and_then(|value| value.trim().parse::<usize>().ok())
                .filter(|workers| *workers > 0)
                .unwrap_or(defaults.http_workers),
            shared_secret: get("CASES_TOKEN"),
            store: StoreConfig {
                kv_rest_url: get("UPSTASH_REDIS_REST_URL"),
                kv_rest_token: get("UPSTASH_REDIS_REST_TOKEN"),
            },
            upload: UploadConfig {
                local_dir: get("CASES_UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.upload.local_dir),
                blob_token: get("BLOB_READ_WRITE_TOKEN"),
                blob_api_url: get("BLOB_API_URL").unwrap_or(defaults.upload.blob_api_url),
            },
        }
    }
}

fn default_http_workers() -> usize {
    std::thread::available_parallelism()
        .map(|parallelism| parallelism.get().clamp(1, 32))
        .unwrap_or(4)
}
