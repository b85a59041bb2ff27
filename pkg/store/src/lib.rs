use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use schema::{CaseId, CasePatch, CaseRecord};
use serde::Deserialize;
use serde_json::Value;

pub const KV_CASES_KEY: &str = "casesStore:v1";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("external store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("external store rejected command: {0}")]
    Backend(String),

    #[error("stored case list could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid external store configuration: {0}")]
    InvalidConfig(String),
}

#[async_trait]
pub trait RecordBackend: Send + Sync {
    async fn load(&self) -> Result<Vec<CaseRecord>, StoreError>;

    async fn save(&self, records: Vec<CaseRecord>) -> Result<(), StoreError>;

    fn kind(&self) -> BackendKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    ExternalKv,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::ExternalKv => "external-kv",
        }
    }
}

// ---------------------------------------------------------------------------
// Memory backend
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<Vec<CaseRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<CaseRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl RecordBackend for MemoryBackend {
    async fn load(&self) -> Result<Vec<CaseRecord>, StoreError> {
        let guard = self
            .records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.clone())
    }

    async fn save(&self, records: Vec<CaseRecord>) -> Result<(), StoreError> {
        let mut guard = self
            .records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = records;
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}

// ---------------------------------------------------------------------------
// External key-value backend (Redis over the Upstash REST protocol)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KvBackend {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    token: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct KvReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl KvBackend {
    pub fn new(rest_url: &str, token: &str) -> Result<Self, StoreError> {
        let endpoint = reqwest::Url::parse(rest_url)
            .map_err(|err| StoreError::InvalidConfig(format!("rest url '{rest_url}': {err}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(StoreError::InvalidConfig(format!(
                "rest url '{rest_url}' must use http or https"
            )));
        }
        if token.trim().is_empty() {
            return Err(StoreError::InvalidConfig("rest token is empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| StoreError::InvalidConfig(format!("http client: {err}")))?;
        Ok(Self {
            client,
            endpoint,
            token: token.to_string(),
            key: KV_CASES_KEY.to_string(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn command(&self, args: &[&str]) -> Result<Option<Value>, StoreError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(args)
            .send()
            .await?;
        let status = response.status();
        let reply: KvReply = response.json().await?;
        if let Some(error) = reply.error {
            return Err(StoreError::Backend(error));
        }
        if !status.is_success() {
            return Err(StoreError::Backend(format!("status {status}")));
        }
        Ok(reply.result)
    }
}

#[async_trait]
impl RecordBackend for KvBackend {
    async fn load(&self) -> Result<Vec<CaseRecord>, StoreError> {
        let Some(result) = self.command(&["GET", self.key.as_str()]).await? else {
            return Ok(Vec::new());
        };
        // Values are written as JSON text; anything that is not an array reads as empty.
        let value = match result {
            Value::String(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(parsed) => parsed,
                Err(_) => return Ok(Vec::new()),
            },
            other => other,
        };
        if !value.is_array() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn save(&self, records: Vec<CaseRecord>) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&records)?;
        self.command(&["SET", self.key.as_str(), payload.as_str()]).await?;
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::ExternalKv
    }
}

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreConfig {
    pub kv_rest_url: Option<String>,
    pub kv_rest_token: Option<String>,
}

impl StoreConfig {
    fn credentials(&self) -> Option<(&str, &str)> {
        let url = self.kv_rest_url.as_deref().filter(|v| !v.trim().is_empty())?;
        let token = self.kv_rest_token.as_deref().filter(|v| !v.trim().is_empty())?;
        Some((url, token))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSelection {
    pub kind: BackendKind,
    pub fallback_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Case store
// ---------------------------------------------------------------------------

// push/update hold the write lock across load and save; other processes
// sharing the external key are last-write-wins.
pub struct CaseStore {
    backend: Arc<dyn RecordBackend>,
    write_lock: tokio::sync::Mutex<()>,
}

impl CaseStore {
    pub fn new(backend: Arc<dyn RecordBackend>) -> Self {
        Self {
            backend,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn from_config(config: &StoreConfig) -> (Self, BackendSelection) {
        let Some((url, token)) = config.credentials() else {
            return (
                Self::in_memory(),
                BackendSelection {
                    kind: BackendKind::Memory,
                    fallback_reason: None,
                },
            );
        };
        match KvBackend::new(url, token) {
            Ok(backend) => {
                tracing::info!(key = backend.key(), "case store using external key-value backend");
                (
                    Self::new(Arc::new(backend)),
                    BackendSelection {
                        kind: BackendKind::ExternalKv,
                        fallback_reason: None,
                    },
                )
            }
            Err(err) => {
                tracing::warn!(error = %err, "external store unavailable, falling back to memory");
                (
                    Self::in_memory(),
                    BackendSelection {
                        kind: BackendKind::Memory,
                        fallback_reason: Some(err.to_string()),
                    },
                )
            }
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub async fn list(&self) -> Result<Vec<CaseRecord>, StoreError> {
        self.backend.load().await
    }

    // first match wins when ids repeat
    pub async fn find(&self, id: CaseId) -> Result<Option<CaseRecord>, StoreError> {
        let records = self.backend.load().await?;
        Ok(records.into_iter().find(|record| record.id == id))
    }

    pub async fn set_all(&self, records: Vec<CaseRecord>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.backend.save(records).await
    }

    pub async fn push(&self, records: Vec<CaseRecord>) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;
        let appended = records.len();
        let mut current = self.backend.load().await?;
        current.extend(records);
        self.backend.save(current).await?;
        Ok(appended)
    }

    pub async fn update(
        &self,
        id: CaseId,
        patch: &CasePatch,
    ) -> Result<Option<CaseRecord>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut current = self.backend.load().await?;
        let Some(record) = current.iter_mut().find(|record| record.id == id) else {
            return Ok(None);
        };
        patch.apply_to(record);
        let updated = record.clone();
        self.backend.save(current).await?;
        Ok(Some(updated))
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.backend.load().await?.len())
    }
}

impl std::fmt::Debug for CaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseStore")
            .field("backend", &self.backend.kind())
            .finish()
    }
}
