use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    body::Body,
    extract::{FromRequest, Multipart},
    http::{Request, header::CONTENT_TYPE},
};
use rand::Rng;
use serde::Deserialize;

use crate::config::UploadConfig;

/// Default extension for uploads whose original name carries none.
pub const DEFAULT_EXTENSION: &str = ".pdf";
/// Public URL prefix for files kept in the local upload directory.
pub const LOCAL_URL_PREFIX: &str = "/uploads/";

const BLOB_PATH_PREFIX: &str = "cases";
const BLOB_API_VERSION: &str = "7";
const BLOB_CONTENT_TYPE: &str = "application/pdf";
const RANDOM_SUFFIX_LEN: usize = 10;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("blob service rejected upload: {0}")]
    Rejected(String),

    #[error("invalid blob service configuration: {0}")]
    InvalidConfig(String),

    #[error("multipart form could not be read: {0}")]
    Form(String),
}

/// One file part of an upload form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadForm {
    pub original: Option<UploadedFile>,
    pub redacted: Option<UploadedFile>,
}

impl UploadForm {
    pub fn is_empty(&self) -> bool {
        self.original.is_none() && self.redacted.is_none()
    }

    /// Assign a form part by field name; unknown names are ignored.
    pub fn insert(&mut self, field_name: &str, file: UploadedFile) -> bool {
        match field_name {
            "original" => self.original = Some(file),
            "redacted" => self.redacted = Some(file),
            _ => return false,
        }
        true
    }
}

/// Decode a buffered `multipart/form-data` body, for requests that arrive
/// as raw bytes rather than through the streaming extractor.
pub async fn read_upload_form(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<UploadForm, UploadError> {
    let content_type =
        content_type.ok_or_else(|| UploadError::Form("missing content-type".to_string()))?;
    let request = Request::builder()
        .method("POST")
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body.to_vec()))
        .map_err(|err| UploadError::Form(err.to_string()))?;
    let multipart = Multipart::from_request(request, &())
        .await
        .map_err(|err| UploadError::Form(err.to_string()))?;
    read_multipart(multipart).await
}

/// Collect the `original` and `redacted` parts; other fields are skipped.
pub async fn read_multipart(mut multipart: Multipart) -> Result<UploadForm, UploadError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| UploadError::Form(err.to_string()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| UploadError::Form(err.to_string()))?;
        form.insert(
            &name,
            UploadedFile {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            },
        );
    }
    Ok(form)
}

/// Where uploaded documents end up; resolved once at startup.
#[derive(Debug, Clone)]
pub enum UploadTarget {
    LocalDir(PathBuf),
    Blob(BlobClient),
}

impl UploadTarget {
    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        match config.blob_token.as_deref() {
            Some(token) => Ok(Self::Blob(BlobClient::new(&config.blob_api_url, token)?)),
            None => Ok(Self::LocalDir(config.local_dir.clone())),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::LocalDir(_) => "local",
            Self::Blob(_) => "blob",
        }
    }

    pub fn local_dir(&self) -> Option<&Path> {
        match self {
            Self::LocalDir(dir) => Some(dir),
            Self::Blob(_) => None,
        }
    }

    /// Persist one part under a fresh collision-resistant name and return its URL.
    pub async fn store(&self, prefix: &str, file: &UploadedFile) -> Result<String, UploadError> {
        let file_name = generate_file_name(prefix, file.file_name.as_deref(), unix_timestamp_millis());
        match self {
            Self::LocalDir(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                tokio::fs::write(dir.join(&file_name), &file.bytes).await?;
                tracing::info!(file = %file_name, bytes = file.bytes.len(), "upload stored locally");
                Ok(format!("{LOCAL_URL_PREFIX}{file_name}"))
            }
            Self::Blob(client) => {
                let url = client.put(&file_name, file.bytes.clone()).await?;
                tracing::info!(file = %file_name, bytes = file.bytes.len(), "upload stored in blob service");
                Ok(url)
            }
        }
    }

    /// Read back a locally stored upload. `None` for unknown or unsafe names,
    /// and always `None` for the blob target.
    pub async fn read_local(&self, file_name: &str) -> Result<Option<Vec<u8>>, UploadError> {
        let Some(dir) = self.local_dir() else {
            return Ok(None);
        };
        if !is_safe_file_name(file_name) {
            return Ok(None);
        }
        match tokio::fs::read(dir.join(file_name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Client for a public-read blob service addressed by path.
#[derive(Debug, Clone)]
pub struct BlobClient {
    client: reqwest::Client,
    base_url: reqwest::Url,
    token: String,
}

#[derive(Debug, Deserialize)]
struct BlobPutResponse {
    url: String,
}

impl BlobClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, UploadError> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|err| UploadError::InvalidConfig(format!("blob url '{base_url}': {err}")))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| UploadError::InvalidConfig(format!("http client: {err}")))?;
        Ok(Self {
            client,
            base_url,
            token: token.to_string(),
        })
    }

    async fn put(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, UploadError> {
        let target = format!(
            "{}/{BLOB_PATH_PREFIX}/{file_name}",
            self.base_url.as_str().trim_end_matches('/')
        );
        let response = self
            .client
            .put(target)
            .bearer_auth(&self.token)
            .header("x-api-version", BLOB_API_VERSION)
            .header("x-content-type", BLOB_CONTENT_TYPE)
            .body(bytes)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Rejected(format!("status {status}: {body}")));
        }
        let body: BlobPutResponse = response.json().await?;
        Ok(body.url)
    }
}

/// `{prefix}-{millis}-{base36 suffix}{ext}`; `ext` comes from the original
/// name and defaults to `.pdf`.
pub fn generate_file_name(prefix: &str, original_name: Option<&str>, now_millis: u64) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..RANDOM_SUFFIX_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!(
        "{}-{now_millis}-{suffix}{}",
        sanitize_path_component(prefix),
        file_extension(original_name)
    )
}

fn file_extension(original_name: Option<&str>) -> String {
    let extension = original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|ch| ch.is_ascii_alphanumeric()));
    match extension {
        Some(ext) => format!(".{ext}"),
        None => DEFAULT_EXTENSION.to_string(),
    }
}

pub(crate) fn sanitize_path_component(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => ch,
            _ => '_',
        })
        .collect();
    if out.is_empty() {
        out.push('_');
    }
    out
}

fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
}

pub(crate) fn unix_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_millis() as u64)
        .unwrap_or(0)
}
