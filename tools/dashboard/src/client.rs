use reqwest::Url;
use schema::{CaseId, CaseRecord, LinkStatus};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("invalid base url '{0}'")]
    InvalidBaseUrl(String),

    #[error("response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// HTTP client for the case API.
#[derive(Debug, Clone)]
pub struct CaseApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CaseApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let mut base_url =
            Url::parse(base_url).map_err(|_| ClientError::InvalidBaseUrl(base_url.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|_| ClientError::InvalidBaseUrl(format!("{}{path}", self.base_url)))
    }

    /// Full case list. Accepts `{"cases": [...]}` or a bare array; any other
    /// JSON shape yields an empty list.
    pub async fn list_cases(&self) -> Result<Vec<CaseRecord>, ClientError> {
        let url = self.endpoint("api/cases")?;
        let response = self.http.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        let body: Value = response.json().await?;
        let list = match body {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("cases") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        Ok(serde_json::from_value(Value::Array(list))?)
    }

    pub async fn link_status(&self, id: CaseId) -> Result<LinkStatus, ClientError> {
        let mut url = self.endpoint("api/caselink")?;
        url.query_pairs_mut().append_pair("caseId", &id.to_string());
        let response = self.http.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    /// POST `{"caseId": id}` to an externally assigned confirmation URL.
    pub async fn confirm(&self, confirm_url: &str, id: CaseId) -> Result<(), ClientError> {
        let response = self
            .http
            .post(confirm_url)
            .json(&serde_json::json!({ "caseId": id }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Status {
                url: confirm_url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}
