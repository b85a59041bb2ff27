use schema::{CaseId, CaseRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListCasesResponse {
    pub cases: Vec<CaseRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertCasesResponse {
    pub ok: bool,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchCaseResponse {
    pub ok: bool,
    pub case: CaseRecord,
}

/// Body of `POST /api/caselink`. `caseId` arrives as a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssignLinkRequest {
    #[serde(rename = "caseId", default)]
    pub case_id: Option<serde_json::Value>,
    #[serde(default)]
    pub link: Option<String>,
}

impl AssignLinkRequest {
    /// `None` when missing or empty; `Some(None)` when present but not an integer.
    pub fn case_id(&self) -> Option<Option<CaseId>> {
        match self.case_id.as_ref()? {
            serde_json::Value::Number(number) => Some(number.as_i64()),
            serde_json::Value::String(raw) if raw.trim().is_empty() => None,
            serde_json::Value::String(raw) => Some(schema::parse_case_id(raw)),
            serde_json::Value::Null => None,
            _ => Some(None),
        }
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref().filter(|link| !link.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignLinkResponse {
    pub message: String,
    pub case: CaseRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadUrls {
    pub original: Option<String>,
    pub redacted: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub ok: bool,
    pub urls: UploadUrls,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> AssignLinkRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn assign_link_request_accepts_numeric_and_string_ids() {
        assert_eq!(parse(r#"{"caseId": 12, "link": "u"}"#).case_id(), Some(Some(12)));
        assert_eq!(parse(r#"{"caseId": "12", "link": "u"}"#).case_id(), Some(Some(12)));
        assert_eq!(parse(r#"{"caseId": "x1", "link": "u"}"#).case_id(), Some(None));
        assert_eq!(parse(r#"{"caseId": 1.5, "link": "u"}"#).case_id(), Some(None));
    }

    #[test]
    fn assign_link_request_treats_empty_values_as_missing() {
        let request = parse(r#"{"caseId": "", "link": ""}"#);
        assert_eq!(request.case_id(), None);
        assert_eq!(request.link(), None);
        let request = parse(r#"{}"#);
        assert_eq!(request.case_id(), None);
        assert_eq!(request.link(), None);
    }
}
