use serde::{Deserialize, Serialize};

/// Numeric case identifier. Uniqueness is assumed by producers, never enforced.
pub type CaseId = i64;

// ---------------------------------------------------------------------------
// Core domain types
// ---------------------------------------------------------------------------

/// One company contact attached to a case.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "firma", default)]
    pub company: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "plz", default)]
    pub postal_code: String,
}

/// A single application case. Field names on the wire follow the producer's
/// mixed casing (`createdAt` next to `original_cv_url`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: CaseId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
    #[serde(default)]
    pub summary: String,
    #[serde(rename = "applicantName", default)]
    pub applicant_name: String,
    #[serde(rename = "postalCode", default)]
    pub postal_code: String,
    #[serde(default)]
    pub original_cv_url: String,
    #[serde(default)]
    pub redacted_cv_url: String,
    #[serde(default)]
    pub email_subject: String,
    /// HTML fragment.
    #[serde(default)]
    pub email_body: String,
    /// Empty until an external system assigns it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_url: Option<String>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

impl CaseRecord {
    /// The assigned confirmation URL, treating an empty string as unassigned.
    pub fn confirm_url(&self) -> Option<&str> {
        self.confirm_url.as_deref().filter(|url| !url.is_empty())
    }

    pub fn has_confirm_url(&self) -> bool {
        self.confirm_url().is_some()
    }
}

// ---------------------------------------------------------------------------
// Partial updates
// ---------------------------------------------------------------------------

/// Partial record used by `PATCH /api/cases/{id}` and link assignment.
///
/// There is no `id` or `contacts` field: identifiers are never rewritten and
/// the contact list is fixed at creation. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CasePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "applicantName", default, skip_serializing_if = "Option::is_none")]
    pub applicant_name: Option<String>,
    #[serde(rename = "postalCode", default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_cv_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacted_cv_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_url: Option<String>,
}

impl CasePatch {
    pub fn confirm_url(url: impl Into<String>) -> Self {
        Self {
            confirm_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Shallow merge: every field present in the patch overwrites the record's value.
    pub fn apply_to(&self, record: &mut CaseRecord) {
        fn merge(target: &mut String, value: &Option<String>) {
            if let Some(value) = value {
                target.clone_from(value);
            }
        }
        merge(&mut record.title, &self.title);
        merge(&mut record.status, &self.status);
        merge(&mut record.created_at, &self.created_at);
        merge(&mut record.summary, &self.summary);
        merge(&mut record.applicant_name, &self.applicant_name);
        merge(&mut record.postal_code, &self.postal_code);
        merge(&mut record.original_cv_url, &self.original_cv_url);
        merge(&mut record.redacted_cv_url, &self.redacted_cv_url);
        merge(&mut record.email_subject, &self.email_subject);
        merge(&mut record.email_body, &self.email_body);
        if let Some(url) = &self.confirm_url {
            record.confirm_url = Some(url.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// API payload types
// ---------------------------------------------------------------------------

/// Response of the link-status route; `confirm_url` is `null` until assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub id: CaseId,
    #[serde(default)]
    pub confirm_url: Option<String>,
}

impl From<&CaseRecord> for LinkStatus {
    fn from(record: &CaseRecord) -> Self {
        Self {
            id: record.id,
            confirm_url: record.confirm_url.clone(),
        }
    }
}

/// Bulk-insert body: a single record or an array of records.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CaseBatch {
    Many(Vec<CaseRecord>),
    One(Box<CaseRecord>),
}

impl CaseBatch {
    pub fn into_records(self) -> Vec<CaseRecord> {
        match self {
            Self::Many(records) => records,
            Self::One(record) => vec![*record],
        }
    }
}

/// Parse an identifier from a path segment or query value.
pub fn parse_case_id(raw: &str) -> Option<CaseId> {
    raw.trim().parse::<CaseId>().ok()
}
