/// Request header carrying the shared secret on write routes.
pub const SHARED_SECRET_HEADER: &str = "x-cases-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allowed,
    Unauthorized(&'static str),
}

impl AuthDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Static credential compared verbatim against [`SHARED_SECRET_HEADER`].
///
/// When no secret is configured every request is allowed.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct SharedSecret {
    expected: Option<String>,
}

impl SharedSecret {
    /// An unset or empty value disables the check.
    pub fn from_configured(raw: Option<String>) -> Self {
        Self {
            expected: raw.filter(|value| !value.is_empty()),
        }
    }

    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_required(&self) -> bool {
        self.expected.is_some()
    }

    pub fn authorize(&self, presented: Option<&str>) -> AuthDecision {
        let Some(expected) = self.expected.as_deref() else {
            return AuthDecision::Allowed;
        };
        match presented {
            Some(value) if constant_time_eq(value.as_bytes(), expected.as_bytes()) => {
                AuthDecision::Allowed
            }
            Some(_) => AuthDecision::Unauthorized("shared secret mismatch"),
            None => AuthDecision::Unauthorized("missing shared secret header"),
        }
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret")
            .field("required", &self.is_required())
            .finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a.len() {
        diff |= a[i] ^ b[i];
    }
    diff == 0
}
