use std::collections::HashMap;

use serde::Serialize;

use crate::api::ErrorBody;

pub(crate) const JSON_CONTENT_TYPE: &str = "application/json";
pub(crate) const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpRequest {
    pub(crate) method: String,
    pub(crate) target: String,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) body: Vec<u8>,
}

impl HttpRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpResponse {
    pub(crate) status: u16,
    pub(crate) content_type: String,
    pub(crate) body: Vec<u8>,
}

impl HttpResponse {
    pub(crate) fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                content_type: JSON_CONTENT_TYPE.to_string(),
                body,
            },
            Err(err) => {
                tracing::error!(error = %err, "response serialization failed");
                Self::error(500, "Internal Server Error")
            }
        }
    }

    pub(crate) fn ok_json<T: Serialize>(value: &T) -> Self {
        Self::json(200, value)
    }

    pub(crate) fn ok_text(body: String) -> Self {
        Self {
            status: 200,
            content_type: METRICS_CONTENT_TYPE.to_string(),
            body: body.into_bytes(),
        }
    }

    pub(crate) fn ok_bytes(content_type: String, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type,
            body,
        }
    }

    /// `{"error": message}` with the given status.
    pub(crate) fn error(status: u16, message: &str) -> Self {
        let body = serde_json::to_vec(&ErrorBody {
            error: message.to_string(),
        })
        .unwrap_or_else(|_| b"{\"error\":\"Internal Server Error\"}".to_vec());
        Self {
            status,
            content_type: JSON_CONTENT_TYPE.to_string(),
            body,
        }
    }

    pub(crate) fn bad_request(message: &str) -> Self {
        Self::error(400, message)
    }

    pub(crate) fn unauthorized() -> Self {
        Self::error(401, "unauthorized")
    }

    pub(crate) fn not_found(message: &str) -> Self {
        Self::error(404, message)
    }

    pub(crate) fn method_not_allowed() -> Self {
        Self::error(405, "method_not_allowed")
    }
}

pub(crate) fn render_response_bytes(response: &HttpResponse) -> Vec<u8> {
    let status_text = match response.status {
        200 => "200 OK",
        400 => "400 Bad Request",
        401 => "401 Unauthorized",
        404 => "404 Not Found",
        405 => "405 Method Not Allowed",
        413 => "413 Payload Too Large",
        _ => "500 Internal Server Error",
    };
    let mut out = format!(
        "HTTP/1.1 {status_text}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.content_type,
        response.body.len()
    )
    .into_bytes();
    out.extend_from_slice(&response.body);
    out
}
