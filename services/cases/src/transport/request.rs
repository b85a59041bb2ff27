use std::collections::HashMap;

use super::{HttpRequest, MAX_HTTP_BODY_BYTES};

/// Parse one complete HTTP/1.x request held in memory.
pub(super) fn parse_http_request_bytes(raw: &[u8]) -> Result<HttpRequest, String> {
    let header_end = raw
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .ok_or_else(|| "incomplete HTTP head".to_string())?;
    let head = std::str::from_utf8(&raw[..header_end])
        .map_err(|_| "HTTP head must be valid UTF-8".to_string())?;
    let mut lines = head.split("\r\n");
    let request_line = lines
        .next()
        .ok_or_else(|| "missing request line".to_string())?;
    let (method, target) = parse_request_line(request_line)?;

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| "invalid HTTP header".to_string())?;
        headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    let content_length = match headers.get("content-length") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| "invalid content-length header".to_string())?,
        None => 0,
    };
    if content_length > MAX_HTTP_BODY_BYTES {
        return Err(format!(
            "content-length exceeds max body size ({MAX_HTTP_BODY_BYTES} bytes)"
        ));
    }
    let body_start = header_end + 4;
    let available = raw.len().saturating_sub(body_start);
    if available < content_length {
        return Err(format!(
            "body shorter than content-length ({available} < {content_length})"
        ));
    }

    Ok(HttpRequest {
        method,
        target,
        headers,
        body: raw[body_start..body_start + content_length].to_vec(),
    })
}

/// Split a request target into its path and decoded query parameters.
/// Repeated keys keep the first value.
pub(super) fn split_target(target: &str) -> (String, HashMap<String, String>) {
    let (path, query_str) = target
        .split_once('?')
        .map(|(path, query)| (path, Some(query)))
        .unwrap_or((target, None));
    let mut query = HashMap::new();
    if let Some(query_str) = query_str {
        for pair in query_str.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            query
                .entry(decode_component(k))
                .or_insert_with(|| decode_component(v));
        }
    }
    (path.to_string(), query)
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    match urlencoding::decode(&raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw,
    }
}

/// `METHOD TARGET HTTP/1.x`; anything after the version is ignored.
pub(super) fn parse_request_line(line: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = line.split_whitespace().take(3).collect();
    match parts.as_slice() {
        [method, target, version] if version.starts_with("HTTP/1.") => {
            Ok((method.to_string(), target.to_string()))
        }
        [_, _, version] => Err(format!("unsupported HTTP version '{version}'")),
        [_, _] => Err("missing HTTP version".to_string()),
        [_] => Err("missing HTTP target".to_string()),
        _ => Err("missing HTTP method".to_string()),
    }
}
