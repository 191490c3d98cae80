//! Post-response observer: persists sanitized request logs and generation
//! outcomes without holding up the response.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;

use axum::body::{Body, Bytes, HttpBody};
use axum::extract::ConnectInfo;
use axum::http::header::{CONTENT_LENGTH, USER_AGENT};
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use serde_json::Value;
use tracing::error;

use super::prelude::*;
use crate::constants::{OBSERVED_BODY_LIMIT, REDACTED};
use crate::db::audit::{AuditLog, ClientInfo};
use crate::db::entities::api_requests;
use crate::generator::GenerationOutcome;

const DROPPED_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
];
const DROPPED_HEADER_FRAGMENTS: &[&str] = &["token", "secret", "api-key"];
const REDACTED_KEY_FRAGMENTS: &[&str] = &[
    "password",
    "token",
    "secret",
    "apikey",
    "api_key",
    "authorization",
];

fn is_sensitive_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    DROPPED_HEADERS.contains(&name.as_str())
        || DROPPED_HEADER_FRAGMENTS
            .iter()
            .any(|fragment| name.contains(fragment))
}

/// Header map minus anything that could hold a credential.
pub(crate) fn sanitize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(name, _)| !is_sensitive_header(name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

/// Replaces the value of every key that looks secret, at any depth.
pub(crate) fn redact_json(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let lowered = key.to_ascii_lowercase();
                    if REDACTED_KEY_FRAGMENTS
                        .iter()
                        .any(|fragment| lowered.contains(fragment))
                    {
                        (key, Value::String(REDACTED.to_string()))
                    } else {
                        (key, redact_json(value))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact_json).collect()),
        other => other,
    }
}

fn parse_body(bytes: &Bytes) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    serde_json::from_slice::<Value>(bytes).ok().map(redact_json)
}

/// First `X-Forwarded-For` hop, falling back to the socket peer.
fn client_info(request: &Request<Body>) -> ClientInfo {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    ClientInfo {
        ip: forwarded.or(peer),
        user_agent: request
            .headers()
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    }
}

fn small_enough(declared: Option<u64>) -> bool {
    declared.is_some_and(|len| len <= OBSERVED_BODY_LIMIT as u64)
}

/// Buffers a request body we know to be small, otherwise leaves it alone.
async fn buffer_request(request: Request<Body>) -> Result<(Request<Body>, Option<Value>), Response> {
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    if !small_enough(declared) {
        return Ok((request, None));
    }
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, OBSERVED_BODY_LIMIT)
        .await
        .map_err(|err| {
            GeneratorError::BadRequest(format!("failed to read request body: {err}"))
                .into_response()
        })?;
    let parsed = parse_body(&bytes);
    Ok((Request::from_parts(parts, Body::from(bytes)), parsed))
}

/// Buffers an in-memory response body, leaves streamed ones (files) alone.
async fn buffer_response(response: Response) -> (Response, Option<Value>) {
    if !small_enough(response.body().size_hint().exact()) {
        return (response, None);
    }
    let (parts, body) = response.into_parts();
    match axum::body::to_bytes(body, OBSERVED_BODY_LIMIT).await {
        Ok(bytes) => {
            let parsed = parse_body(&bytes);
            (Response::from_parts(parts, Body::from(bytes)), parsed)
        }
        Err(err) => {
            debug!("Couldn't buffer response body for logging: {err}");
            (
                GeneratorError::InternalServerError("response body unavailable".to_string())
                    .into_response(),
                None,
            )
        }
    }
}

/// Wraps every request when persistence logging is on.
///
/// The downstream service and the persistence run in a detached task, so a
/// client hanging up still gets its attempt recorded.
pub(crate) async fn observe_request(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(audit) = state.audit.clone() else {
        return next.run(request).await;
    };
    match tokio::spawn(observe(audit, request, next)).await {
        Ok(response) => response,
        Err(err) => {
            error!("Request observer task failed: {err}");
            GeneratorError::InternalServerError("request handling failed".to_string())
                .into_response()
        }
    }
}

async fn observe(audit: Arc<AuditLog>, request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let client = client_info(&request);
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);
    let request_headers = sanitize_headers(request.headers());
    let capture_bodies = audit.toggles().api_requests && path.starts_with("/api/");

    let (request, request_body) = if capture_bodies {
        match buffer_request(request).await {
            Ok(buffered) => buffered,
            Err(response) => return response,
        }
    } else {
        (request, None)
    };

    let response = next.run(request).await;
    let outcome = response.extensions().get::<GenerationOutcome>().cloned();
    let (response, response_body) = if capture_bodies {
        buffer_response(response).await
    } else {
        (response, None)
    };

    let record = api_requests::Model {
        id: None,
        created_at: None,
        method,
        path,
        query,
        status: response.status().as_u16(),
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        client_ip: client.ip.clone(),
        user_agent: client.user_agent.clone(),
        request_headers,
        request_body,
        response_body,
    };

    tokio::spawn(async move {
        if let Some(outcome) = outcome {
            audit.record_generation(&outcome, &client).await;
        }
        audit.record_api_request(&record).await;
    });

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn secret_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert("cookie", HeaderValue::from_static("a=b"));
        headers.insert("x-api-key", HeaderValue::from_static("k"));
        headers.insert("x-auth-token", HeaderValue::from_static("t"));
        headers.insert("x-client-secret", HeaderValue::from_static("s"));
        headers.insert("openai-api-key", HeaderValue::from_static("s"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8"));

        let sanitized = sanitize_headers(&headers);
        assert_eq!(sanitized.len(), 2);
        assert_eq!(sanitized["content-type"], "application/json");
        assert_eq!(sanitized["user-agent"], "curl/8");
    }

    #[test]
    fn secret_body_keys_are_redacted_at_any_depth() {
        let body = serde_json::json!({
            "prompt": "cat",
            "apiKey": "sk-1",
            "nested": {"Password": "hunter2", "keep": 1},
            "list": [{"access_token": "t"}],
            "Authorization": "Bearer x",
        });
        let redacted = redact_json(body);
        assert_eq!(redacted["prompt"], "cat");
        assert_eq!(redacted["apiKey"], REDACTED);
        assert_eq!(redacted["nested"]["Password"], REDACTED);
        assert_eq!(redacted["nested"]["keep"], 1);
        assert_eq!(redacted["list"][0]["access_token"], REDACTED);
        assert_eq!(redacted["Authorization"], REDACTED);
    }

    #[test]
    fn forwarded_address_wins() {
        let request = Request::builder()
            .uri("/api/health")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header(USER_AGENT, "tests")
            .body(Body::empty())
            .expect("request");
        let client = client_info(&request);
        assert_eq!(client.ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(client.user_agent.as_deref(), Some("tests"));
    }

    #[test]
    fn only_declared_small_bodies_are_buffered() {
        assert!(!small_enough(None));
        assert!(small_enough(Some(10)));
        assert!(!small_enough(Some(OBSERVED_BODY_LIMIT as u64 + 1)));
    }
}
