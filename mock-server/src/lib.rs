//! Deterministic stub HTTP server for exercising the client.
//!
//! Every route answers the same way for the same input. `/stall` never
//! answers at all, for timeout tests.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, LOCATION},
        HeaderMap, Method, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Body of `/models` and `/v1/models`.
pub const MODELS_BODY: &str = r#"{"id":"m1"}"#;

/// What the server saw, as returned by `/echo` and `/redirect/0`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EchoReply {
    pub method: String,
    pub path: String,
    /// Lower-case names; repeated headers joined with `", "`.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: u32,
    pub probe: Option<String>,
}

#[derive(Deserialize)]
pub struct RedirectParams {
    pub code: Option<u16>,
}

pub fn app() -> Router {
    Router::new()
        .route("/status/{code}", get(status))
        .route("/echo", any(echo))
        .route("/echo/raw", any(echo_raw))
        .route("/redirect/{n}", any(redirect))
        .route("/stall", get(stall))
        .route("/items/{id}", get(item))
        .route("/models", get(models))
        .route("/v1/models", get(models))
        .route("/v1/chat/completions", post(completion))
        .route("/v1/messages", post(completion))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "mock server listening");
    }
    axum::serve(listener, app()).await
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, format!("status {code}")).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, format!("invalid status {code}")).into_response(),
    }
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<EchoReply> {
    Json(echo_reply(&method, &uri, &headers, &body))
}

async fn echo_raw(body: Bytes) -> impl IntoResponse {
    ([(CONTENT_TYPE, "application/octet-stream")], body)
}

async fn redirect(
    Path(n): Path<u32>,
    Query(params): Query<RedirectParams>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if n == 0 {
        return Json(echo_reply(&method, &uri, &headers, &body)).into_response();
    }
    let status = match StatusCode::from_u16(params.code.unwrap_or(302)) {
        Ok(status) if status.is_redirection() => status,
        _ => return (StatusCode::BAD_REQUEST, "code must be 3xx").into_response(),
    };
    let location = match params.code {
        Some(code) => format!("/redirect/{}?code={code}", n - 1),
        None => format!("/redirect/{}", n - 1),
    };
    tracing::debug!(%method, status = status.as_u16(), %location, "redirecting");
    (status, [(LOCATION, location)]).into_response()
}

async fn stall() -> StatusCode {
    std::future::pending().await
}

async fn item(Path(id): Path<u32>, headers: HeaderMap) -> Json<Item> {
    let probe = headers
        .get("x-probe")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(Item { id, probe })
}

async fn models(headers: HeaderMap) -> Response {
    if !has_credentials(&headers) {
        return unauthorized();
    }
    ([(CONTENT_TYPE, "application/json")], MODELS_BODY).into_response()
}

async fn completion(headers: HeaderMap, body: Bytes) -> Response {
    if !has_credentials(&headers) {
        return unauthorized();
    }
    let request: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": { "message": e.to_string() } })),
            )
                .into_response()
        }
    };
    let model = request
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    Json(json!({
        "id": "cmpl-stub",
        "object": "chat.completion",
        "model": model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": "stub reply" },
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

fn has_credentials(headers: &HeaderMap) -> bool {
    headers.contains_key(AUTHORIZATION) || headers.contains_key("x-api-key")
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": { "message": "missing credentials" } })),
    )
        .into_response()
}

fn echo_reply(method: &Method, uri: &Uri, headers: &HeaderMap, body: &Bytes) -> EchoReply {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        seen.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    EchoReply {
        method: method.to_string(),
        path: uri.path().to_string(),
        headers: seen,
        body: String::from_utf8_lossy(body).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_reply_merges_repeated_headers() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", "a".parse().unwrap());
        headers.append("x-tag", "b".parse().unwrap());
        let reply = echo_reply(
            &Method::POST,
            &"/echo?q=1".parse().unwrap(),
            &headers,
            &Bytes::from_static(b"hi"),
        );
        assert_eq!(reply.method, "POST");
        assert_eq!(reply.path, "/echo");
        assert_eq!(reply.headers["x-tag"], "a, b");
        assert_eq!(reply.body, "hi");
    }

    #[test]
    fn echo_reply_roundtrips_through_json() {
        let reply = EchoReply {
            method: "GET".to_string(),
            path: "/echo".to_string(),
            headers: BTreeMap::from([("accept".to_string(), "*/*".to_string())]),
            body: String::new(),
        };
        let json = serde_json::to_string(&reply).unwrap();
        let back: EchoReply = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reply);
    }

    #[test]
    fn credentials_accept_bearer_or_api_key() {
        let mut headers = HeaderMap::new();
        assert!(!has_credentials(&headers));
        headers.insert("x-api-key", "k".parse().unwrap());
        assert!(has_credentials(&headers));
    }

    #[test]
    fn item_probe_is_optional() {
        let item: Item = serde_json::from_str(r#"{"id":3,"probe":null}"#).unwrap();
        assert_eq!(item, Item { id: 3, probe: None });
    }
}
