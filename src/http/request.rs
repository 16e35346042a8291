//! Request handling and extraction.
//!
//! # Responsibilities
//! - Generate and propagate a request ID (UUID v4, `x-request-id`)
//! - Turn raw bodies into typed inputs without axum's plain-text rejections
//! - Collect proxy parameters from query string and body
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Bodies are taken as bytes and parsed here so every failure is enveloped

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::gateway::{Params, ProxyError, RequestParams};
use crate::http::response::ApiError;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Assigns a UUID request ID when the client did not send one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Copies the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

pub fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Parse an optional JSON body. An empty body yields `T::default()`.
pub fn parse_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if is_blank(body) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody(e.to_string()))
}

/// Build proxy parameters from the query string, body and headers.
///
/// Form-encoded bodies are accepted alongside JSON objects.
pub fn proxy_params(
    raw_query: Option<&str>,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<RequestParams, ProxyError> {
    let mut params = RequestParams::from_query_string(raw_query).with_body(body_params(headers, body)?);
    params.request_id = request_id(headers);
    Ok(params)
}

fn body_params(headers: &HeaderMap, body: &Bytes) -> Result<Params, ProxyError> {
    if is_blank(body) {
        return Ok(Params::new());
    }

    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);
    if is_form {
        return Ok(form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ProxyError::InvalidRequestBody(
            "expected a JSON object".to_string(),
        )),
        Err(e) => Err(ProxyError::InvalidRequestBody(e.to_string())),
    }
}

fn is_blank(body: &Bytes) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}
