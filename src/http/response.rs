//! Response envelope and error conversion.
//!
//! # Responsibilities
//! - Wrap every JSON answer in `{success, data?, message?}`
//! - Map store and gateway errors to HTTP status codes
//! - Never leak internals beyond the structured `error` object
//!
//! # Design Decisions
//! - Storage failures are logged at error level; everything else is routine
//! - Upstream error bodies are echoed back (as JSON when they parse)
//! - Plain-text 408/413 answers from middleware are rewritten as envelopes

use axum::{
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::gateway::ProxyError;
use crate::store::StoreError;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Every failure the HTTP surface can report.
#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    Proxy(ProxyError),
    InvalidBody(String),
    RouteNotFound(String),
    RequestTimeout,
    PayloadTooLarge,
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<ProxyError> for ApiError {
    fn from(e: ProxyError) -> Self {
        ApiError::Proxy(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(e) => store_status(e),
            ApiError::Proxy(e) => match e {
                ProxyError::ConfigNotFound(_) => StatusCode::NOT_FOUND,
                ProxyError::ConfigDisabled(_) => StatusCode::FORBIDDEN,
                ProxyError::MissingRequiredField(_) | ProxyError::InvalidRequestBody(_) => {
                    StatusCode::BAD_REQUEST
                }
                ProxyError::Storage(e) => store_status(e),
                ProxyError::InvalidUpstreamUrl(_)
                | ProxyError::UpstreamUnreachable(_)
                | ProxyError::UpstreamError { .. }
                | ProxyError::UpstreamInvalidResponse(_)
                | ProxyError::UpstreamResponseTooLarge(_)
                | ProxyError::UpstreamMissingField(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Store(e) => e.kind(),
            ApiError::Proxy(e) => e.kind(),
            ApiError::InvalidBody(_) => "invalid_request_body",
            ApiError::RouteNotFound(_) => "route_not_found",
            ApiError::RequestTimeout => "request_timeout",
            ApiError::PayloadTooLarge => "payload_too_large",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Store(e) => e.to_string(),
            ApiError::Proxy(e) => e.to_string(),
            ApiError::InvalidBody(detail) => format!("invalid request body: {}", detail),
            ApiError::RouteNotFound(path) => format!("no route for {}", path),
            ApiError::RequestTimeout => "request timed out".to_string(),
            ApiError::PayloadTooLarge => "request body exceeds the configured limit".to_string(),
        }
    }

    fn is_storage_failure(&self) -> bool {
        match self {
            ApiError::Store(e) | ApiError::Proxy(ProxyError::Storage(e)) => e.is_storage_failure(),
            _ => false,
        }
    }

    /// Structured `error` object: kind plus variant-specific details.
    fn error_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("kind".into(), Value::from(self.kind()));
        match self {
            ApiError::Proxy(ProxyError::MissingRequiredField(field))
            | ApiError::Proxy(ProxyError::UpstreamMissingField(field)) => {
                body.insert("field".into(), Value::from(field.as_str()));
            }
            ApiError::Proxy(ProxyError::ConfigNotFound(id))
            | ApiError::Proxy(ProxyError::ConfigDisabled(id))
            | ApiError::Store(StoreError::NotFound(id))
            | ApiError::Store(StoreError::DuplicateId(id)) => {
                body.insert("configId".into(), Value::from(id.as_str()));
            }
            ApiError::Proxy(ProxyError::UpstreamError { status, body: upstream }) => {
                body.insert("upstreamStatus".into(), Value::from(*status));
                let parsed = serde_json::from_str(upstream)
                    .unwrap_or_else(|_| Value::from(upstream.as_str()));
                body.insert("upstreamBody".into(), parsed);
            }
            _ => {}
        }
        Value::Object(body)
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::DuplicateId(_) | StoreError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        StoreError::Io { .. } | StoreError::Corrupt { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        if self.is_storage_failure() {
            tracing::error!(kind = self.kind(), error = %message, "Config store failure");
        } else if status.is_server_error() {
            tracing::warn!(kind = self.kind(), error = %message, "Upstream failure");
        } else {
            tracing::debug!(kind = self.kind(), error = %message, "Request rejected");
        }

        let body = json!({
            "success": false,
            "message": message,
            "error": self.error_body(),
        });
        (status, Json(body)).into_response()
    }
}

/// Router fallback for unknown paths.
pub async fn not_found_fallback(uri: Uri) -> ApiError {
    ApiError::RouteNotFound(uri.path().to_string())
}

/// Response mapper for the outer middleware stack. Timeout and body-limit
/// layers answer with bare text; give those the usual error envelope.
pub async fn envelope_bare_errors(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }

    match response.status() {
        StatusCode::REQUEST_TIMEOUT => ApiError::RequestTimeout.into_response(),
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge.into_response(),
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (ProxyError::ConfigNotFound("x".into()).into(), StatusCode::NOT_FOUND),
            (ProxyError::ConfigDisabled("x".into()).into(), StatusCode::FORBIDDEN),
            (ProxyError::MissingRequiredField("t".into()).into(), StatusCode::BAD_REQUEST),
            (
                ProxyError::UpstreamError { status: 502, body: String::new() }.into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ProxyError::UpstreamResponseTooLarge(64).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (StoreError::DuplicateId("x".into()).into(), StatusCode::BAD_REQUEST),
            (StoreError::NotFound("x".into()).into(), StatusCode::NOT_FOUND),
            (
                StoreError::Io {
                    path: "db.json".into(),
                    source: std::io::Error::other("disk"),
                }
                .into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{:?}", err);
        }
    }

    #[test]
    fn test_error_body_details() {
        let err: ApiError = ProxyError::UpstreamError {
            status: 500,
            body: r#"{"reason":"boom"}"#.into(),
        }
        .into();
        let body = err.error_body();
        assert_eq!(body["kind"], "upstream_error");
        assert_eq!(body["upstreamStatus"], 500);
        assert_eq!(body["upstreamBody"]["reason"], "boom");

        let err: ApiError = ProxyError::MissingRequiredField("text".into()).into();
        assert_eq!(err.error_body()["field"], "text");
        assert!(err.message().contains("text"));
    }

    #[tokio::test]
    async fn test_bare_middleware_errors_get_envelopes() {
        let bare = (StatusCode::REQUEST_TIMEOUT, "").into_response();
        let wrapped = envelope_bare_errors(bare).await;
        assert_eq!(wrapped.status(), StatusCode::REQUEST_TIMEOUT);
        let bytes = axum::body::to_bytes(wrapped.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["kind"], "request_timeout");

        let bare = (StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded").into_response();
        let wrapped = envelope_bare_errors(bare).await;
        assert_eq!(wrapped.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let bytes = axum::body::to_bytes(wrapped.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["kind"], "payload_too_large");

        // Envelopes and unrelated statuses pass through untouched.
        let own = ApiError::RouteNotFound("/x".into()).into_response();
        assert_eq!(envelope_bare_errors(own).await.status(), StatusCode::NOT_FOUND);
        let teapot = (StatusCode::IM_A_TEAPOT, "short and stout").into_response();
        let passed = envelope_bare_errors(teapot).await;
        let bytes = axum::body::to_bytes(passed.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"short and stout");
    }

    #[test]
    fn test_envelope_shape() {
        let v = serde_json::to_value(Envelope::ok(vec![1, 2])).unwrap();
        assert_eq!(v, json!({"success": true, "data": [1, 2]}));

        let v = serde_json::to_value(Envelope::message("deleted")).unwrap();
        assert_eq!(v, json!({"success": true, "message": "deleted"}));
    }
}
