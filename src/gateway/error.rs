use thiserror::Error;

use crate::store::StoreError;

/// Terminal failures of a proxied call. Nothing is retried.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("config '{0}' not found")]
    ConfigNotFound(String),

    #[error("config '{0}' is disabled")]
    ConfigDisabled(String),

    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    #[error("invalid request body: {0}")]
    InvalidRequestBody(String),

    #[error("external URL could not be built: {0}")]
    InvalidUpstreamUrl(String),

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("upstream returned status {status}")]
    UpstreamError { status: u16, body: String },

    #[error("upstream response is not valid JSON: {0}")]
    UpstreamInvalidResponse(String),

    #[error("upstream response exceeds {0} bytes")]
    UpstreamResponseTooLarge(usize),

    #[error("required field \"{0}\" missing from upstream response")]
    UpstreamMissingField(String),

    #[error(transparent)]
    Storage(StoreError),
}

impl ProxyError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::ConfigNotFound(_) => "config_not_found",
            ProxyError::ConfigDisabled(_) => "config_disabled",
            ProxyError::MissingRequiredField(_) => "missing_required_field",
            ProxyError::InvalidRequestBody(_) => "invalid_request_body",
            ProxyError::InvalidUpstreamUrl(_) => "invalid_upstream_url",
            ProxyError::UpstreamUnreachable(_) => "upstream_unreachable",
            ProxyError::UpstreamError { .. } => "upstream_error",
            ProxyError::UpstreamInvalidResponse(_) => "upstream_invalid_response",
            ProxyError::UpstreamResponseTooLarge(_) => "upstream_response_too_large",
            ProxyError::UpstreamMissingField(_) => "upstream_missing_field",
            ProxyError::Storage(e) => e.kind(),
        }
    }
}

impl From<StoreError> for ProxyError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ProxyError::ConfigNotFound(id),
            other => ProxyError::Storage(other),
        }
    }
}
