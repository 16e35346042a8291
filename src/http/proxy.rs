use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Method},
    Json,
};
use serde_json::{Map, Value};

use crate::http::request::proxy_params;
use crate::http::response::{ApiError, Envelope};
use crate::http::server::AppState;

/// `ANY /proxy/{config_id}`: run one call through the gateway pipeline.
pub async fn proxy_request(
    State(state): State<AppState>,
    Path(config_id): Path<String>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<Map<String, Value>>>, ApiError> {
    let params = proxy_params(query.as_deref(), &headers, &body)?;

    tracing::debug!(
        config_id = %config_id,
        method = %method,
        request_id = ?params.request_id,
        "Proxying request"
    );

    match state.gateway.handle_proxy_request(&config_id, params).await {
        Ok(result) => {
            tracing::info!(config_id = %result.config_id, "Proxy request succeeded");
            Ok(Json(Envelope::ok(result.data).with_message("request succeeded")))
        }
        Err(e) => {
            tracing::info!(config_id = %config_id, kind = e.kind(), "Proxy request failed");
            Err(e.into())
        }
    }
}
