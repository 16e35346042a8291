use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::gateway::{ConnectionReport, Params};
use crate::http::request::parse_json;
use crate::http::response::{ApiError, Envelope};
use crate::http::server::AppState;
use crate::store::{ApiConfig, ApiConfigInput};

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    #[serde(default)]
    pub test_params: Params,
}

pub async fn list_configs(State(state): State<AppState>) -> ApiResult<Vec<ApiConfig>> {
    let configs = state.gateway.store().list().await?;
    Ok(Json(Envelope::ok(configs)))
}

pub async fn get_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiConfig> {
    let config = state.gateway.store().get(&id).await?;
    Ok(Json(Envelope::ok(config)))
}

pub async fn create_config(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Envelope<ApiConfig>>), ApiError> {
    let input: ApiConfigInput = parse_json(&body)?;
    let config = state.gateway.store().create(input).await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(config).with_message("config created")),
    ))
}

pub async fn update_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<ApiConfig> {
    let patch: ApiConfigInput = parse_json(&body)?;
    let config = state.gateway.store().update(&id, patch).await?;
    Ok(Json(Envelope::ok(config).with_message("config updated")))
}

pub async fn delete_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    state.gateway.store().delete(&id).await?;
    Ok(Json(Envelope::message("config deleted")))
}

/// Connectivity check. `success` mirrors whether the upstream answered 2xx.
pub async fn test_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<ConnectionReport> {
    let request: TestRequest = parse_json(&body)?;
    let report = state
        .gateway
        .test_connection(&id, request.test_params)
        .await?;

    let message = if report.ok {
        "connection test succeeded"
    } else {
        "upstream answered with a non-success status"
    };
    let ok = report.ok;
    Ok(Json(
        Envelope::ok(report).with_success(ok).with_message(message),
    ))
}
