//! Proxy gateway subsystem.
//!
//! # Data Flow
//! ```text
//! handle_proxy_request(config_id, params)
//!     → store.get (ConfigNotFound)
//!     → enabled check (ConfigDisabled)
//!     → params.rs merge (body over query) + required check
//!     → params.rs remap through fieldMapping
//!     → outbound.rs (template substitution or query append / JSON body)
//!     → upstream call with deadline
//!     → JSON parse
//!     → transform.rs (response checks, rename, allow-list, custom fields, _meta)
//! ```
//!
//! # Design Decisions
//! - Linear pipeline, every failure terminal, no retries
//! - Validation sees what the caller sent; remapping happens afterwards
//! - Stateless per call apart from the config read

pub mod error;
pub mod outbound;
pub mod params;
pub mod transform;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::UpstreamConfig;
use crate::observability::metrics;
use crate::store::ConfigStore;

pub use error::ProxyError;
pub use outbound::OutboundRequest;
pub use params::{Params, RequestParams};

/// Successful proxy outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyResult {
    pub config_id: String,
    /// Final response object, `_meta` included.
    pub data: Map<String, Value>,
}

/// Result of a connectivity test.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub status: u16,
    pub ok: bool,
    pub latency_ms: u64,
    pub headers: BTreeMap<String, String>,
    /// Upstream body as JSON when it parses, raw text otherwise.
    pub data: Value,
}

/// Executes proxied calls against registered configs.
pub struct ProxyGateway {
    store: Arc<ConfigStore>,
    client: reqwest::Client,
    request_timeout: Duration,
    test_timeout: Duration,
    max_response_size: usize,
}

impl ProxyGateway {
    pub fn new(store: Arc<ConfigStore>, settings: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().user_agent(settings.user_agent.clone());
        if !settings.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(Self {
            store,
            client,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            test_timeout: Duration::from_secs(settings.test_timeout_secs),
            max_response_size: settings.max_response_size,
        })
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Run one proxied call through the full pipeline.
    pub async fn handle_proxy_request(
        &self,
        config_id: &str,
        params: RequestParams,
    ) -> Result<ProxyResult, ProxyError> {
        let result = self.run_pipeline(config_id, params).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_proxy_request(metric_label(config_id, &result), outcome);
        result
    }

    async fn run_pipeline(
        &self,
        config_id: &str,
        params: RequestParams,
    ) -> Result<ProxyResult, ProxyError> {
        let config = self.store.get(config_id).await?;
        if !config.enabled {
            return Err(ProxyError::ConfigDisabled(config.id));
        }

        let merged = params.merged();
        params::check_required(&config.required_fields, &merged)?;

        let remapped = params::remap(&merged, &config.field_mapping);
        let outbound = outbound::build(&config.external_url, config.method, &merged, remapped)?;

        tracing::debug!(
            config_id = %config.id,
            method = %outbound.method,
            url = %outbound.url,
            request_id = ?params.request_id,
            "Calling upstream"
        );

        let started = Instant::now();
        let response = self
            .send(&outbound, self.request_timeout, params.request_id.as_deref())
            .await?;
        let status = response.status();
        let bytes = read_capped(response, self.max_response_size).await?;
        metrics::record_upstream_latency(&config.id, started.elapsed());

        if !status.is_success() {
            return Err(ProxyError::UpstreamError {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let parsed = parse_body(&bytes)?;
        let mut body = transform::into_object(parsed);
        transform::check_response_fields(&config.response_required_fields, &body)?;
        body = transform::apply_response_mapping(body, &config.response_mapping);
        body = transform::filter_visible(body, &config.visible_fields);

        let now = Utc::now();
        transform::apply_custom_fields(&mut body, &config.custom_fields, now);
        transform::attach_meta(&mut body, &config, now);

        Ok(ProxyResult {
            config_id: config.id,
            data: body,
        })
    }

    /// Call the upstream of a config once with the short test deadline.
    ///
    /// Disabled configs can still be tested. No validation, remapping or
    /// custom fields are applied.
    pub async fn test_connection(
        &self,
        config_id: &str,
        test_params: Params,
    ) -> Result<ConnectionReport, ProxyError> {
        let config = self.store.get(config_id).await?;
        let outbound = outbound::build(
            &config.external_url,
            config.method,
            &test_params,
            test_params.clone(),
        )?;

        let started = Instant::now();
        let response = self.send(&outbound, self.test_timeout, None).await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let bytes = read_capped(response, self.max_response_size).await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let data = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        tracing::info!(config_id = %config.id, status = status.as_u16(), latency_ms, "Connectivity test finished");

        Ok(ConnectionReport {
            status: status.as_u16(),
            ok: status.is_success(),
            latency_ms,
            headers,
            data,
        })
    }

    async fn send(
        &self,
        outbound: &OutboundRequest,
        timeout: Duration,
        request_id: Option<&str>,
    ) -> Result<reqwest::Response, ProxyError> {
        let mut request = self
            .client
            .request(outbound.method.into(), outbound.url.clone())
            .timeout(timeout);
        if let Some(id) = request_id {
            request = request.header("x-request-id", id);
        }
        if let Some(body) = &outbound.body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProxyError::UpstreamUnreachable(format!("timed out after {}s", timeout.as_secs()))
            } else {
                ProxyError::UpstreamUnreachable(e.to_string())
            }
        })
    }
}

/// Metric label for a proxied call. Ids that never resolved to a stored
/// config share one label so callers cannot mint unbounded series.
fn metric_label<'a>(config_id: &'a str, result: &Result<ProxyResult, ProxyError>) -> &'a str {
    match result {
        Err(ProxyError::ConfigNotFound(_) | ProxyError::Storage(_)) => UNKNOWN_CONFIG_LABEL,
        _ => config_id,
    }
}

const UNKNOWN_CONFIG_LABEL: &str = "unknown";

/// Read an upstream body, giving up once it grows past `limit` bytes.
async fn read_capped(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>, ProxyError> {
    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(ProxyError::UpstreamResponseTooLarge(limit));
    }

    let mut buf = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ProxyError::UpstreamUnreachable(e.to_string()))?
    {
        if buf.len() + chunk.len() > limit {
            return Err(ProxyError::UpstreamResponseTooLarge(limit));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Parse an upstream body. An empty body counts as an empty object.
fn parse_body(bytes: &[u8]) -> Result<Value, ProxyError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(bytes).map_err(|e| ProxyError::UpstreamInvalidResponse(e.to_string()))
}
