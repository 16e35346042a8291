//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, CORS)
//! - Bind server to listener
//! - Drain in-flight requests on shutdown

use axum::{
    extract::DefaultBodyLimit,
    middleware::map_response,
    routing::{any, get},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::GatewayConfig;
use crate::gateway::ProxyGateway;
use crate::http::proxy::proxy_request;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response::{envelope_bare_errors, not_found_fallback};

/// Headroom over the upstream deadline before the inbound request is cut.
const INBOUND_TIMEOUT_SLACK_SECS: u64 = 5;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ProxyGateway>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig, gateway: Arc<ProxyGateway>) -> Self {
        let state = AppState { gateway };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let admin = setup_admin_router(state.clone());
        let inbound_timeout = Duration::from_secs(
            config
                .upstream
                .request_timeout_secs
                .max(config.upstream.test_timeout_secs)
                + INBOUND_TIMEOUT_SLACK_SECS,
        );

        let router = Router::new()
            .route("/health", get(health))
            .route("/proxy/{config_id}", any(proxy_request))
            .route("/api/proxy/{config_id}", any(proxy_request))
            .with_state(state)
            .merge(admin.clone())
            .nest("/api", admin)
            .fallback(not_found_fallback)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .layer(TimeoutLayer::new(inbound_timeout))
            .layer(map_response(envelope_bare_errors))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer());

        if config.listener.cors_permissive {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            store = %self.config.store.path,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
