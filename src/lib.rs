//! Configurable external-API relay.
//!
//! Registered proxy targets live in a JSON-file config store; each inbound
//! call is validated, remapped, forwarded upstream and post-processed.

pub mod admin;
pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod store;

pub use config::GatewayConfig;
pub use gateway::ProxyGateway;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use store::ConfigStore;
