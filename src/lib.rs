//! JSON-RPC Provider Proxy Library

pub mod admission;
pub mod cache;
pub mod config;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod notify;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
