//! Single-backend HTTP reverse proxy library

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod mock_backend;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
