//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, routing, shared state)
//!     → forward.rs (admission pipeline, upstream relay)
//!     → cors.rs (preflight answers, relay header overwrite)
//!     → Send to client
//! ```

pub mod cors;
pub mod forward;
pub mod server;

pub use server::HttpServer;
