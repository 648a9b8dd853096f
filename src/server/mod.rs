//! Axum-based HTTP server exposing the Proxy Gateway.
//!
//! # Components
//!
//! - `handlers`: one handler per `/api` route plus health and metrics.
//! - `middleware`: request ID tracking and panic-to-envelope conversion.
//! - `routes`: the router that mounts the route table.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod handlers;
mod middleware;
mod routes;

pub use handlers::{HealthCheck, HealthResponse, HealthStatus};
pub use routes::{create_router, AppState};
