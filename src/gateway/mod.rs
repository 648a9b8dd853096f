//! The Proxy Gateway: forwards browser requests to the backend API.
//!
//! # Components
//!
//! - `route`: the read-only route metadata table.
//! - `request`: the immutable request envelope.
//! - `validation`: local body checks that fail fast with a 400.
//! - `client`: pooled HTTP client for the backend.
//! - `forward`: single, binary and fan-out forwarding plus normalization.
//! - `endpoints`: one operation per logical endpoint.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod client;
mod endpoints;
mod forward;
pub mod request;
pub mod route;
pub mod validation;

pub use client::{BackendClient, BackendResponse};
pub use forward::{
    extract_error_message, invoice_filename, BinaryPayload, Forwarded, ProxyGateway,
    SourceOutcome, BINARY_FALLBACK_MESSAGE, DEFAULT_BINARY_CONTENT_TYPE,
};
pub use request::RequestEnvelope;
pub use route::{routes, ForwardMode, ResponseKind, RouteId, RouteSpec};
