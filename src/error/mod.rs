// Error types for the sitegate proxy
// Author: kelexine (https://github.com/kelexine)

use crate::models::ResponseEnvelope;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Message shown to callers for any transport-level failure. The underlying
/// detail only goes to the logs.
pub const TRANSPORT_MESSAGE: &str = "Unable to reach the backend service";

/// Every failure the gateway can report.
///
/// `Clone` is required: a single in-flight fetch hands the same result to every
/// reader attached to it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Missing or malformed input. The backend was never contacted.
    #[error("{0}")]
    Validation(String),

    /// No credential for a credential-required route. The backend was never contacted.
    #[error("{0}")]
    Auth(String),

    /// The backend answered with a failure status.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// The backend was unreachable, timed out, or sent something unparsable.
    #[error("{}", TRANSPORT_MESSAGE)]
    Transport { detail: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn transport(detail: impl Into<String>) -> Self {
        GatewayError::Transport {
            detail: detail.into(),
        }
    }

    /// Status code carried in the error envelope. Never zero.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Validation(_) => 400,
            GatewayError::Auth(_) => 401,
            GatewayError::Upstream { status, .. } if *status >= 100 => *status,
            GatewayError::Upstream { .. } => 500,
            GatewayError::Transport { .. }
            | GatewayError::Config(_)
            | GatewayError::Internal(_) => 500,
        }
    }

    /// True when the backend was never contacted.
    pub fn is_local(&self) -> bool {
        matches!(self, GatewayError::Validation(_) | GatewayError::Auth(_))
    }

    /// True when the backend reported the status itself, as opposed to a
    /// synthesized one.
    pub fn has_upstream_status(&self) -> bool {
        matches!(self, GatewayError::Upstream { .. })
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "validation",
            GatewayError::Auth(_) => "auth",
            GatewayError::Upstream { .. } => "upstream",
            GatewayError::Transport { .. } => "transport",
            GatewayError::Config(_) => "config",
            GatewayError::Internal(_) => "internal",
        }
    }

    pub fn to_envelope<T>(&self) -> ResponseEnvelope<T> {
        ResponseEnvelope::failure(self.to_string(), self.status_code())
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::transport(format!("backend request timed out: {}", err))
        } else if err.is_decode() {
            GatewayError::transport(format!("backend response unparsable: {}", err))
        } else {
            GatewayError::transport(format!("backend request failed: {}", err))
        }
    }
}

impl From<crate::cache::FetchAborted> for GatewayError {
    fn from(err: crate::cache::FetchAborted) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for GatewayError {
    fn from(err: config::ConfigError) -> Self {
        GatewayError::Config(err.to_string())
    }
}

// Convert GatewayError to an envelope response for Axum
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let envelope: ResponseEnvelope<serde_json::Value> = self.to_envelope();
        (status, axum::Json(envelope)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::Validation("x".into()).status_code(), 400);
        assert_eq!(GatewayError::Auth("x".into()).status_code(), 401);
        assert_eq!(
            GatewayError::Upstream {
                status: 404,
                message: "nope".into()
            }
            .status_code(),
            404
        );
        assert_eq!(GatewayError::transport("refused").status_code(), 500);
    }

    #[test]
    fn test_upstream_zero_status_is_never_reported() {
        let err = GatewayError::Upstream {
            status: 0,
            message: "weird".into(),
        };
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_transport_hides_detail() {
        let err = GatewayError::transport("connect ECONNREFUSED 10.0.0.3:4000");
        assert_eq!(err.to_string(), TRANSPORT_MESSAGE);
        assert!(!err.has_upstream_status());
    }
}
