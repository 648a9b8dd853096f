//! The Auth Gate: a pure pass/reject decision made before any backend call.
//!
//! Routes are classified ahead of time as [`Access::Public`] or
//! [`Access::CredentialRequired`]. A credential-required route with no
//! credential is rejected outright; the backend never sees the request.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use super::{Credential, SessionContext};
use crate::error::GatewayError;
use serde::{Deserialize, Serialize};

pub const AUTH_REQUIRED_MESSAGE: &str = "authentication required";

/// Route classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Public,
    CredentialRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Allow,
    Reject { reason: &'static str, status: u16 },
}

impl AuthDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthDecision::Allow)
    }

    pub fn into_result(self) -> Result<(), GatewayError> {
        match self {
            AuthDecision::Allow => Ok(()),
            AuthDecision::Reject { reason, .. } => Err(GatewayError::Auth(reason.to_string())),
        }
    }
}

/// Stateless; kept as a type so call sites read `AuthGate::check(..)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthGate;

impl AuthGate {
    pub fn check(access: Access, credential: Option<&Credential>) -> AuthDecision {
        match (access, credential) {
            (Access::Public, _) => AuthDecision::Allow,
            (Access::CredentialRequired, Some(_)) => AuthDecision::Allow,
            (Access::CredentialRequired, None) => AuthDecision::Reject {
                reason: AUTH_REQUIRED_MESSAGE,
                status: 401,
            },
        }
    }

    pub fn check_session(access: Access, session: &SessionContext) -> AuthDecision {
        Self::check(access, session.credential())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_routes_always_pass() {
        assert!(AuthGate::check(Access::Public, None).is_allowed());
    }

    #[test]
    fn test_missing_credential_is_rejected_with_401() {
        let decision = AuthGate::check(Access::CredentialRequired, None);
        assert_eq!(
            decision,
            AuthDecision::Reject {
                reason: AUTH_REQUIRED_MESSAGE,
                status: 401
            }
        );
        let err = decision.into_result().unwrap_err();
        assert_eq!(err.status_code(), 401);
        assert!(err.is_local());
    }

    #[test]
    fn test_present_credential_passes() {
        let session = SessionContext::with_token("abc");
        assert!(AuthGate::check_session(Access::CredentialRequired, &session).is_allowed());
    }
}
