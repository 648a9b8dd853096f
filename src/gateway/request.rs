// Request envelope handed to the backend client
// Author: kelexine (https://github.com/kelexine)

use super::route::{ResponseKind, RouteId, RouteSpec};
use crate::auth::{AuthDecision, AuthGate, Credential, SessionContext};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

/// Everything needed to make one backend call. Immutable once built.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    route: &'static RouteSpec,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    credential: Option<Credential>,
    timeout: Option<Duration>,
}

impl RequestEnvelope {
    pub fn builder(route: RouteId) -> RequestEnvelopeBuilder {
        RequestEnvelopeBuilder {
            route: route.spec(),
            id: None,
            query: Vec::new(),
            body: None,
            credential: None,
            timeout: None,
        }
    }

    pub fn route(&self) -> &'static RouteSpec {
        self.route
    }

    pub fn method(&self) -> &Method {
        &self.route.method
    }

    /// Backend path with the identifier already substituted.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn expects_binary(&self) -> bool {
        self.route.response_kind() == ResponseKind::Binary
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn authorize(&self) -> AuthDecision {
        AuthGate::check(self.route.access, self.credential.as_ref())
    }
}

pub struct RequestEnvelopeBuilder {
    route: &'static RouteSpec,
    id: Option<String>,
    query: Vec<(String, String)>,
    body: Option<Value>,
    credential: Option<Credential>,
    timeout: Option<Duration>,
}

impl RequestEnvelopeBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn session(mut self, session: &SessionContext) -> Self {
        self.credential = session.credential().cloned();
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> RequestEnvelope {
        RequestEnvelope {
            path: self.route.backend_path_for(self.id.as_deref()),
            route: self.route,
            query: self.query,
            body: self.body,
            credential: self.credential,
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_resolves_path_and_credential() {
        let session = SessionContext::with_token("tok");
        let request = RequestEnvelope::builder(RouteId::MarkNotificationRead)
            .id("n-42")
            .session(&session)
            .build();

        assert_eq!(request.path(), "/notifications/n-42/read");
        assert_eq!(*request.method(), Method::PUT);
        assert!(request.authorize().is_allowed());
        assert!(!request.expects_binary());
    }

    #[test]
    fn test_anonymous_request_to_protected_route_is_rejected() {
        let request = RequestEnvelope::builder(RouteId::PaymentHistory)
            .session(&SessionContext::anonymous())
            .build();
        assert!(!request.authorize().is_allowed());
    }
}
