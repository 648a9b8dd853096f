// Session credentials and the Auth Gate
// Author: kelexine (https://github.com/kelexine)

mod gate;

pub use gate::{Access, AuthDecision, AuthGate, AUTH_REQUIRED_MESSAGE};

use axum_extra::extract::CookieJar;
use zeroize::Zeroize;

/// Default name of the session cookie carrying the bearer token.
pub const DEFAULT_COOKIE_NAME: &str = "accessToken";

/// Opaque bearer token read from the caller's cookie jar.
///
/// Held only for the lifetime of one request; wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct Credential(String);

// Custom Debug impl that never logs tokens
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&"[REDACTED]").finish()
    }
}

impl Credential {
    /// Blank tokens count as no credential at all.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

/// The calling context of one request: whatever credential its cookie jar holds.
///
/// Passed explicitly through every call instead of living in shared state.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    credential: Option<Credential>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            credential: Credential::new(token),
        }
    }

    /// Reads the session cookie from an inbound request's cookie jar.
    pub fn from_cookies(jar: &CookieJar, cookie_name: &str) -> Self {
        let credential = jar
            .get(cookie_name)
            .and_then(|cookie| Credential::new(cookie.value()));
        Self { credential }
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue};

    #[test]
    fn test_debug_impl_masks_token() {
        let cred = Credential::new("eyJhbGciOiJIUzI1NiJ9.secret").unwrap();
        let debug_str = format!("{:?}", cred);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("eyJhbGci"));
    }

    #[test]
    fn test_blank_token_is_no_credential() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   ").is_none());
        assert!(!SessionContext::with_token("").is_authenticated());
    }

    #[test]
    fn test_session_from_cookie_jar() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; accessToken=tok-123"),
        );
        let jar = CookieJar::from_headers(&headers);

        let session = SessionContext::from_cookies(&jar, DEFAULT_COOKIE_NAME);
        assert_eq!(session.credential().unwrap().expose(), "tok-123");

        let other = SessionContext::from_cookies(&jar, "session");
        assert!(!other.is_authenticated());
    }
}
