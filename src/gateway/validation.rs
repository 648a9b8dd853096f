// Local request validation
// Author: kelexine (https://github.com/kelexine)
//
// Runs before the Auth Gate and before any backend contact. Every failure here
// is a 400 envelope.

use crate::error::{GatewayError, Result};
use crate::models::{ChatRequest, ContactForm, CreateOrderRequest, VerifyPaymentRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

pub const INVALID_EMAIL_MESSAGE: &str = "Invalid email format";
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON body";

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Parses a raw request body. An empty body yields `T::default()` so the field
/// checks below report what is missing.
pub fn parse_body<T: DeserializeOwned + Default>(raw: &[u8]) -> Result<T> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(raw).map_err(|e| {
        tracing::debug!("Rejecting malformed body: {}", e);
        GatewayError::Validation(INVALID_JSON_MESSAGE.to_string())
    })
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email.trim())
}

pub fn validate_contact(form: &ContactForm) -> Result<()> {
    if !(present(&form.name)
        && present(&form.email)
        && present(&form.subject)
        && present(&form.message))
    {
        return Err(GatewayError::Validation(
            "Name, email, subject and message are required".to_string(),
        ));
    }
    if !form.email.as_deref().is_some_and(is_valid_email) {
        return Err(GatewayError::Validation(INVALID_EMAIL_MESSAGE.to_string()));
    }
    Ok(())
}

pub fn validate_chat(request: &ChatRequest) -> Result<()> {
    if !present(&request.message) {
        return Err(GatewayError::Validation("Message is required".to_string()));
    }
    Ok(())
}

pub fn validate_create_order(request: &CreateOrderRequest) -> Result<()> {
    if !present(&request.plan_id) {
        return Err(GatewayError::Validation("Plan ID is required".to_string()));
    }
    Ok(())
}

pub fn validate_verify_payment(request: &VerifyPaymentRequest) -> Result<()> {
    if !(present(&request.order_id) && present(&request.payment_id) && present(&request.signature))
    {
        return Err(GatewayError::Validation(
            "Order ID, payment ID and signature are required".to_string(),
        ));
    }
    Ok(())
}

/// Path identifiers must be non-blank.
pub fn require_identifier(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(GatewayError::Validation(format!("{} is required", label)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(email: &str) -> ContactForm {
        ContactForm {
            name: Some("Ada".into()),
            email: Some(email.into()),
            subject: Some("Pricing".into()),
            message: Some("Hello".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_contact_rejects_bad_email() {
        let err = validate_contact(&contact("not-an-email")).unwrap_err();
        assert_eq!(err, GatewayError::Validation(INVALID_EMAIL_MESSAGE.into()));
        assert!(validate_contact(&contact("ada@example.com")).is_ok());
    }

    #[test]
    fn test_contact_requires_every_field() {
        let mut form = contact("ada@example.com");
        form.subject = Some("  ".into());
        let err = validate_contact(&form).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(err.to_string().contains("required"));
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.com"));
        assert!(!is_valid_email("@c.com"));
    }

    #[test]
    fn test_parse_body_empty_and_malformed() {
        let order: CreateOrderRequest = parse_body(b"").unwrap();
        assert!(validate_create_order(&order).is_err());

        let err = parse_body::<CreateOrderRequest>(b"{plan").unwrap_err();
        assert_eq!(err, GatewayError::Validation(INVALID_JSON_MESSAGE.into()));
    }

    #[test]
    fn test_parse_body_keeps_unknown_fields() {
        let chat: ChatRequest =
            parse_body(br#"{"message": "hi", "history": [1, 2]}"#).unwrap();
        assert!(validate_chat(&chat).is_ok());
        assert!(chat.extra.contains_key("history"));
    }

    #[test]
    fn test_verify_payment_requires_all_parts() {
        let req = VerifyPaymentRequest {
            order_id: Some("order_1".into()),
            payment_id: Some("pay_1".into()),
            signature: None,
            ..Default::default()
        };
        assert!(validate_verify_payment(&req).is_err());
    }
}
