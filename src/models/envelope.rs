//! The uniform response envelope every JSON route speaks.
//!
//! ```json
//! { "success": false, "data": null, "error": { "message": "...", "statusCode": 401 } }
//! ```
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error half of the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

/// `{ success, data, error }` with `success` always agreeing with `error`.
///
/// Fields are private so the only ways to build one are [`ResponseEnvelope::ok`],
/// [`ResponseEnvelope::failure`] and deserialization, which rejects
/// inconsistent payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope<T>")]
pub struct ResponseEnvelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct RawEnvelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<ErrorBody>,
}

impl<T> TryFrom<RawEnvelope<T>> for ResponseEnvelope<T> {
    type Error = String;

    fn try_from(raw: RawEnvelope<T>) -> Result<Self, Self::Error> {
        match (&raw.error, raw.success) {
            (None, true) => Ok(Self {
                success: true,
                data: raw.data,
                error: None,
            }),
            (Some(err), false) if err.status_code != 0 => Ok(Self {
                success: false,
                data: None,
                error: raw.error,
            }),
            (Some(_), false) => Err("error envelope must carry a non-zero statusCode".to_string()),
            _ => Err("`success` disagrees with the presence of `error`".to_string()),
        }
    }
}

impl<T> ResponseEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Success with nothing to return (`data: null`).
    pub fn empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    /// A zero status code is replaced with 500.
    pub fn failure(message: impl Into<String>, status_code: u16) -> Self {
        let status_code = if status_code == 0 { 500 } else { status_code };
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                message: message.into(),
                status_code,
            }),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorBody> {
        self.error.as_ref()
    }

    pub fn into_result(self) -> Result<Option<T>, ErrorBody> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }
}

impl ResponseEnvelope<Value> {
    /// Success carrying arbitrary JSON. `null` becomes [`ResponseEnvelope::empty`]
    /// so the envelope reads back the same way it was written.
    pub fn from_value(data: Value) -> Self {
        match data {
            Value::Null => Self::empty(),
            data => Self::ok(data),
        }
    }
}
