// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Failure classes for calls against the inspection backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend could not be reached or the request timed out.
    #[error("cannot reach {base_url} -- check [api] base_url and that the backend is running ({source})")]
    Transport {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The bearer token was rejected.
    #[error("session expired -- sign in again")]
    Unauthorized,

    /// The backend refused the request with a readable reason.
    #[error("server error ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// A 2xx body carried `success: false`.
    #[error("request not accepted: {0}")]
    Unsuccessful(String),

    #[error("decode {what}: {detail}")]
    Decode { what: &'static str, detail: String },
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    pub(crate) fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return Self::Unauthorized;
        }
        Self::Rejected {
            status: status.as_u16(),
            message: server_message(status, body),
        }
    }
}

/// True when anywhere in the chain the backend answered 401.
pub fn is_unauthorized(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<ApiError>())
        .any(ApiError::is_unauthorized)
}

/// Picks the most useful human message out of an error body.
pub fn server_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body)
        && let Some(message) = message_from_value(&parsed)
    {
        return message;
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('{') && !trimmed.contains('<')
    {
        return trimmed.to_owned();
    }

    fallback_message(status)
}

pub(crate) fn message_from_value(value: &Value) -> Option<String> {
    let object = value.as_object()?;
    if let Some(error) = object.get("error") {
        match error {
            Value::String(text) if !text.trim().is_empty() => return Some(text.trim().to_owned()),
            Value::Object(inner) => {
                for key in ["message", "details"] {
                    if let Some(text) = inner.get(key).and_then(plain_text) {
                        return Some(text);
                    }
                }
                // Field validation errors: {"email": ["already registered"]}
                if let Some((field, detail)) = inner.iter().find_map(|(field, detail)| {
                    plain_text(detail).map(|detail| (field.clone(), detail))
                }) {
                    return Some(format!("{field}: {detail}"));
                }
            }
            _ => {}
        }
    }
    ["message", "detail"]
        .iter()
        .find_map(|key| object.get(*key).and_then(plain_text))
}

fn plain_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
        Value::Array(items) => items.iter().find_map(plain_text),
        _ => None,
    }
}

fn fallback_message(status: StatusCode) -> String {
    match status.as_u16() {
        400 => "the request was invalid".to_owned(),
        403 => "permission denied for this account".to_owned(),
        404 => "the requested record does not exist".to_owned(),
        500..=599 => "the backend failed -- try again later".to_owned(),
        code => format!("server returned {code}"),
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiError, is_unauthorized, server_message};
    use anyhow::Context;
    use reqwest::StatusCode;

    #[test]
    fn error_string_wins() {
        let message = server_message(StatusCode::BAD_REQUEST, r#"{"error":"Credenciales inválidas"}"#);
        assert_eq!(message, "Credenciales inválidas");
    }

    #[test]
    fn error_object_message_then_details() {
        let body = r#"{"error":{"message":"slot taken","details":"ignored"}}"#;
        assert_eq!(server_message(StatusCode::BAD_REQUEST, body), "slot taken");
        let body = r#"{"error":{"details":"inspector unavailable"}}"#;
        assert_eq!(
            server_message(StatusCode::BAD_REQUEST, body),
            "inspector unavailable"
        );
    }

    #[test]
    fn field_errors_are_flattened() {
        let body = r#"{"error":{"email":["already registered"]}}"#;
        assert_eq!(
            server_message(StatusCode::BAD_REQUEST, body),
            "email: already registered"
        );
    }

    #[test]
    fn message_and_detail_keys() {
        assert_eq!(
            server_message(StatusCode::FORBIDDEN, r#"{"message":"nope"}"#),
            "nope"
        );
        assert_eq!(
            server_message(StatusCode::NOT_FOUND, r#"{"detail":"Not found."}"#),
            "Not found."
        );
    }

    #[test]
    fn short_plain_body_is_used_verbatim() {
        assert_eq!(
            server_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
    }

    #[test]
    fn html_and_unknown_json_fall_back_to_status() {
        assert_eq!(
            server_message(StatusCode::INTERNAL_SERVER_ERROR, "<html>boom</html>"),
            "the backend failed -- try again later"
        );
        assert_eq!(
            server_message(StatusCode::IM_A_TEAPOT, r#"{"other":1}"#),
            "server returned 418"
        );
    }

    #[test]
    fn unauthorized_is_found_through_context() {
        let error = Err::<(), _>(ApiError::from_status(StatusCode::UNAUTHORIZED, ""))
            .context("load appointments")
            .expect_err("should fail");
        assert!(is_unauthorized(&error));

        let other = anyhow::Error::new(ApiError::from_status(StatusCode::FORBIDDEN, ""));
        assert!(!is_unauthorized(&other));
    }
}
