//! Cloud service plumbing shared by the conversation and speech clients
//!
//! Guest credentials come from an identity pool; every other call is signed
//! with those credentials.

mod cognito;
mod credentials;
pub mod sigv4;

pub use cognito::CognitoCredentialProvider;
pub use credentials::{CredentialProvider, Credentials};

/// Render a failed service response as a short message
///
/// Service error bodies are JSON carrying `message` (or `Message`) and,
/// for JSON-RPC style services, the exception name in `__type`.
#[must_use]
pub fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return if body.trim().is_empty() {
            format!("{status}")
        } else {
            format!("{status}: {}", body.trim())
        };
    };

    let message = value
        .get("message")
        .or_else(|| value.get("Message"))
        .and_then(serde_json::Value::as_str);
    let kind = exception_name(&value);

    match (kind, message) {
        (Some(kind), Some(message)) => format!("{status} {kind}: {message}"),
        (None, Some(message)) => format!("{status}: {message}"),
        (Some(kind), None) => format!("{status} {kind}"),
        (None, None) => format!("{status}"),
    }
}

/// Exception name from a service error body, without its namespace
#[must_use]
pub fn error_kind(body: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    exception_name(&value).map(str::to_string)
}

fn exception_name(value: &serde_json::Value) -> Option<&str> {
    value
        .get("__type")
        .and_then(serde_json::Value::as_str)
        .map(|t| t.rsplit('#').next().unwrap_or(t))
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;

    #[test]
    fn describes_json_rpc_error() {
        let body = r#"{"__type":"com.amazonaws#NotAuthorizedException","message":"Unauthenticated access is not supported"}"#;
        assert_eq!(
            describe_error(StatusCode::BAD_REQUEST, body),
            "400 Bad Request NotAuthorizedException: Unauthenticated access is not supported"
        );
    }

    #[test]
    fn kind_strips_namespace() {
        let body = r#"{"__type":"com.amazonaws.cognito.identity#ResourceNotFoundException"}"#;
        assert_eq!(error_kind(body).as_deref(), Some("ResourceNotFoundException"));
        assert_eq!(error_kind(r#"{"message":"x"}"#), None);
        assert_eq!(error_kind("not json"), None);
    }

    #[test]
    fn describes_rest_error() {
        let body = r#"{"message":"Rate exceeded"}"#;
        assert_eq!(
            describe_error(StatusCode::TOO_MANY_REQUESTS, body),
            "429 Too Many Requests: Rate exceeded"
        );
    }

    #[test]
    fn describes_plain_body() {
        assert_eq!(
            describe_error(StatusCode::BAD_GATEWAY, " upstream down \n"),
            "502 Bad Gateway: upstream down"
        );
        assert_eq!(
            describe_error(StatusCode::INTERNAL_SERVER_ERROR, ""),
            "500 Internal Server Error"
        );
    }
}
