//! http
//!
//! Request and response plumbing shared by the OAuth agent client and the
//! API fetch channel.
//!
//! # Headers
//!
//! Every outbound request carries:
//! - `x-mycompany-api-client` - the client name
//! - `x-mycompany-session-id` - the per-load session id
//! - `x-mycompany-correlation-id` - a fresh id per request
//!
//! State-changing requests additionally carry `x-mycompany-csrf` once an
//! anti-forgery token is held (see [`crate::auth::Authenticator`]).

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::core::session::{correlation_id, SessionId};

/// Client identifier header.
pub const CLIENT_HEADER: HeaderName = HeaderName::from_static("x-mycompany-api-client");

/// Session identifier header.
pub const SESSION_ID_HEADER: HeaderName = HeaderName::from_static("x-mycompany-session-id");

/// Per-request correlation identifier header.
pub const CORRELATION_ID_HEADER: HeaderName =
    HeaderName::from_static("x-mycompany-correlation-id");

/// Anti-forgery token header.
pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-mycompany-csrf");

/// Asks the API to throw a simulated exception, for error-path testing.
pub const TEST_EXCEPTION_HEADER: HeaderName =
    HeaderName::from_static("x-mycompany-test-exception");

/// Build an HTTP client that keeps cookies between requests.
///
/// Clones share one cookie jar, so the OAuth agent client and the API
/// fetch channel see the same session, as they would in a browser.
pub fn cookie_client() -> Result<Client, reqwest::Error> {
    Client::builder().cookie_store(true).build()
}

/// Whether a method changes state and so needs an anti-forgery token.
pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Build the correlation headers for one request.
///
/// Header values that cannot be encoded are skipped rather than failing the
/// request; the ids are generated UUIDs so this only affects odd client names.
pub fn correlation_headers(client_name: &str, session_id: &SessionId) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(client_name) {
        headers.insert(CLIENT_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(session_id.as_str()) {
        headers.insert(SESSION_ID_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&correlation_id()) {
        headers.insert(CORRELATION_ID_HEADER, value);
    }
    headers
}

/// Error body shape returned by the API and the OAuth agent.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Code and message extracted from a failed response.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorDetails {
    /// Error code from the body, if any
    pub code: Option<String>,
    /// Error message from the body, or the status reason
    pub message: String,
}

/// Read the code and message from an error response body.
pub async fn error_details(response: Response) -> ErrorDetails {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    parse_error_details(status, &text)
}

fn parse_error_details(status: StatusCode, text: &str) -> ErrorDetails {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    ErrorDetails {
        code: body.code,
        message: body
            .message
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string()),
    }
}

/// Why a success body could not be used.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyError {
    /// The body could not be read off the wire.
    Read(String),
    /// The body was not JSON.
    NotJson(String),
}

/// Read a success body as JSON.
///
/// An empty body is returned as `Value::Null`. Anything else that is not
/// JSON is a contract violation.
pub async fn read_json(response: Response) -> Result<Value, BodyError> {
    let text = response
        .text()
        .await
        .map_err(|e| BodyError::Read(e.to_string()))?;
    parse_json(&text)
}

fn parse_json(text: &str) -> Result<Value, BodyError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(text).map_err(|e| {
        BodyError::NotJson(format!("response body is not valid JSON: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutating_methods() {
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::PUT));
        assert!(is_mutating(&Method::PATCH));
        assert!(is_mutating(&Method::DELETE));

        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::HEAD));
        assert!(!is_mutating(&Method::OPTIONS));
    }

    #[test]
    fn correlation_headers_present() {
        let session = SessionId::from("session-1");
        let headers = correlation_headers("FinalSPA", &session);

        assert_eq!(headers.get(CLIENT_HEADER).unwrap(), "FinalSPA");
        assert_eq!(headers.get(SESSION_ID_HEADER).unwrap(), "session-1");
        assert!(headers.get(CORRELATION_ID_HEADER).is_some());
        assert!(headers.get(CSRF_HEADER).is_none());
    }

    #[test]
    fn correlation_id_changes_per_request() {
        let session = SessionId::from("session-1");
        let first = correlation_headers("FinalSPA", &session);
        let second = correlation_headers("FinalSPA", &session);
        assert_ne!(
            first.get(CORRELATION_ID_HEADER),
            second.get(CORRELATION_ID_HEADER)
        );
    }

    #[test]
    fn empty_body_is_null() {
        assert_eq!(parse_json("").unwrap(), Value::Null);
        assert_eq!(parse_json("  \n").unwrap(), Value::Null);
    }

    #[test]
    fn html_body_is_rejected() {
        let err = parse_json("<html><body>Gateway</body></html>").unwrap_err();
        assert!(matches!(err, BodyError::NotJson(_)));
    }

    #[test]
    fn error_details_from_body() {
        let details = parse_error_details(
            StatusCode::BAD_REQUEST,
            r#"{"code":"invalid_company_id","message":"The company id must be a positive integer"}"#,
        );
        assert_eq!(details.code.as_deref(), Some("invalid_company_id"));
        assert!(details.message.contains("positive integer"));
    }

    #[test]
    fn error_details_fall_back_to_reason() {
        let details = parse_error_details(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(details.code.is_none());
        assert_eq!(details.message, "Bad Gateway");
    }
}
