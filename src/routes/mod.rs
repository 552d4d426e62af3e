//! HTTP routes for AIVerse

pub mod ai;
pub mod creations;
pub mod health;

pub use ai::handle_ai_request;
pub use creations::handle_creations_request;
pub use health::{health_check, readiness_check, version_info};

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderName, AUTHORIZATION};
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{AiverseError, Result};

/// Response body type used by every route
pub type FullBody = Full<Bytes>;

/// Build a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let body = serde_json::to_string(body)
        .unwrap_or_else(|_| r#"{"success":false,"message":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Render an error as `{ success: false, message }`
pub fn error_response(err: AiverseError) -> Response<FullBody> {
    let (status, body) = err.into_status_code_and_body();

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

pub fn route_not_found() -> AiverseError {
    AiverseError::NotFound("Route not found".into())
}

pub fn header_value<B>(req: &Request<B>, name: HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn auth_header<B>(req: &Request<B>) -> Option<String> {
    header_value(req, AUTHORIZATION)
}

/// Buffer a request body, refusing anything over `limit` bytes
pub async fn read_body<B>(body: B, limit: usize) -> Result<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(AiverseError::Validation(
            format!("Request body exceeds the {} byte limit", limit),
        )),
        Err(e) => Err(AiverseError::Validation(format!(
            "Failed to read request body: {}",
            e
        ))),
    }
}

/// Parse a JSON body; an empty body reads as `{}`
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"{}")?);
    }
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct PromptBody {
        prompt: Option<String>,
    }

    #[test]
    fn test_empty_body_is_empty_object() {
        let body: PromptBody = parse_json(b"").unwrap();
        assert!(body.prompt.is_none());

        let body: PromptBody = parse_json(br#"{"prompt":"hi"}"#).unwrap();
        assert_eq!(body.prompt.as_deref(), Some("hi"));

        assert!(parse_json::<PromptBody>(b"{not json").is_err());
    }

    #[tokio::test]
    async fn test_read_body_enforces_limit() {
        let ok = read_body(Full::new(Bytes::from_static(b"12345")), 5).await.unwrap();
        assert_eq!(ok.as_ref(), b"12345");

        let err = read_body(Full::new(Bytes::from_static(b"123456")), 5)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_error_response_shape() {
        let response = error_response(AiverseError::NotFound("Creation not found".into()));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
