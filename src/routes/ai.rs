//! Metered AI operation routes (`/api/ai/*`)
//!
//! The entitlement check runs before the body is read, so a denied caller
//! never uploads a file.

use bytes::Bytes;
use hyper::body::Body;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use super::{auth_header, header_value, json_response, parse_json, read_body, route_not_found, FullBody};
use crate::dispatch::{Operation, OperationRequest};
use crate::server::AppState;
use crate::services::parse_multipart;
use crate::types::Result;

#[derive(Debug, Deserialize)]
struct ArticleBody {
    prompt: Option<String>,
    length: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PromptBody {
    prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageBody {
    prompt: Option<String>,
    publish: Option<bool>,
}

/// Handle `POST /api/ai/{operation}`
pub async fn handle_ai_request<B>(req: Request<B>, state: Arc<AppState>, slug: &str) -> Result<Response<FullBody>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let op = Operation::from_slug(slug)
        .filter(|_| req.method() == Method::POST)
        .ok_or_else(route_not_found)?;

    let ctx = state.gate.resolve(auth_header(&req).as_deref()).await?;
    state.dispatcher.authorize(&ctx, op).await?;

    let content_type = header_value(&req, CONTENT_TYPE);
    let body = read_body(req.into_body(), state.args.max_upload_bytes).await?;
    let request = build_request(op, content_type.as_deref(), body).await?;

    let outcome = state.dispatcher.dispatch(&ctx, request).await?;

    Ok(json_response(
        StatusCode::OK,
        &serde_json::json!({
            "success": true,
            "message": outcome.message(),
            "content": outcome.content(),
        }),
    ))
}

/// Turn the HTTP body into the operation's raw payload
async fn build_request(op: Operation, content_type: Option<&str>, body: Bytes) -> Result<OperationRequest> {
    Ok(match op {
        Operation::GenerateArticle => {
            let b: ArticleBody = parse_json(&body)?;
            OperationRequest::Article {
                prompt: b.prompt,
                length: b.length,
            }
        }
        Operation::GenerateBlogTitle => {
            let b: PromptBody = parse_json(&body)?;
            OperationRequest::BlogTitle { prompt: b.prompt }
        }
        Operation::GenerateImage => {
            let b: ImageBody = parse_json(&body)?;
            OperationRequest::Image {
                prompt: b.prompt,
                publish: b.publish.unwrap_or(false),
            }
        }
        Operation::RemoveBackground => {
            let mut form = parse_multipart(content_type, body, &["image"]).await?;
            OperationRequest::RemoveBackground {
                image: form.take_file("image"),
            }
        }
        Operation::RemoveObject => {
            let mut form = parse_multipart(content_type, body, &["image"]).await?;
            OperationRequest::RemoveObject {
                object: form.field("object").map(str::to_string),
                image: form.take_file("image"),
            }
        }
        Operation::ReviewResume => {
            let mut form = parse_multipart(content_type, body, &["resume"]).await?;
            OperationRequest::ReviewResume {
                resume: form.take_file("resume"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_payloads() {
        let request = build_request(
            Operation::GenerateArticle,
            Some("application/json"),
            Bytes::from_static(br#"{"prompt":"Rust","length":800}"#),
        )
        .await
        .unwrap();
        match request {
            OperationRequest::Article { prompt, length } => {
                assert_eq!(prompt.as_deref(), Some("Rust"));
                assert_eq!(length, Some(800));
            }
            other => panic!("unexpected request {:?}", other),
        }

        let request = build_request(Operation::GenerateImage, None, Bytes::from_static(br#"{"prompt":"cat"}"#))
            .await
            .unwrap();
        assert!(matches!(request, OperationRequest::Image { publish: false, .. }));
    }

    #[tokio::test]
    async fn test_multipart_without_boundary_is_rejected() {
        let err = build_request(Operation::RemoveBackground, Some("application/json"), Bytes::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
