//! Creation routes (`/api/creations/*`)
//!
//! - GET  /api/creations/published - community feed, no auth
//! - GET  /api/creations/user - the caller's creations
//! - POST /api/creations/toggle-like - like or unlike a creation

use bytes::Bytes;
use hyper::body::Body;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::{auth_header, json_response, parse_json, read_body, route_not_found, FullBody};
use crate::logging::EventType;
use crate::server::AppState;
use crate::types::{AiverseError, Result};

/// Toggle-like bodies are tiny
const TOGGLE_BODY_LIMIT: usize = 16 * 1024;

#[derive(Debug, Deserialize)]
struct ToggleLikeBody {
    id: Option<String>,
}

/// Handle `/api/creations/{action}`
pub async fn handle_creations_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    action: &str,
) -> Result<Response<FullBody>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();

    match (method, action) {
        (Method::GET, "published") => {
            let creations = state.ledger.list_published().await?;
            debug!(count = creations.len(), "Serving published feed");
            Ok(json_response(
                StatusCode::OK,
                &serde_json::json!({ "success": true, "creations": creations }),
            ))
        }

        (Method::GET, "user") => {
            let user_id = state.gate.authenticate(auth_header(&req).as_deref())?;
            let creations = state.ledger.list_by_user(&user_id).await?;
            Ok(json_response(
                StatusCode::OK,
                &serde_json::json!({ "success": true, "creations": creations }),
            ))
        }

        (Method::POST, "toggle-like") => {
            let user_id = state.gate.authenticate(auth_header(&req).as_deref())?;
            let body = read_body(req.into_body(), TOGGLE_BODY_LIMIT).await?;
            let ToggleLikeBody { id } = parse_json(&body)?;

            let creation_id = id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .ok_or_else(|| AiverseError::Validation("Missing creation ID".into()))?;

            let likes = state.likes.toggle_like(&creation_id, &user_id).await?;

            debug!(user_id = %user_id, creation_id = %creation_id, likes, "Like toggled");
            state
                .usage
                .log(
                    state
                        .usage
                        .event(EventType::LikeToggled)
                        .with_user(&user_id)
                        .with_creation(&creation_id)
                        .with_metadata(serde_json::json!({ "likes": likes })),
                )
                .await;

            Ok(json_response(
                StatusCode::OK,
                &serde_json::json!({
                    "success": true,
                    "message": "Like toggled successfully",
                    "likes": likes,
                }),
            ))
        }

        _ => Err(route_not_found()),
    }
}
