//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo; one task per connection.

use bytes::Bytes;
use futures::FutureExt;
use http_body_util::Full;
use hyper::body::Body;
use hyper::header::{HeaderValue, ORIGIN};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::db::MongoClient;
use crate::dispatch::{DispatchConfig, MeteredDispatcher};
use crate::entitlements::{
    EntitlementGate, EntitlementStore, MemoryEntitlementStore, MongoEntitlementStore,
};
use crate::ledger::{CreationLedger, LikeAggregate, MemoryLedger, MongoLedger};
use crate::logging::UsageLogger;
use crate::routes::{self, error_response, route_not_found, FullBody};
use crate::services::Providers;
use crate::types::{AiverseError, Result};

/// Persistence backends shared by the gate, dispatcher and routes
#[derive(Clone)]
pub struct Stores {
    pub entitlements: Arc<dyn EntitlementStore>,
    pub ledger: Arc<dyn CreationLedger>,
    pub likes: Arc<dyn LikeAggregate>,
    pub mongo: Option<MongoClient>,
}

impl Stores {
    /// MongoDB collections with indexes applied
    pub async fn mongo(mongo: MongoClient) -> Result<Self> {
        let ledger = Arc::new(MongoLedger::new(&mongo).await?);
        let entitlements = Arc::new(MongoEntitlementStore::new(&mongo).await?);

        Ok(Self {
            entitlements,
            ledger: ledger.clone(),
            likes: ledger,
            mongo: Some(mongo),
        })
    }

    /// Fresh in-memory stores
    pub fn memory() -> Self {
        Self::from_memory(MemoryEntitlementStore::new(), MemoryLedger::new())
    }

    /// In-memory stores the caller keeps handles to
    pub fn from_memory(entitlements: MemoryEntitlementStore, ledger: MemoryLedger) -> Self {
        let ledger = Arc::new(ledger);
        Self {
            entitlements: Arc::new(entitlements),
            ledger: ledger.clone(),
            likes: ledger,
            mongo: None,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub gate: EntitlementGate,
    pub dispatcher: MeteredDispatcher,
    pub ledger: Arc<dyn CreationLedger>,
    pub likes: Arc<dyn LikeAggregate>,
    pub usage: UsageLogger,
    pub mongo: Option<MongoClient>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, stores: Stores, providers: Providers, usage: UsageLogger) -> Result<Self> {
        let validator = args.jwt_validator()?;
        let gate = EntitlementGate::new(validator, Arc::clone(&stores.entitlements), usage.clone());
        let dispatcher = MeteredDispatcher::new(
            providers,
            Arc::clone(&stores.ledger),
            Arc::clone(&stores.entitlements),
            usage.clone(),
            DispatchConfig::from_args(&args),
        );

        Ok(Self {
            args,
            gate,
            dispatcher,
            ledger: stores.ledger,
            likes: stores.likes,
            usage,
            mongo: stores.mongo,
            started_at: Instant::now(),
        })
    }

    /// Name of the datastore backend
    pub fn backend(&self) -> &'static str {
        if self.mongo.is_some() {
            "mongodb"
        } else {
            "memory"
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "AIVerse listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - in-memory fallbacks and dev JWT secret allowed");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Handle one request: route it, turn errors and panics into JSON, and add
/// CORS and security headers
pub async fn handle_request<B>(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<B>,
) -> std::result::Result<Response<FullBody>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let origin = req
        .headers()
        .get(ORIGIN)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    info!("[{}] {} {}", addr, method, path);

    let mut response = if method == Method::OPTIONS {
        preflight_response()
    } else {
        match AssertUnwindSafe(route(Arc::clone(&state), req)).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                if err.status_code().is_server_error() {
                    error!("[{}] {} {} failed: {}", addr, method, path, err);
                }
                error_response(err)
            }
            Err(_) => {
                error!("[{}] {} {} panicked", addr, method, path);
                error_response(AiverseError::Internal("Internal server error".into()))
            }
        }
    };

    apply_cors(&mut response, origin.as_deref(), &state.args);
    apply_security_headers(&mut response);

    Ok(response)
}

async fn route<B>(state: Arc<AppState>, req: Request<B>) -> Result<Response<FullBody>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let raw_path = req.uri().path().to_string();
    let path = match raw_path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    match (method, path) {
        (Method::GET, "/") => Ok(text_response(StatusCode::OK, "Server is live and running!")),

        (Method::GET, "/health") => Ok(routes::health_check(state).await),

        (Method::GET, "/ready") => Ok(routes::readiness_check(state).await),

        (Method::GET, "/version") => Ok(routes::version_info()),

        (_, p) if p.starts_with("/api/ai/") => {
            routes::handle_ai_request(req, state, &p["/api/ai/".len()..]).await
        }

        (_, p) if p.starts_with("/api/creations/") => {
            routes::handle_creations_request(req, state, &p["/api/creations/".len()..]).await
        }

        _ => Err(route_not_found()),
    }
}

/// Echo the origin back when it is on the allow-list
fn apply_cors(response: &mut Response<FullBody>, origin: Option<&str>, args: &Args) {
    let headers = response.headers_mut();
    headers.insert("Vary", HeaderValue::from_static("Origin"));

    let Some(origin) = origin.filter(|o| args.is_allowed_origin(o)) else {
        return;
    };
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert("Access-Control-Allow-Origin", value);
        headers.insert(
            "Access-Control-Allow-Credentials",
            HeaderValue::from_static("true"),
        );
    }
}

fn apply_security_headers(response: &mut Response<FullBody>) {
    let headers = response.headers_mut();
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("SAMEORIGIN"));
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));
}

/// CORS preflight response
fn preflight_response() -> Response<FullBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Headers", "Authorization, Content-Type")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Max-Age", "86400")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn text_response(status: StatusCode, text: &'static str) -> Response<FullBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from_static(text.as_bytes())))
        .unwrap()
}
