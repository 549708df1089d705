//! HTTP routes and handlers.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::Response;
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, error, info};
use serde::Serialize;
use serde_json::Value;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::TranscriptResult;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::ratelimit::{ClientRateLimiter, rate_limit};
use crate::service::{TranscriptRequest, TranscriptService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TranscriptService>,
}

#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub success: bool,
    pub video_id: String,
    pub languages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache_size: usize,
    pub cache_maxsize: usize,
}

pub async fn transcript(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<TranscriptResult>> {
    let Json(body) = body.map_err(|e| {
        debug!("Rejected transcript request body: {e}");
        ApiError::MalformedBody(e.body_text())
    })?;
    let request = TranscriptRequest::from_json(body)?;
    state.service.transcript(&request).await.map(Json)
}

pub async fn languages(State(state): State<AppState>, Path(video_id): Path<String>) -> Json<LanguagesResponse> {
    let languages = state.service.languages(&video_id).await;
    Json(LanguagesResponse {
        success: true,
        video_id,
        languages,
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let cache = state.service.cache();
    Json(HealthResponse {
        status: "healthy",
        cache_size: cache.len(),
        cache_maxsize: cache.capacity(),
    })
}

/// Request logging middleware.
async fn request_logging(request: Request, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = start.elapsed().as_millis();
    if uri.path() == "/api/health" {
        debug!("{method} {uri} {status} {duration_ms}ms");
    } else {
        info!("{method} {uri} {status} {duration_ms}ms");
    }
    response
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    error!("Handler panicked: {detail}");
    ApiError::Internal(detail).into_response()
}

fn limited(router: Router<AppState>, limiter: ClientRateLimiter) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(Arc::new(limiter), rate_limit))
}

/// Create the API router.
pub fn create_router(state: AppState, config: &Config) -> Router {
    let transcript_routes = limited(
        Router::new().route("/api/transcript", post(transcript)),
        ClientRateLimiter::per_hour(config.transcript_rate_limit_per_hour),
    );
    let language_routes = limited(
        Router::new().route("/api/languages/:video_id", get(languages)),
        ClientRateLimiter::per_hour(config.rate_limit_per_hour),
    );
    let health_routes = limited(
        Router::new().route("/api/health", get(health)),
        ClientRateLimiter::per_hour(config.rate_limit_per_hour),
    );

    Router::new()
        .merge(transcript_routes)
        .merge(language_routes)
        .merge(health_routes)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}
