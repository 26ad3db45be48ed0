//! Route handlers
//!
//! Request bodies are taken as raw bytes and parsed here so that malformed
//! JSON produces the documented error payloads instead of axum's default
//! rejection.

use super::AppState;
use crate::completion::{ChatCompletionRequest, WireMessage};
use crate::error::ChatlineError;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeResponse {
    fn failure(status: StatusCode, error: &str) -> Response {
        (
            status,
            Json(ScrapeResponse {
                success: false,
                content: None,
                error: Some(error.to_string()),
            }),
        )
            .into_response()
    }
}

/// `POST /api/scrape`
pub async fn scrape(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: ScrapeRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Rejected scrape request body: {}", e);
            return ScrapeResponse::failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    // Only an absent or empty url is missing; a blank one fails as a scrape.
    let Some(url) = request.url.filter(|u| !u.is_empty()) else {
        return ScrapeResponse::failure(StatusCode::BAD_REQUEST, "URL is required");
    };

    match state.scraper.scrape(&url).await {
        Ok(content) => (
            StatusCode::OK,
            Json(ScrapeResponse {
                success: true,
                content: Some(content),
                error: None,
            }),
        )
            .into_response(),
        Err(e @ ChatlineError::RateLimitExceeded { .. }) => {
            tracing::warn!("Scrape rejected: {}", e);
            ScrapeResponse::failure(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded")
        }
        Err(e) => {
            tracing::warn!("Failed to scrape {}: {}", url, e);
            ScrapeResponse::failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to scrape website")
        }
    }
}

/// Body accepted by the completion proxy
#[derive(Debug, Deserialize)]
pub struct ProxyRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn proxy_error(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(json!({ "error": error.into() }))).into_response()
}

/// `POST /api/chat`
pub async fn chat(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: ProxyRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return proxy_error(StatusCode::BAD_REQUEST, format!("Invalid request: {}", e)),
    };

    if request.messages.is_empty() {
        return proxy_error(StatusCode::BAD_REQUEST, "messages cannot be empty");
    }

    let proxy = &state.proxy;
    let upstream = ChatCompletionRequest {
        model: request.model.unwrap_or_else(|| proxy.config.model.clone()),
        messages: request.messages,
        max_tokens: request.max_tokens.unwrap_or(proxy.config.max_tokens),
        stream: false,
    };

    tracing::debug!(
        "Proxying completion request: model={}, messages={}",
        upstream.model,
        upstream.messages.len()
    );

    let mut outbound = proxy.client.post(&proxy.config.endpoint).json(&upstream);
    if let Some(key) = &proxy.api_key {
        outbound = outbound.bearer_auth(key);
    }

    let response = match outbound.send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Upstream completion request failed: {}", e);
            return proxy_error(StatusCode::BAD_GATEWAY, format!("Upstream request failed: {}", e));
        }
    };

    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    match response.bytes().await {
        Ok(bytes) => (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            bytes.to_vec(),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to read upstream response: {}", e);
            proxy_error(StatusCode::BAD_GATEWAY, format!("Upstream response unreadable: {}", e))
        }
    }
}
