//! HTTP server
//!
//! Hosts two JSON routes:
//! - `POST /api/scrape`: fetch a page server-side and return its text
//! - `POST /api/chat`: forward a chat-completion request upstream, adding
//!   the bearer credential that only the server holds

use crate::config::{CompletionConfig, Config};
use crate::error::{ChatlineError, Result};
use crate::scrape::Scraper;
use axum::routing::post;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub mod handlers;

/// Upstream completion endpoint the proxy forwards to
pub struct CompletionProxy {
    pub(crate) client: reqwest::Client,
    pub(crate) config: CompletionConfig,
    pub(crate) api_key: Option<String>,
}

impl CompletionProxy {
    /// Create a proxy for the configured upstream
    ///
    /// # Errors
    ///
    /// Returns `ChatlineError::Config` if the HTTP client fails to build
    pub fn new(config: CompletionConfig, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("chatline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatlineError::Config(format!("Failed to create HTTP client: {}", e)))?;

        if api_key.is_none() {
            tracing::warn!("Completion proxy has no API key; upstream requests are unauthenticated");
        }

        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

impl std::fmt::Debug for CompletionProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionProxy")
            .field("endpoint", &self.config.endpoint)
            .field("authenticated", &self.api_key.is_some())
            .finish()
    }
}

/// Shared state for all routes
#[derive(Debug)]
pub struct AppState {
    pub scraper: Scraper,
    pub proxy: CompletionProxy,
}

impl AppState {
    /// Build state from configuration and the server-held API key
    pub fn from_config(config: &Config, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            scraper: Scraper::from_config(&config.server)?,
            proxy: CompletionProxy::new(config.completion.clone(), api_key)?,
        })
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/scrape", post(handlers::scrape))
        .route("/api/chat", post(handlers::chat))
        .layer(cors)
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C
///
/// # Errors
///
/// Returns error if the state cannot be built or the address cannot be bound
pub async fn serve(config: &Config, api_key: Option<String>) -> Result<()> {
    let state = Arc::new(AppState::from_config(config, api_key)?);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .map_err(|e| {
            ChatlineError::Config(format!("Failed to bind {}: {}", config.server.addr, e))
        })?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
