//! Remote completion client
//!
//! [`CompletionClient`] is the seam between the session controller and the
//! remote chat-completion endpoint. [`HttpCompletionClient`] is the real
//! implementation; tests drive the controller with a scripted fake.

use crate::config::CompletionConfig;
use crate::error::{ChatResult, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub mod http;

pub use http::{ChatCompletionRequest, ChatCompletionResponse, HttpCompletionClient, WireMessage};

/// Client for a remote chat-completion endpoint
///
/// One invocation issues exactly one outbound request. No retries.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use chatline::completion::CompletionClient;
/// use chatline::error::ChatResult;
/// use tokio_util::sync::CancellationToken;
///
/// struct Echo;
///
/// #[async_trait]
/// impl CompletionClient for Echo {
///     async fn complete(&self, prompt: &str, _cancel: CancellationToken) -> ChatResult<String> {
///         Ok(prompt.to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Request an assistant reply for a single user prompt
    ///
    /// # Arguments
    ///
    /// * `prompt` - The user message text
    /// * `cancel` - Token that aborts the request when triggered
    ///
    /// # Errors
    ///
    /// - `ChatlineError::Cancelled` if `cancel` fires before the reply arrives
    /// - `ChatlineError::Network` on transport failure or non-2xx status
    /// - `ChatlineError::MalformedResponse` if the reply text is missing
    async fn complete(&self, prompt: &str, cancel: CancellationToken) -> ChatResult<String>;
}

/// Create the HTTP completion client from configuration
///
/// # Arguments
///
/// * `config` - Completion endpoint configuration
/// * `api_key` - Optional bearer key; `None` when talking to a proxy
///
/// # Errors
///
/// Returns error if the HTTP client cannot be built
pub fn create_client(
    config: &CompletionConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn CompletionClient>> {
    let client = HttpCompletionClient::new(config.clone(), api_key)?;
    Ok(Arc::new(client))
}
