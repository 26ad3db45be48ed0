//! Test utilities for Chatline
//!
//! Provides a scripted completion client, key-value media that fail on
//! demand, and small config helpers used by the unit tests.

use crate::completion::CompletionClient;
use crate::config::Config;
use crate::error::{ChatResult, ChatlineError};
use crate::storage::{ConversationStore, KeyValueStore, MemoryStore};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// One scripted outcome of [`FakeCompletionClient::complete`]
#[derive(Debug, Clone)]
pub enum Step {
    /// Resolve immediately with this reply
    Reply(String),
    /// Resolve immediately with a network error
    Network(String),
    /// Resolve immediately with a malformed-response error
    Malformed(String),
    /// Never resolve on its own; honour the token and return `Cancelled`
    WaitForCancel,
    /// Wait for the token, then return this reply anyway
    ReplyAfterCancel(String),
    /// Wait until [`FakeCompletionClient::release`] is called, then reply
    ReplyWhenReleased(String),
}

/// Completion client replaying a script of [`Step`]s
///
/// Records every prompt it receives. When the script runs out it replies
/// with `"ok"`.
#[derive(Debug, Default)]
pub struct FakeCompletionClient {
    script: Mutex<VecDeque<Step>>,
    prompts: Mutex<Vec<String>>,
    release: Notify,
}

impl FakeCompletionClient {
    /// Create a client with the given script
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            release: Notify::new(),
        })
    }

    /// Client that always replies with `reply`
    pub fn replying(reply: &str) -> Arc<Self> {
        Self::new(vec![Step::Reply(reply.to_string())])
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Let a [`Step::ReplyWhenReleased`] call resolve
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl CompletionClient for FakeCompletionClient {
    async fn complete(&self, prompt: &str, cancel: CancellationToken) -> ChatResult<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());

        let step = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Step::Reply("ok".to_string()));

        match step {
            Step::Reply(reply) => Ok(reply),
            Step::Network(msg) => Err(ChatlineError::Network(msg)),
            Step::Malformed(msg) => Err(ChatlineError::MalformedResponse(msg)),
            Step::WaitForCancel => {
                cancel.cancelled().await;
                Err(ChatlineError::Cancelled)
            }
            Step::ReplyAfterCancel(reply) => {
                cancel.cancelled().await;
                Ok(reply)
            }
            Step::ReplyWhenReleased(reply) => {
                self.release.notified().await;
                Ok(reply)
            }
        }
    }
}

/// Key-value medium whose writes can be switched to fail
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    /// Store that fails every write from the start
    pub fn failing() -> Self {
        let store = Self::default();
        store.set_fail_writes(true);
        store
    }

    /// Toggle write failures
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> ChatResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> ChatResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ChatlineError::Storage("disk full".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> ChatResult<()> {
        self.inner.remove(key)
    }
}

/// Conversation store over a fresh in-memory medium, plus the medium itself
pub fn memory_store() -> (ConversationStore, Arc<MemoryStore>) {
    let kv = Arc::new(MemoryStore::new());
    (ConversationStore::new(kv.clone()), kv)
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or the error message doesn't contain the
/// expected string
pub fn assert_error_contains<T: std::fmt::Debug>(result: ChatResult<T>, expected: &str) {
    match result {
        Ok(value) => panic!("Expected error containing '{}', got Ok({:?})", expected, value),
        Err(e) => {
            let msg = e.to_string();
            assert!(
                msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                msg,
                expected
            );
        }
    }
}

/// Configuration suitable for tests
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.completion.endpoint = "http://127.0.0.1:9/v1/chat/completions".to_string();
    config.completion.timeout_seconds = 5;
    config.server.scrape_timeout_seconds = 5;
    config
}
