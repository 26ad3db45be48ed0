use async_trait::async_trait;
use chatline::completion::CompletionClient;
use chatline::error::{ChatResult, ChatlineError};
use chatline::storage::{ConversationStore, DEFAULT_INDEX_KEY};
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Scripted completion outcome
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    Fail(String),
    Hang,
}

/// Completion client replaying scripted outcomes in order
#[allow(dead_code)]
#[derive(Debug)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Scripted>>,
}

#[allow(dead_code)]
impl ScriptedClient {
    pub fn new(steps: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
        })
    }

    pub fn replying(reply: &str) -> Arc<Self> {
        Self::new(vec![Scripted::Reply(reply.to_string())])
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, _prompt: &str, cancel: CancellationToken) -> ChatResult<String> {
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scripted::Reply("ok".to_string()));
        match step {
            Scripted::Reply(reply) => Ok(reply),
            Scripted::Fail(msg) => Err(ChatlineError::Network(msg)),
            Scripted::Hang => {
                cancel.cancelled().await;
                Err(ChatlineError::Cancelled)
            }
        }
    }
}

#[allow(dead_code)]
pub fn create_temp_store() -> (ConversationStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let store = ConversationStore::open(tmp.path().join("conversations"), DEFAULT_INDEX_KEY)
        .expect("failed to open sled store");
    (store, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
