//! Conversation session controller
//!
//! [`SessionController`] owns the message sequence of the active
//! conversation, drives the completion client for send and edit, and mirrors
//! every completed turn into the [`ConversationStore`].
//!
//! All operations take `&self`. State lives behind a mutex that is released
//! before the completion call is awaited, so [`SessionController::cancel`]
//! can run from another task while a request is pending.

use crate::completion::CompletionClient;
use crate::conversation::{
    label_date, ConversationIndex, ConversationSummary, Message, MessageId,
};
use crate::error::{ChatResult, ChatlineError};
use crate::storage::ConversationStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Result of a `send` or `save_edit` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing was sent (empty input)
    Ignored,
    /// The assistant replied; the reply has been appended
    Replied(Message),
    /// The request was cancelled; no reply was appended
    Cancelled,
}

/// The single in-flight completion request
struct PendingRequest {
    id: u64,
    token: CancellationToken,
    conversation: String,
}

struct SessionState {
    index: ConversationIndex,
    active: Option<String>,
    messages: Vec<Message>,
    draft: String,
    edit_target: Option<MessageId>,
    pending: Option<PendingRequest>,
    last_error: Option<String>,
    persistent: bool,
}

impl SessionState {
    fn leave_edit_mode(&mut self) {
        self.edit_target = None;
        self.draft.clear();
    }
}

/// Orchestrates a chat session against a completion client and a store
///
/// # Examples
///
/// ```no_run
/// use chatline::completion::create_client;
/// use chatline::config::CompletionConfig;
/// use chatline::session::{SendOutcome, SessionController};
/// use chatline::storage::{ConversationStore, MemoryStore};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = create_client(&CompletionConfig::default(), None)?;
/// let store = ConversationStore::new(Arc::new(MemoryStore::new()));
/// let session = SessionController::new(client, store);
///
/// if let SendOutcome::Replied(reply) = session.send("hello").await? {
///     println!("{}", reply.content);
/// }
/// # Ok(())
/// # }
/// ```
pub struct SessionController {
    client: Arc<dyn CompletionClient>,
    store: ConversationStore,
    state: Mutex<SessionState>,
    next_request_id: AtomicU64,
}

impl SessionController {
    /// Create a controller, loading the conversation index from `store`
    ///
    /// A store that cannot be read leaves the controller running on an empty
    /// in-memory index; nothing is written back to the store afterwards.
    pub fn new(client: Arc<dyn CompletionClient>, store: ConversationStore) -> Self {
        let (index, persistent, last_error) = match store.load_all() {
            Ok(index) => {
                tracing::info!("Loaded {} stored conversations", index.len());
                (index, true, None)
            }
            Err(e) => {
                tracing::warn!("Failed to load conversations, continuing in memory: {}", e);
                (ConversationIndex::new(), false, Some(e.to_string()))
            }
        };

        Self {
            client,
            store,
            state: Mutex::new(SessionState {
                index,
                active: None,
                messages: Vec::new(),
                draft: String::new(),
                edit_target: None,
                pending: None,
                last_error,
                persistent,
            }),
            next_request_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the whole index; a failure switches to in-memory-only mode
    fn persist(&self, state: &mut SessionState) {
        if !state.persistent {
            return;
        }
        if let Err(e) = self.store.save_all(&state.index) {
            tracing::warn!("Failed to persist conversations, continuing in memory: {}", e);
            state.last_error = Some(e.to_string());
            state.persistent = false;
        }
    }

    /// Label of the active conversation, creating one if none is active
    fn ensure_active(&self, state: &mut SessionState) -> String {
        if let Some(active) = &state.active {
            return active.clone();
        }
        let label = state.index.create_conversation(&label_date());
        tracing::info!("Created conversation {}", label);
        state.active = Some(label.clone());
        label
    }

    fn begin_request(
        &self,
        state: &mut SessionState,
        conversation: String,
    ) -> (u64, CancellationToken) {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        state.pending = Some(PendingRequest {
            id,
            token: token.clone(),
            conversation,
        });
        (id, token)
    }

    /// Await the reply for a pending request and record its outcome
    async fn await_reply(
        &self,
        prompt: &str,
        request_id: u64,
        token: CancellationToken,
    ) -> ChatResult<SendOutcome> {
        let result = self.client.complete(prompt, token.clone()).await;

        let mut state = self.lock();
        let conversation = match state.pending.take() {
            Some(pending) if pending.id == request_id => Some(pending.conversation),
            other => {
                state.pending = other;
                None
            }
        };

        match result {
            Ok(_) if token.is_cancelled() => {
                tracing::debug!("Discarding reply for cancelled request {}", request_id);
                Ok(SendOutcome::Cancelled)
            }
            Ok(reply) => {
                let Some(conversation) = conversation else {
                    return Ok(SendOutcome::Cancelled);
                };
                let message = Message::assistant(reply);
                if state.index.contains(&conversation) {
                    state.index.append_message(&conversation, message.clone());
                    self.persist(&mut state);
                }
                if state.active.as_deref() == Some(conversation.as_str()) {
                    state.messages.push(message.clone());
                }
                Ok(SendOutcome::Replied(message))
            }
            Err(ChatlineError::Cancelled) => {
                tracing::debug!("Request {} cancelled", request_id);
                Ok(SendOutcome::Cancelled)
            }
            Err(e) => {
                tracing::warn!("Completion request failed: {}", e);
                state.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Send a user message and wait for the assistant's reply
    ///
    /// Whitespace-only input is ignored. The user message is appended and
    /// persisted before the request goes out; the reply is appended only
    /// when the request completes without being cancelled.
    ///
    /// # Errors
    ///
    /// - `ChatlineError::RequestInFlight` if a request is already pending
    /// - `ChatlineError::Network` / `ChatlineError::MalformedResponse` from
    ///   the client; the user message stays, no reply is appended
    pub async fn send(&self, text: &str) -> ChatResult<SendOutcome> {
        if text.trim().is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        let (request_id, token) = {
            let mut state = self.lock();
            if state.pending.is_some() {
                return Err(ChatlineError::RequestInFlight);
            }

            let conversation = self.ensure_active(&mut state);
            let message = Message::user(text);
            state.last_error = None;
            state.messages.push(message.clone());
            state.index.append_message(&conversation, message);
            self.persist(&mut state);
            self.begin_request(&mut state, conversation)
        };

        self.await_reply(text, request_id, token).await
    }

    /// Enter edit mode for a message, with `new_text` as the draft
    ///
    /// The message itself is not changed until [`save_edit`](Self::save_edit).
    ///
    /// # Errors
    ///
    /// Returns `ChatlineError::MessageNotFound` if the id is not in the
    /// current sequence
    pub fn edit(&self, message_id: MessageId, new_text: &str) -> ChatResult<()> {
        let mut state = self.lock();
        if !state.messages.iter().any(|m| m.id == message_id) {
            return Err(ChatlineError::MessageNotFound(message_id));
        }
        state.edit_target = Some(message_id);
        state.draft = new_text.to_string();
        Ok(())
    }

    /// Apply the draft to the message being edited and request a new reply
    ///
    /// The edited message keeps its id and author. The new reply is appended
    /// after the existing messages.
    ///
    /// # Errors
    ///
    /// - `ChatlineError::NotEditing` outside of edit mode
    /// - `ChatlineError::RequestInFlight` if a request is already pending
    /// - `ChatlineError::MessageNotFound` if the target was cleared meanwhile
    /// - client errors as for [`send`](Self::send)
    pub async fn save_edit(&self) -> ChatResult<SendOutcome> {
        let (prompt, request_id, token) = {
            let mut state = self.lock();
            let Some(target) = state.edit_target else {
                return Err(ChatlineError::NotEditing);
            };
            if state.draft.trim().is_empty() {
                return Ok(SendOutcome::Ignored);
            }
            if state.pending.is_some() {
                return Err(ChatlineError::RequestInFlight);
            }

            let Some(pos) = state.messages.iter().position(|m| m.id == target) else {
                state.leave_edit_mode();
                return Err(ChatlineError::MessageNotFound(target));
            };

            state.last_error = None;
            let text = std::mem::take(&mut state.draft);
            state.messages[pos].content = text.clone();
            let conversation = self.ensure_active(&mut state);
            if state.index.replace_content(&conversation, target, &text) {
                self.persist(&mut state);
            }
            state.leave_edit_mode();

            let (request_id, token) = self.begin_request(&mut state, conversation);
            (text, request_id, token)
        };

        self.await_reply(&prompt, request_id, token).await
    }

    /// Leave edit mode without changing anything
    pub fn cancel_edit(&self) {
        self.lock().leave_edit_mode();
    }

    /// Cancel the pending request, if any
    ///
    /// Returns `true` when a request was cancelled. The session is idle
    /// immediately; the awaiting `send` resolves to
    /// [`SendOutcome::Cancelled`].
    pub fn cancel(&self) -> bool {
        match self.lock().pending.take() {
            Some(pending) => {
                tracing::info!("Cancelling request {}", pending.id);
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Empty the in-memory message sequence; stored messages are kept
    pub fn clear_messages(&self) {
        self.lock().messages.clear();
    }

    /// Replace the draft input
    pub fn set_draft(&self, text: &str) {
        self.lock().draft = text.to_string();
    }

    /// Current draft input
    pub fn draft(&self) -> String {
        self.lock().draft.clone()
    }

    /// Start a new, empty conversation and make it active
    ///
    /// Returns the generated label.
    pub fn new_chat(&self) -> String {
        let mut state = self.lock();
        let label = state.index.create_conversation(&label_date());
        tracing::info!("Created conversation {}", label);
        state.active = Some(label.clone());
        state.messages.clear();
        state.leave_edit_mode();
        self.persist(&mut state);
        label
    }

    /// Load a stored conversation and make it active
    ///
    /// # Errors
    ///
    /// Returns `ChatlineError::ConversationNotFound` for an unknown label
    pub fn select_conversation(&self, id: &str) -> ChatResult<()> {
        let mut state = self.lock();
        let messages = state
            .index
            .get(id)
            .map(|c| c.messages.clone())
            .ok_or_else(|| ChatlineError::ConversationNotFound(id.to_string()))?;
        state.messages = messages;
        state.active = Some(id.to_string());
        state.leave_edit_mode();
        tracing::debug!("Selected conversation {}", id);
        Ok(())
    }

    /// Delete a stored conversation
    ///
    /// If it was active, no conversation is active afterwards and the
    /// sequence is empty.
    ///
    /// # Errors
    ///
    /// Returns `ChatlineError::ConversationNotFound` for an unknown label
    pub fn remove_conversation(&self, id: &str) -> ChatResult<()> {
        let mut state = self.lock();
        if state.index.remove(id).is_none() {
            return Err(ChatlineError::ConversationNotFound(id.to_string()));
        }
        if state.active.as_deref() == Some(id) {
            state.active = None;
            state.messages.clear();
            state.leave_edit_mode();
        }
        self.persist(&mut state);
        tracing::info!("Removed conversation {}", id);
        Ok(())
    }

    /// Summaries of all stored conversations, in index order
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        self.lock().index.summaries()
    }

    /// Snapshot of the current message sequence
    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    /// Whether a completion request is in flight
    pub fn is_pending(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Id of the message being edited, if any
    pub fn edit_target(&self) -> Option<MessageId> {
        self.lock().edit_target
    }

    /// Label of the active conversation
    pub fn active_conversation(&self) -> Option<String> {
        self.lock().active.clone()
    }

    /// Most recent surfaced error, cleared by the next send
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Whether mutations are still written to the store
    pub fn is_persistent(&self) -> bool {
        self.lock().persistent
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("SessionController")
            .field("store", &self.store)
            .field("active", &state.active)
            .field("messages", &state.messages.len())
            .field("pending", &state.pending.is_some())
            .field("persistent", &state.persistent)
            .finish_non_exhaustive()
    }
}
