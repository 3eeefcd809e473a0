//! Assistant conversation kept on the client.

use chrono::{DateTime, Utc};
use reqwest::Method;
use shared::models::{
    ChatMessage, ChatReply, ChatRequest, ChatRole, ChatSessionSummary, StoredChatMessage,
};
use tracing::{debug, info, warn};

use crate::{
    authorizer::RequestAuthorizer,
    error::{ClientError, ClientResult},
};

/// First assistant message of every conversation.
pub const GREETING: &str = "Hi! I'm your AI car assistant. Ask me for recommendations, \
specifications or comparisons between cars.";

/// Transcript plus the last error, seeded with [`GREETING`].
///
/// Once the backend assigns a conversation id, later messages are sent under
/// it so the server keeps them together.
#[derive(Debug)]
pub struct ChatSession {
    authorizer: RequestAuthorizer,
    messages: Vec<ChatMessage>,
    error: Option<String>,
    next_id: u64,
    session_id: Option<i64>,
}

impl ChatSession {
    /// Fresh conversation holding only the greeting.
    #[must_use]
    pub fn new(authorizer: RequestAuthorizer) -> Self {
        let mut session = Self {
            authorizer,
            messages: Vec::new(),
            error: None,
            next_id: 1,
            session_id: None,
        };
        session.reset();
        session
    }

    /// Transcript, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Reason the last send failed, cleared by the next send.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Server-side conversation the transcript belongs to, once known.
    #[must_use]
    pub const fn session_id(&self) -> Option<i64> {
        self.session_id
    }

    fn push(&mut self, role: ChatRole, content: String) -> &ChatMessage {
        self.push_at(role, content, Utc::now())
    }

    fn push_at(
        &mut self,
        role: ChatRole,
        content: String,
        timestamp: DateTime<Utc>,
    ) -> &ChatMessage {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            role,
            content,
            timestamp,
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Appends `message`, asks the assistant, and appends its reply.
    ///
    /// On failure the user message stays in the transcript and the reason is
    /// kept in [`ChatSession::error`].
    ///
    /// # Errors
    /// [`ClientError::InvalidInput`] for a blank message, else any
    /// [`ClientError`] from the authorized call.
    pub async fn send(&mut self, message: &str) -> ClientResult<&ChatMessage> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ClientError::InvalidInput("message is empty".to_string()));
        }

        self.error = None;
        self.push(ChatRole::User, message.to_string());
        let request = ChatRequest {
            message: message.to_string(),
            session_id: self.session_id,
        };

        let outcome: ClientResult<ChatReply> = self
            .authorizer
            .send_json(Method::POST, "/chat/", &request)
            .await;
        match outcome {
            Ok(reply) => {
                debug!(chars = reply.response.len(), "assistant replied");
                if reply.session_id.is_some() {
                    self.session_id = reply.session_id;
                }
                Ok(self.push(ChatRole::Assistant, reply.response))
            }
            Err(err) => {
                let err = err.with_fallback("Failed to send message");
                warn!(error = %err, "chat message failed");
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Conversations stored for the signed-in user.
    ///
    /// # Errors
    /// Any [`ClientError`] from the authorized call.
    pub async fn sessions(&self) -> ClientResult<Vec<ChatSessionSummary>> {
        self.authorizer.get_json("/chat/sessions").await
    }

    /// Replaces the transcript with stored conversation `id` and continues it.
    ///
    /// On failure the current transcript is kept.
    ///
    /// # Errors
    /// Any [`ClientError`] from the authorized call; an unknown id arrives as
    /// `Rejected` with "Session not found".
    pub async fn resume(&mut self, id: i64) -> ClientResult<()> {
        let history: Vec<StoredChatMessage> = self
            .authorizer
            .get_json(&format!("/chat/sessions/{id}/messages"))
            .await
            .map_err(|err| err.with_fallback("Failed to load conversation"))?;

        self.reset();
        for message in history {
            let timestamp = message.timestamp.unwrap_or_else(Utc::now);
            self.push_at(message.role, message.content, timestamp);
        }
        self.session_id = Some(id);
        info!(
            session_id = id,
            messages = self.messages.len() - 1,
            "conversation resumed"
        );
        Ok(())
    }

    /// Back to a transcript holding only the greeting, detached from any
    /// stored conversation.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.error = None;
        self.next_id = 1;
        self.session_id = None;
        self.push(ChatRole::Assistant, GREETING.to_string());
    }
}
