//! Conversation history for one generation session.
//!
//! Messages are append-only and ordered; insertion order is the only ordering
//! key. Compression collapses the history to the system prompt, the first
//! user message, and the latest assistant reply to keep the prompt bounded.

use crate::error::EngineError;
use crate::store::StoredMessage;
use serde::{Deserialize, Serialize};

/// Speaker of a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/// One turn of the conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Ordered message history driving one generation session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Start a fresh history holding only the system prompt.
    pub fn initialize(system_prompt: &str) -> Self {
        Self {
            messages: vec![Message {
                role: Role::System,
                content: system_prompt.to_string(),
            }],
        }
    }

    /// Rebuild a history from persisted records.
    ///
    /// Every record must carry a recognized role and its content; anything
    /// else is `MalformedHistory`.
    pub fn load_from_records(records: &[StoredMessage]) -> Result<Self, EngineError> {
        let mut messages = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let role = Role::parse(&record.role).ok_or_else(|| {
                EngineError::MalformedHistory(format!(
                    "record {index} has unrecognized role '{}'",
                    record.role
                ))
            })?;
            messages.push(Message {
                role,
                content: record.content.clone(),
            });
        }
        Ok(Self { messages })
    }

    /// Append a user message, rejecting content above `max_length` characters.
    pub fn append_user(
        &mut self,
        content: &str,
        max_length: Option<usize>,
    ) -> Result<(), EngineError> {
        if let Some(max) = max_length {
            let len = content.chars().count();
            if len > max {
                return Err(EngineError::MessageTooLong { len, max });
            }
        }
        self.messages.push(Message {
            role: Role::User,
            content: content.to_string(),
        });
        Ok(())
    }

    pub fn append_assistant(&mut self, content: &str) {
        self.messages.push(Message {
            role: Role::Assistant,
            content: content.to_string(),
        });
    }

    /// Collapse the history to `[system, first user, latest assistant]`.
    ///
    /// Requires message 0 to be `system`, message 1 to be `user`, and the
    /// last message to be `assistant`; on failure the history is untouched.
    pub fn compress(&mut self) -> Result<(), EngineError> {
        let shape_ok = self.messages.len() >= 3
            && self.messages[0].role == Role::System
            && self.messages[1].role == Role::User
            && self.messages.last().map(|m| m.role) == Some(Role::Assistant);
        if !shape_ok {
            return Err(EngineError::InvalidHistoryShape(
                "expected system, user, ..., assistant".to_string(),
            ));
        }
        if let Some(last) = self.messages.pop() {
            self.messages.truncate(2);
            self.messages.push(last);
        }
        Ok(())
    }

    /// Content of the final message, which must be an assistant reply.
    pub fn last_assistant_content(&self) -> Result<&str, EngineError> {
        match self.messages.last() {
            Some(message) if message.role == Role::Assistant => Ok(&message.content),
            Some(message) => Err(EngineError::InvalidHistoryShape(format!(
                "last message is from '{}', expected 'assistant'",
                message.role.as_str()
            ))),
            None => Err(EngineError::InvalidHistoryShape(
                "history is empty".to_string(),
            )),
        }
    }

    /// The last `n` messages, verbatim.
    pub fn tail(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Number of user-authored turns in the history.
    pub fn user_turns(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
