//! Error taxonomy for the generation engine.
//!
//! Policy violations are deliberately absent here: a violating script is a
//! normal checker result that triggers a correction cycle, not an error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Bad configuration supplied by the caller (file contents, caps, paths).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Sampling temperature outside the accepted [0.0, 1.0] range.
    #[error("temperature must be between 0.0 and 1.0, got {0}")]
    InvalidTemperature(f64),

    /// The conversation already carries more user turns than the session allows.
    #[error("user message limit of {max} reached")]
    TooManyUserTurns { max: u32 },

    /// A user message exceeded the configured content length.
    #[error("message is {len} characters, limit is {max}")]
    MessageTooLong { len: usize, max: usize },

    /// Stored records could not be turned back into a conversation.
    #[error("malformed history: {0}")]
    MalformedHistory(String),

    /// The history does not have the system/user/.../assistant shape.
    #[error("message order is invalid: {0}")]
    InvalidHistoryShape(String),

    /// The model reply contained no extractable fenced code block.
    #[error("no fenced code block found in the model reply")]
    NoCodeBlockFound,

    /// No stored conversation exists for the given user id.
    #[error("no conversation found for user id '{0}'")]
    UnknownSession(String),

    /// Transport, status, or decode failure from the chat-completions API.
    #[error("model API error: {0}")]
    ModelApi(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}
