//! Generation Capability Abstraction Layer
//!
//! This module provides a common interface for the text-generation capability
//! the engine depends on. The Generator trait defines the contract, enabling
//! the reformulator and the answer synthesizer to work against any
//! OpenAI-compatible backend (or a scripted fake in tests) transparently.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod openai;

/// Result type for generation operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during generation operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message
    Assistant,

    /// System message
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Generation capability trait
///
/// A single uniform "generate text from instructions + context" operation.
/// Both query reformulation and answer synthesis go through this interface;
/// a failure here is a turn-level failure and is never swallowed.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the name of the backing provider (e.g., "openai")
    fn name(&self) -> &str;

    /// Generate a completion for the given messages
    ///
    /// # Arguments
    /// * `messages` - System instructions, prior context, and the user prompt
    ///
    /// # Returns
    /// * `Ok(String)` - The generated text
    /// * `Err(LLMError)` - If the request fails
    async fn generate(&self, messages: &[Message]) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let user_msg = Message::user("Bonjour");
        assert_eq!(user_msg.role, MessageRole::User);
        assert_eq!(user_msg.content, "Bonjour");

        let assistant_msg = Message::assistant("Bonjour, comment puis-je vous aider ?");
        assert_eq!(assistant_msg.role, MessageRole::Assistant);

        let system_msg = Message::system("Tu es un assistant juridique");
        assert_eq!(system_msg.role, MessageRole::System);
    }

    #[test]
    fn test_role_display_is_lowercase() {
        assert_eq!(MessageRole::User.to_string(), "user");
        assert_eq!(MessageRole::Assistant.to_string(), "assistant");
        assert_eq!(MessageRole::System.to_string(), "system");
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::user("test");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""role":"user""#));
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, deserialized);
    }
}
