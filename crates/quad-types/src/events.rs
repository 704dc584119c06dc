use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::api::MessageResponse;

/// A named realtime channel, scoped to one conversation.
///
/// Topic names are derived deterministically from the conversation id:
/// `chat-{id}` carries new-message events, `chat-{id}-typing` carries typing
/// indicators. Clients subscribe by name over the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Chat(i64),
    Typing(i64),
}

impl Topic {
    pub fn chat(conversation_id: i64) -> Self {
        Self::Chat(conversation_id)
    }

    pub fn typing(conversation_id: i64) -> Self {
        Self::Typing(conversation_id)
    }

    pub fn conversation_id(self) -> i64 {
        match self {
            Self::Chat(id) | Self::Typing(id) => id,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chat(id) => write!(f, "chat-{id}"),
            Self::Typing(id) => write!(f, "chat-{id}-typing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTopic(pub String);

impl fmt::Display for InvalidTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid topic name: {}", self.0)
    }
}

impl std::error::Error for InvalidTopic {}

impl FromStr for Topic {
    type Err = InvalidTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("chat-").ok_or_else(|| InvalidTopic(s.to_string()))?;
        if let Some(id) = rest.strip_suffix("-typing") {
            let id = id.parse().map_err(|_| InvalidTopic(s.to_string()))?;
            return Ok(Self::Typing(id));
        }
        let id = rest.parse().map_err(|_| InvalidTopic(s.to_string()))?;
        Ok(Self::Chat(id))
    }
}

/// Events pushed over the WebSocket gateway.
///
/// Pushed payloads are a signal to refetch, not an authoritative feed;
/// consumers fall back to getMessages for correctness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChatEvent {
    /// Server confirms successful authentication
    #[serde(rename = "ready")]
    Ready { user_id: String },

    /// A new message was persisted in a conversation
    #[serde(rename = "new-message")]
    NewMessage { message: MessageResponse },

    /// A participant started or stopped typing
    #[serde(rename = "typing-status")]
    TypingStatus {
        conversation_id: i64,
        user_id: String,
        is_typing: bool,
    },
}

impl ChatEvent {
    /// Returns the topic this event is scoped to. Events that return `None`
    /// are connection-local and are never broadcast.
    pub fn topic(&self) -> Option<Topic> {
        match self {
            Self::Ready { .. } => None,
            Self::NewMessage { message } => Some(Topic::Chat(message.conversation_id)),
            Self::TypingStatus { conversation_id, .. } => Some(Topic::Typing(*conversation_id)),
        }
    }
}

/// Commands sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    #[serde(rename = "identify")]
    Identify { token: String },

    /// Subscribe to topics by name. Unknown names are ignored.
    #[serde(rename = "subscribe")]
    Subscribe { topics: Vec<String> },

    /// Unsubscribe from topics by name. Idempotent; unsubscribing from a
    /// topic that was never subscribed is a no-op.
    #[serde(rename = "unsubscribe")]
    Unsubscribe { topics: Vec<String> },
}
