use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- JWT Claims --

/// JWT claims shared across quad-api (REST middleware) and quad-gateway
/// (WebSocket authentication). Tokens are issued by the external identity
/// service; this core only verifies them. Canonical definition lives here in
/// quad-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, owned by the identity service.
    pub sub: String,
    pub name: String,
    pub exp: usize,
}

// -- Users & profiles (read-side views of externally owned data) --

/// Public identity info: id, display name, avatar reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Full profile card shown on a swipe candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCard {
    pub display_name: String,
    pub bio: Option<String>,
    pub university: String,
    pub major: String,
    pub graduation_year: i32,
    pub interests: Vec<String>,
}

/// Profile subset returned with a friend entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendProfile {
    pub bio: Option<String>,
    pub major: String,
    pub graduation_year: i32,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateConversationRequest {
    pub other_user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateConversationResponse {
    pub conversation_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry in the conversation sidebar: the conversation, the other
/// participant, the latest message if any, and how many messages the caller
/// has not read yet.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation: ConversationMeta,
    pub other_user: UserPublic,
    pub last_message: Option<MessagePreview>,
    pub unread_count: i64,
}

/// Trimmed message used in conversation listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePreview {
    pub id: i64,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The other participant of a conversation, for the chat header.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationPeer {
    pub conversation_id: i64,
    pub user: UserPublic,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            _ => None,
        }
    }
}

/// A persisted message, enriched with the sender's avatar reference
/// (read-side join, not a stored denormalization).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: String,
    pub sender_avatar_url: Option<String>,
    pub content: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypingRequest {
    pub is_typing: bool,
}

// -- Matching --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwipeRequest {
    pub swiped_user_id: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum SwipeResponse {
    #[serde(rename = "MATCH")]
    Match { matched_user_id: String },
    #[serde(rename = "NO_MATCH")]
    NoMatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub user: UserPublic,
    pub profile: Option<ProfileCard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum NextCandidateResponse {
    #[serde(rename = "SUCCESS")]
    Success { candidate: Candidate },
    #[serde(rename = "NO_MORE_CANDIDATES")]
    NoMoreCandidates,
}

// -- Friends --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendEntry {
    pub user: UserPublic,
    pub profile: Option<FriendProfile>,
}
