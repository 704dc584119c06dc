//! Row types returned by the query layer, one field per SQLite column.
//! Kept separate from the quad-types API models: timestamps stay as stored
//! strings here and are parsed at the service boundary.

use quad_types::api::{Candidate, FriendEntry, FriendProfile, ProfileCard, UserPublic};

pub struct UserRow {
    pub id: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

pub struct ProfileRow {
    pub user_id: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub university: String,
    pub major: String,
    pub graduation_year: i32,
    pub interests: Vec<String>,
}

pub struct ConversationRow {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: String,
    pub sender_avatar_url: Option<String>,
    pub content: String,
    pub status: String,
    pub created_at: String,
}

/// Latest message shown in a conversation listing.
pub struct LastMessageRow {
    pub id: i64,
    pub sender_id: String,
    pub content: String,
    pub created_at: String,
}

/// One row of the conversation sidebar query: the conversation, the other
/// participant, the latest message if any, and the caller's unread count.
pub struct ConversationOverviewRow {
    pub conversation: ConversationRow,
    pub other_user: UserRow,
    pub last_message: Option<LastMessageRow>,
    pub unread_count: i64,
}

pub struct CandidateRow {
    pub user: UserRow,
    pub profile: Option<ProfileRow>,
}

pub struct FriendProfileRow {
    pub bio: Option<String>,
    pub major: String,
    pub graduation_year: i32,
}

pub struct FriendRow {
    pub user: UserRow,
    pub profile: Option<FriendProfileRow>,
}

impl From<UserRow> for UserPublic {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            avatar_url: row.avatar_url,
        }
    }
}

impl From<ProfileRow> for ProfileCard {
    fn from(row: ProfileRow) -> Self {
        Self {
            display_name: row.display_name,
            bio: row.bio,
            university: row.university,
            major: row.major,
            graduation_year: row.graduation_year,
            interests: row.interests,
        }
    }
}

impl From<FriendProfileRow> for FriendProfile {
    fn from(row: FriendProfileRow) -> Self {
        Self {
            bio: row.bio,
            major: row.major,
            graduation_year: row.graduation_year,
        }
    }
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        Self {
            user: row.user.into(),
            profile: row.profile.map(Into::into),
        }
    }
}

impl From<FriendRow> for FriendEntry {
    fn from(row: FriendRow) -> Self {
        Self {
            user: row.user.into(),
            profile: row.profile.map(Into::into),
        }
    }
}

/// Outcome of recording a swipe inside the reciprocity transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeResult {
    /// The reciprocal right-swipe existed; two accepted friend links were
    /// written in the same transaction.
    Matched,
    NoMatch,
    /// The swiper already has a recorded decision for this target; nothing
    /// was written.
    Duplicate,
}
