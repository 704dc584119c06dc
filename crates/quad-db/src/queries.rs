use crate::models::{
    CandidateRow, ConversationOverviewRow, ConversationRow, FriendProfileRow, FriendRow,
    LastMessageRow, MessageRow, ProfileRow, SwipeResult, UserRow,
};
use crate::{Database, now_utc};
use anyhow::Result;
use quad_types::api::Direction;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

impl Database {
    // -- Users & profiles --

    /// Identity and profile data are owned by external services; the upserts
    /// exist for those services to sync through and for tests to seed with.
    pub fn upsert_user(&self, id: &str, name: Option<&str>, avatar_url: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, avatar_url) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, avatar_url = excluded.avatar_url",
                params![id, name, avatar_url],
            )?;
            Ok(())
        })
    }

    pub fn upsert_profile(&self, profile: &ProfileRow) -> Result<()> {
        let interests = serde_json::to_string(&profile.interests)?;
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO profiles
                    (user_id, display_name, bio, university, major, graduation_year, interests, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(user_id) DO UPDATE SET
                    display_name = excluded.display_name,
                    bio = excluded.bio,
                    university = excluded.university,
                    major = excluded.major,
                    graduation_year = excluded.graduation_year,
                    interests = excluded.interests",
                params![
                    profile.user_id,
                    profile.display_name,
                    profile.bio,
                    profile.university,
                    profile.major,
                    profile.graduation_year,
                    interests,
                    now_utc(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, avatar_url FROM users WHERE id = ?1",
                    [id],
                    map_user,
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Conversations --

    /// Look up the conversation between two users, creating it (with both
    /// participant rows) if none exists. Lookup and creation share one
    /// transaction, so concurrent calls for the same pair cannot produce two
    /// conversations. Returns (id, created).
    pub fn get_or_create_conversation(&self, user_a: &str, user_b: &str) -> Result<(i64, bool)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if let Some(id) = find_pair_conversation(&tx, user_a, user_b)? {
                return Ok((id, false));
            }

            let now = now_utc();
            tx.execute(
                "INSERT INTO conversations (created_at, updated_at) VALUES (?1, ?1)",
                [&now],
            )?;
            let conversation_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO conversation_participants (conversation_id, user_id, last_read)
                 VALUES (?1, ?2, ?3)",
                params![conversation_id, user_a, now],
            )?;
            tx.execute(
                "INSERT INTO conversation_participants (conversation_id, user_id, last_read)
                 VALUES (?1, ?2, ?3)",
                params![conversation_id, user_b, now],
            )?;

            tx.commit()?;
            Ok((conversation_id, true))
        })
    }

    pub fn get_conversation(&self, id: i64) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, created_at, updated_at FROM conversations WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(ConversationRow {
                            id: row.get(0)?,
                            created_at: row.get(1)?,
                            updated_at: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Membership is the authorization predicate for every conversation
    /// operation.
    pub fn is_participant(&self, conversation_id: i64, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: bool = conn.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM conversation_participants
                      WHERE conversation_id = ?1 AND user_id = ?2)",
                params![conversation_id, user_id],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    pub fn other_participant(&self, conversation_id: i64, user_id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT u.id, u.name, u.avatar_url
                       FROM conversation_participants p
                       JOIN users u ON u.id = p.user_id
                      WHERE p.conversation_id = ?1 AND p.user_id != ?2",
                    params![conversation_id, user_id],
                    map_user,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Sidebar query: every conversation the user participates in, most
    /// recently active first, with the other participant, the latest message
    /// and the count of messages newer than the caller's last_read.
    pub fn list_conversations_for_user(&self, user_id: &str) -> Result<Vec<ConversationOverviewRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.created_at, c.updated_at,
                        u.id, u.name, u.avatar_url,
                        m.id, m.sender_id, m.content, m.created_at,
                        (SELECT COUNT(*) FROM messages mm
                          WHERE mm.conversation_id = c.id
                            AND mm.sender_id != ?1
                            AND mm.created_at > me.last_read)
                   FROM conversations c
                   JOIN conversation_participants me
                     ON me.conversation_id = c.id AND me.user_id = ?1
                   JOIN conversation_participants other
                     ON other.conversation_id = c.id AND other.user_id != ?1
                   JOIN users u ON u.id = other.user_id
                   LEFT JOIN messages m
                     ON m.id = (SELECT MAX(id) FROM messages WHERE conversation_id = c.id)
                  ORDER BY c.updated_at DESC, c.id DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    let last_message = match row.get::<_, Option<i64>>(6)? {
                        Some(id) => Some(LastMessageRow {
                            id,
                            sender_id: row.get(7)?,
                            content: row.get(8)?,
                            created_at: row.get(9)?,
                        }),
                        None => None,
                    };
                    Ok(ConversationOverviewRow {
                        conversation: ConversationRow {
                            id: row.get(0)?,
                            created_at: row.get(1)?,
                            updated_at: row.get(2)?,
                        },
                        other_user: UserRow {
                            id: row.get(3)?,
                            name: row.get(4)?,
                            avatar_url: row.get(5)?,
                        },
                        last_message,
                        unread_count: row.get(10)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn mark_read(&self, conversation_id: i64, user_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE conversation_participants SET last_read = ?1
                  WHERE conversation_id = ?2 AND user_id = ?3",
                params![now_utc(), conversation_id, user_id],
            )?;
            Ok(())
        })
    }

    // -- Messages --

    /// Persist a message and bump the conversation's freshness in one
    /// transaction; the conversation's updated_at is set to the message's own
    /// created_at so the two can never drift.
    pub fn insert_message(
        &self,
        conversation_id: i64,
        sender_id: &str,
        content: &str,
    ) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = now_utc();

            tx.execute(
                "INSERT INTO messages (conversation_id, sender_id, content, status, created_at)
                 VALUES (?1, ?2, ?3, 'sent', ?4)",
                params![conversation_id, sender_id, content, now],
            )?;
            let id = tx.last_insert_rowid();

            tx.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![now, conversation_id],
            )?;

            let sender_avatar_url: Option<String> = tx.query_row(
                "SELECT avatar_url FROM users WHERE id = ?1",
                [sender_id],
                |row| row.get(0),
            )?;

            tx.commit()?;
            Ok(MessageRow {
                id,
                conversation_id,
                sender_id: sender_id.to_string(),
                sender_avatar_url,
                content: content.to_string(),
                status: "sent".to_string(),
                created_at: now,
            })
        })
    }

    /// One page of messages, ascending by id for display. `before` pages
    /// backwards: only ids strictly below the cursor are considered, and the
    /// newest `limit` of those are returned.
    pub fn get_messages(
        &self,
        conversation_id: i64,
        limit: u32,
        before: Option<i64>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.conversation_id, m.sender_id, u.avatar_url,
                        m.content, m.status, m.created_at
                   FROM messages m
                   LEFT JOIN users u ON u.id = m.sender_id
                  WHERE m.conversation_id = ?1
                    AND (?3 IS NULL OR m.id < ?3)
                  ORDER BY m.id DESC
                  LIMIT ?2",
            )?;

            let mut rows = stmt
                .query_map(params![conversation_id, limit, before], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        conversation_id: row.get(1)?,
                        sender_id: row.get(2)?,
                        sender_avatar_url: row.get(3)?,
                        content: row.get(4)?,
                        status: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.reverse();
            Ok(rows)
        })
    }

    // -- Matching --

    /// Record a swipe and run the reciprocity check. The duplicate check, the
    /// swipe insert, the reciprocal lookup and the paired friend-link inserts
    /// all share one transaction on the single writer connection, so two
    /// users swiping right on each other near-simultaneously serialize and
    /// exactly one of them observes the match.
    pub fn record_swipe(
        &self,
        swiper_id: &str,
        swiped_id: &str,
        direction: Direction,
    ) -> Result<SwipeResult> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let already_swiped: bool = tx.query_row(
                "SELECT EXISTS(
                     SELECT 1 FROM swipes WHERE swiper_id = ?1 AND swiped_id = ?2)",
                params![swiper_id, swiped_id],
                |row| row.get(0),
            )?;
            if already_swiped {
                return Ok(SwipeResult::Duplicate);
            }

            let now = now_utc();
            tx.execute(
                "INSERT INTO swipes (swiper_id, swiped_id, direction, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![swiper_id, swiped_id, direction.as_str(), now],
            )?;

            if direction == Direction::Right {
                let reciprocal: bool = tx.query_row(
                    "SELECT EXISTS(
                         SELECT 1 FROM swipes
                          WHERE swiper_id = ?1 AND swiped_id = ?2 AND direction = 'right')",
                    params![swiped_id, swiper_id],
                    |row| row.get(0),
                )?;

                if reciprocal {
                    // Friend links are written in pairs or not at all.
                    tx.execute(
                        "INSERT INTO friend_requests (sender_id, receiver_id, status, created_at)
                         VALUES (?1, ?2, 'accepted', ?3)",
                        params![swiper_id, swiped_id, now],
                    )?;
                    tx.execute(
                        "INSERT INTO friend_requests (sender_id, receiver_id, status, created_at)
                         VALUES (?1, ?2, 'accepted', ?3)",
                        params![swiped_id, swiper_id, now],
                    )?;
                    tx.commit()?;
                    return Ok(SwipeResult::Matched);
                }
            }

            tx.commit()?;
            Ok(SwipeResult::NoMatch)
        })
    }

    /// Any user the caller has not swiped on yet, joined with their profile
    /// when one exists. Selection is unordered; successive calls may return
    /// different candidates for the same unswiped set.
    pub fn next_candidate(&self, user_id: &str) -> Result<Option<CandidateRow>> {
        let raw = self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT u.id, u.name, u.avatar_url,
                            p.display_name, p.bio, p.university, p.major,
                            p.graduation_year, p.interests
                       FROM users u
                       LEFT JOIN profiles p ON p.user_id = u.id
                      WHERE u.id != ?1
                        AND u.id NOT IN (SELECT swiped_id FROM swipes WHERE swiper_id = ?1)
                      LIMIT 1",
                    [user_id],
                    |row| {
                        Ok((
                            UserRow {
                                id: row.get(0)?,
                                name: row.get(1)?,
                                avatar_url: row.get(2)?,
                            },
                            row.get::<_, Option<String>>(3)?,
                            row.get::<_, Option<String>>(4)?,
                            row.get::<_, Option<String>>(5)?,
                            row.get::<_, Option<String>>(6)?,
                            row.get::<_, Option<i32>>(7)?,
                            row.get::<_, Option<String>>(8)?,
                        ))
                    },
                )
                .optional()?;
            Ok(row)
        })?;

        let Some((user, display_name, bio, university, major, graduation_year, interests)) = raw
        else {
            return Ok(None);
        };

        // display_name is NOT NULL in profiles, so its absence means the LEFT
        // JOIN found no profile row.
        let profile = match (display_name, university, major, graduation_year) {
            (Some(display_name), Some(university), Some(major), Some(graduation_year)) => {
                Some(ProfileRow {
                    user_id: user.id.clone(),
                    display_name,
                    bio,
                    university,
                    major,
                    graduation_year,
                    interests: parse_interests(interests.as_deref()),
                })
            }
            _ => None,
        };

        Ok(Some(CandidateRow { user, profile }))
    }

    /// Friend set derived from accepted friend links in either direction.
    /// Matches write paired rows, so DISTINCT keeps each friend to one entry.
    pub fn friends_of(&self, user_id: &str) -> Result<Vec<FriendRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT u.id, u.name, u.avatar_url,
                        p.bio, p.major, p.graduation_year
                   FROM friend_requests fr
                   JOIN users u ON u.id = CASE WHEN fr.sender_id = ?1
                                               THEN fr.receiver_id
                                               ELSE fr.sender_id END
                   LEFT JOIN profiles p ON p.user_id = u.id
                  WHERE fr.status = 'accepted'
                    AND (fr.sender_id = ?1 OR fr.receiver_id = ?1)
                  ORDER BY u.id",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    let major: Option<String> = row.get(4)?;
                    let profile = match major {
                        Some(major) => Some(FriendProfileRow {
                            bio: row.get(3)?,
                            major,
                            graduation_year: row.get(5)?,
                        }),
                        None => None,
                    };
                    Ok(FriendRow {
                        user: UserRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            avatar_url: row.get(2)?,
                        },
                        profile,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn map_user(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        avatar_url: row.get(2)?,
    })
}

/// Two-sided pair lookup: both users must participate and the participant
/// set must be exactly the pair. A one-sided lookup would match any
/// conversation containing just one of them.
fn find_pair_conversation(conn: &Connection, user_a: &str, user_b: &str) -> Result<Option<i64>> {
    let mut stmt = conn.prepare(
        "SELECT a.conversation_id
           FROM conversation_participants a
           JOIN conversation_participants b ON b.conversation_id = a.conversation_id
          WHERE a.user_id = ?1
            AND b.user_id = ?2
            AND (SELECT COUNT(*) FROM conversation_participants c
                  WHERE c.conversation_id = a.conversation_id) = 2",
    )?;

    let id = stmt
        .query_row(params![user_a, user_b], |row| row.get(0))
        .optional()?;

    Ok(id)
}

fn parse_interests(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt interests payload '{}': {}", raw, e);
        Vec::new()
    })
}
