/// Integration tests for the matching store: swipe recording, reciprocity,
/// the paired friend links a match materializes, and candidate selection.

use quad_db::Database;
use quad_db::models::{ProfileRow, SwipeResult};
use quad_types::api::Direction;

fn test_db() -> Database {
    Database::open_in_memory().unwrap()
}

fn seed_user(db: &Database, id: &str, name: &str) {
    db.upsert_user(id, Some(name), None).unwrap();
}

fn seed_profile(db: &Database, user_id: &str, major: &str) {
    db.upsert_profile(&ProfileRow {
        user_id: user_id.to_string(),
        display_name: format!("{user_id} the student"),
        bio: Some("hello".to_string()),
        university: "State University".to_string(),
        major: major.to_string(),
        graduation_year: 2027,
        interests: vec!["climbing".to_string(), "chess".to_string()],
    })
    .unwrap();
}

#[test]
fn mutual_right_swipe_creates_paired_links() {
    let db = test_db();
    seed_user(&db, "alice", "Alice");
    seed_user(&db, "bob", "Bob");

    let first = db.record_swipe("alice", "bob", Direction::Right).unwrap();
    assert_eq!(first, SwipeResult::NoMatch);

    let second = db.record_swipe("bob", "alice", Direction::Right).unwrap();
    assert_eq!(second, SwipeResult::Matched);

    // The friend link is symmetric: two accepted rows, one per direction.
    let (accepted, total) = db
        .with_conn(|conn| {
            let accepted: i64 = conn.query_row(
                "SELECT COUNT(*) FROM friend_requests WHERE status = 'accepted'",
                [],
                |row| row.get(0),
            )?;
            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM friend_requests", [], |row| row.get(0))?;
            Ok((accepted, total))
        })
        .unwrap();
    assert_eq!(accepted, 2);
    assert_eq!(total, 2);

    let alice_friends = db.friends_of("alice").unwrap();
    let bob_friends = db.friends_of("bob").unwrap();
    assert_eq!(alice_friends.len(), 1);
    assert_eq!(bob_friends.len(), 1);
    assert_eq!(alice_friends[0].user.id, "bob");
    assert_eq!(bob_friends[0].user.id, "alice");
}

#[test]
fn left_swipe_never_matches() {
    let db = test_db();
    seed_user(&db, "alice", "Alice");
    seed_user(&db, "bob", "Bob");

    assert_eq!(
        db.record_swipe("alice", "bob", Direction::Right).unwrap(),
        SwipeResult::NoMatch
    );
    assert_eq!(
        db.record_swipe("bob", "alice", Direction::Left).unwrap(),
        SwipeResult::NoMatch
    );

    assert!(db.friends_of("alice").unwrap().is_empty());
    assert!(db.friends_of("bob").unwrap().is_empty());
}

#[test]
fn repeat_swipe_is_flagged_and_not_written() {
    let db = test_db();
    seed_user(&db, "alice", "Alice");
    seed_user(&db, "bob", "Bob");

    assert_eq!(
        db.record_swipe("alice", "bob", Direction::Left).unwrap(),
        SwipeResult::NoMatch
    );
    // Changing direction does not sneak past the duplicate check.
    assert_eq!(
        db.record_swipe("alice", "bob", Direction::Right).unwrap(),
        SwipeResult::Duplicate
    );

    let swipes: i64 = db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM swipes WHERE swiper_id = 'alice'",
                [],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(swipes, 1);

    // A duplicate right swipe must not complete a match either.
    assert!(db.friends_of("alice").unwrap().is_empty());
}

#[test]
fn candidates_exclude_self_and_swiped() {
    let db = test_db();
    seed_user(&db, "alice", "Alice");
    seed_user(&db, "bob", "Bob");
    seed_user(&db, "carol", "Carol");

    let first = db.next_candidate("alice").unwrap().unwrap();
    assert_ne!(first.user.id, "alice", "never offer the requester themselves");

    // Swiped users drop out regardless of direction.
    db.record_swipe("alice", "bob", Direction::Left).unwrap();
    let second = db.next_candidate("alice").unwrap().unwrap();
    assert_eq!(second.user.id, "carol");

    db.record_swipe("alice", "carol", Direction::Right).unwrap();
    assert!(db.next_candidate("alice").unwrap().is_none(), "pool exhausted");

    // Being swiped on by someone else does not shrink one's own pool.
    let bob_candidate = db.next_candidate("bob").unwrap().unwrap();
    assert!(bob_candidate.user.id == "alice" || bob_candidate.user.id == "carol");
}

#[test]
fn candidate_carries_profile_card() {
    let db = test_db();
    seed_user(&db, "alice", "Alice");
    seed_user(&db, "bob", "Bob");
    seed_profile(&db, "bob", "Physics");

    let candidate = db.next_candidate("alice").unwrap().unwrap();
    assert_eq!(candidate.user.id, "bob");
    let profile = candidate.profile.expect("profile row should be joined in");
    assert_eq!(profile.display_name, "bob the student");
    assert_eq!(profile.university, "State University");
    assert_eq!(profile.major, "Physics");
    assert_eq!(profile.graduation_year, 2027);
    assert_eq!(profile.interests, vec!["climbing", "chess"]);

    // A user without a profile row still shows up, just bare.
    let bob_sees = db.next_candidate("bob").unwrap().unwrap();
    assert_eq!(bob_sees.user.id, "alice");
    assert!(bob_sees.profile.is_none());
}

#[test]
fn friends_listed_once_with_profile_subset() {
    let db = test_db();
    seed_user(&db, "alice", "Alice");
    seed_user(&db, "bob", "Bob");
    seed_user(&db, "carol", "Carol");
    seed_profile(&db, "bob", "Physics");

    db.record_swipe("alice", "bob", Direction::Right).unwrap();
    db.record_swipe("bob", "alice", Direction::Right).unwrap();
    db.record_swipe("carol", "alice", Direction::Right).unwrap();
    db.record_swipe("alice", "carol", Direction::Right).unwrap();

    let friends = db.friends_of("alice").unwrap();
    assert_eq!(friends.len(), 2, "each friend appears exactly once");

    let bob = friends.iter().find(|f| f.user.id == "bob").unwrap();
    let profile = bob.profile.as_ref().expect("bob has a profile");
    assert_eq!(profile.major, "Physics");
    assert_eq!(profile.graduation_year, 2027);
    assert_eq!(profile.bio.as_deref(), Some("hello"));

    let carol = friends.iter().find(|f| f.user.id == "carol").unwrap();
    assert!(carol.profile.is_none());
}
