//! Store invariants: uniqueness, idempotency, and the unread predicate.

use chrono::{Duration, Utc};
use uuid::Uuid;

use sanctuary_db::models::{KeywordRow, ListRow, MessageRow, SubscriberRow};
use sanctuary_db::{migrations, Database};

fn subscriber(phone: &str) -> SubscriberRow {
    SubscriberRow {
        id: Uuid::new_v4().to_string(),
        phone_number: phone.to_string(),
        is_active: true,
        joined_at: Utc::now().to_rfc3339(),
        last_read_at: None,
        joined_via_keyword: None,
        notifier_thread_ref: None,
    }
}

fn message(phone: &str, direction: &str, created_at: &str) -> MessageRow {
    MessageRow {
        id: Uuid::new_v4().to_string(),
        phone_number: phone.to_string(),
        content: "hello".to_string(),
        direction: direction.to_string(),
        created_at: created_at.to_string(),
        broadcast_id: None,
        provider_message_id: None,
        delivery_status: None,
    }
}

#[test]
fn migrations_are_idempotent() {
    let db = Database::open_in_memory().unwrap();
    // A second run against the same connection is a no-op.
    db.with_conn(|conn| migrations::run(conn)).unwrap();
}

#[test]
fn phone_number_collision_reactivates_instead_of_failing() {
    let db = Database::open_in_memory().unwrap();

    let first = db.insert_subscriber(&subscriber("+15551234567")).unwrap();
    db.deactivate_subscriber(&first.id).unwrap();

    // A racing second insert for the same phone keeps the original row.
    let mut second = subscriber("+15551234567");
    second.joined_via_keyword = Some("TRIBE".to_string());
    let resolved = db.insert_subscriber(&second).unwrap();

    assert_eq!(resolved.id, first.id);
    assert!(resolved.is_active);
    assert_eq!(resolved.joined_via_keyword.as_deref(), Some("TRIBE"));
}

#[test]
fn membership_insert_is_idempotent() {
    let db = Database::open_in_memory().unwrap();
    let s = db.insert_subscriber(&subscriber("+15551234567")).unwrap();
    db.insert_list(&ListRow {
        id: "l1".to_string(),
        name: "General".to_string(),
        description: None,
        created_at: Utc::now().to_rfc3339(),
    })
    .unwrap();

    let now = Utc::now().to_rfc3339();
    assert!(db.insert_membership(&s.id, "l1", "manual", &now).unwrap());
    assert!(!db.insert_membership(&s.id, "l1", "bulk-import", &now).unwrap());

    let members = db.members_of_list("l1").unwrap();
    assert_eq!(members.len(), 1);
    // The original provenance survives the no-op re-insert.
    assert_eq!(members[0].joined_via, "manual");
}

#[test]
fn provider_message_id_is_unique() {
    let db = Database::open_in_memory().unwrap();

    let mut first = message("+15551234567", "OUTBOUND", &Utc::now().to_rfc3339());
    first.provider_message_id = Some("SM1".to_string());
    first.delivery_status = Some("SENT".to_string());
    db.insert_message(&first).unwrap();

    let mut dup = message("+15559990000", "OUTBOUND", &Utc::now().to_rfc3339());
    dup.provider_message_id = Some("SM1".to_string());
    assert!(db.insert_message(&dup).is_err());

    // NULL provider ids never collide.
    db.insert_message(&message("+15551234567", "INBOUND", &Utc::now().to_rfc3339()))
        .unwrap();
    db.insert_message(&message("+15551234567", "INBOUND", &Utc::now().to_rfc3339()))
        .unwrap();
}

#[test]
fn unread_predicate_follows_the_watermark() {
    let db = Database::open_in_memory().unwrap();
    let s = db.insert_subscriber(&subscriber("+15551234567")).unwrap();

    let earlier = (Utc::now() - Duration::minutes(5)).to_rfc3339();
    db.insert_message(&message("+15551234567", "INBOUND", &earlier))
        .unwrap();

    // No watermark: unread.
    assert_eq!(db.unread_count().unwrap(), 1);

    // Watermark after the message: read.
    let now = Utc::now().to_rfc3339();
    db.set_last_read_at(&s.id, Some(&now)).unwrap();
    assert_eq!(db.unread_count().unwrap(), 0);

    // New message after the watermark: unread again.
    let later = (Utc::now() + Duration::seconds(1)).to_rfc3339();
    db.insert_message(&message("+15551234567", "INBOUND", &later))
        .unwrap();
    assert_eq!(db.unread_count().unwrap(), 1);

    // Clearing the watermark keeps it unread.
    db.set_last_read_at(&s.id, None).unwrap();
    assert_eq!(db.unread_count().unwrap(), 1);

    // Outbound traffic never counts toward unread.
    db.mark_all_read(&(Utc::now() + Duration::seconds(2)).to_rfc3339())
        .unwrap();
    db.insert_message(&message(
        "+15551234567",
        "OUTBOUND",
        &(Utc::now() + Duration::seconds(3)).to_rfc3339(),
    ))
    .unwrap();
    assert_eq!(db.unread_count().unwrap(), 0);
}

#[test]
fn conversations_filter_and_search() {
    let db = Database::open_in_memory().unwrap();
    let a = db.insert_subscriber(&subscriber("+15550000001")).unwrap();
    let b = db.insert_subscriber(&subscriber("+15550000002")).unwrap();
    // No messages for this one: not a conversation.
    db.insert_subscriber(&subscriber("+15550000003")).unwrap();

    let now = Utc::now().to_rfc3339();
    db.insert_message(&message("+15550000001", "INBOUND", &now))
        .unwrap();
    db.insert_message(&message("+15550000002", "INBOUND", &now))
        .unwrap();

    db.set_last_read_at(&b.id, Some(&(Utc::now() + Duration::seconds(1)).to_rfc3339()))
        .unwrap();

    let all = db.conversations(None, None, 50, 0).unwrap();
    assert_eq!(all.len(), 2);

    let unread = db.conversations(Some(true), None, 50, 0).unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].subscriber_id, a.id);
    assert!(unread[0].has_unread);

    let read = db.conversations(Some(false), None, 50, 0).unwrap();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].subscriber_id, b.id);

    let searched = db.conversations(None, Some("0000002"), 50, 0).unwrap();
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].phone_number, "+15550000002");

    assert_eq!(db.conversation_count().unwrap(), 2);
}

#[test]
fn thread_ref_is_first_write_wins() {
    let db = Database::open_in_memory().unwrap();
    let s = db.insert_subscriber(&subscriber("+15551234567")).unwrap();

    assert!(db.set_thread_ref_if_unset(&s.id, "thread-1").unwrap());
    assert!(!db.set_thread_ref_if_unset(&s.id, "thread-2").unwrap());

    let row = db.find_subscriber_by_id(&s.id).unwrap().unwrap();
    assert_eq!(row.notifier_thread_ref.as_deref(), Some("thread-1"));
}

#[test]
fn keyword_reference_blocks_counting() {
    let db = Database::open_in_memory().unwrap();
    db.insert_list(&ListRow {
        id: "l1".to_string(),
        name: "General".to_string(),
        description: None,
        created_at: Utc::now().to_rfc3339(),
    })
    .unwrap();
    db.insert_keyword(&KeywordRow {
        id: "k1".to_string(),
        keyword: "TRIBE".to_string(),
        auto_response: "Welcome!".to_string(),
        is_active: true,
        list_id: Some("l1".to_string()),
        created_at: Utc::now().to_rfc3339(),
    })
    .unwrap();

    assert_eq!(db.keyword_count_for_list("l1").unwrap(), 1);
    db.delete_keyword("k1").unwrap();
    assert_eq!(db.keyword_count_for_list("l1").unwrap(), 0);
}
