//! End-to-end scenarios driven through the core services against an
//! in-memory database and recording fakes.

use std::sync::Arc;

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use sanctuary_core::broadcast::BroadcastEngine;
use sanctuary_core::delivery::{DeliveryReconciler, DeliveryUpdate};
use sanctuary_core::inbound::{InboundOptions, InboundProcessor};
use sanctuary_core::testing::{FakeGateway, FakeNotifier};
use sanctuary_db::models::{KeywordRow, LinkRow, ListRow};
use sanctuary_db::Database;
use sanctuary_types::api::BroadcastRequest;

const BASE_URL: &str = "https://sanctuary.example";

struct Harness {
    db: Arc<Database>,
    gateway: Arc<FakeGateway>,
    notifier: Arc<FakeNotifier>,
}

impl Harness {
    fn new() -> Self {
        Self {
            db: Arc::new(Database::open_in_memory().unwrap()),
            gateway: Arc::new(FakeGateway::new()),
            notifier: Arc::new(FakeNotifier::new()),
        }
    }

    fn processor(&self) -> InboundProcessor {
        InboundProcessor::new(
            self.db.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
            InboundOptions {
                admin_phone: None,
                admin_sms_enabled: false,
                base_url: BASE_URL.to_string(),
            },
        )
    }

    fn engine(&self) -> BroadcastEngine {
        BroadcastEngine::new(self.db.clone(), self.gateway.clone(), BASE_URL.to_string())
    }

    fn seed_keyword(&self, text: &str, auto_response: &str, list_id: Option<&str>) {
        self.db
            .insert_keyword(&KeywordRow {
                id: Uuid::new_v4().to_string(),
                keyword: text.to_string(),
                auto_response: auto_response.to_string(),
                is_active: true,
                list_id: list_id.map(String::from),
                created_at: Utc::now().to_rfc3339(),
            })
            .unwrap();
    }

    fn seed_list(&self, id: &str, name: &str) {
        self.db
            .insert_list(&ListRow {
                id: id.to_string(),
                name: name.to_string(),
                description: None,
                created_at: Utc::now().to_rfc3339(),
            })
            .unwrap();
    }

    async fn opt_in(&self, phone: &str, keyword: &str) -> String {
        self.processor()
            .process(phone, keyword)
            .await
            .unwrap()
            .expect("opt-in produces a reply");
        self.db
            .find_subscriber_by_phone(phone)
            .unwrap()
            .expect("subscriber created")
            .id
    }
}

// S1: a brand-new opt-in creates the subscriber, stores both message rows,
// and closes the unread window.
#[tokio::test]
async fn new_opt_in_end_to_end() {
    let h = Harness::new();
    h.seed_keyword("TRIBE", "Welcome!", None);

    let reply = h.processor().process("+15551234567", "TRIBE").await.unwrap();
    assert_eq!(reply.as_deref(), Some("Welcome!"));

    let subscriber = h
        .db
        .find_subscriber_by_phone("+15551234567")
        .unwrap()
        .unwrap();
    assert!(subscriber.is_active);
    assert_eq!(subscriber.joined_via_keyword.as_deref(), Some("TRIBE"));

    let messages = h
        .db
        .messages_for_phone("+15551234567", 10, 0)
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].direction, "INBOUND");
    assert_eq!(messages[0].content, "TRIBE");
    assert_eq!(messages[1].direction, "OUTBOUND");
    assert_eq!(messages[1].content, "Welcome!");
    assert!(messages[1].provider_message_id.is_some());
    assert_eq!(messages[1].delivery_status.as_deref(), Some("SENT"));

    // The welcome closes the unread window: watermark at or after the
    // outbound row.
    let last_read = subscriber.last_read_at.expect("watermark set");
    assert!(last_read.as_str() >= messages[1].created_at.as_str());
    assert_eq!(h.db.unread_count().unwrap(), 0);

    // One new-subscriber notification went out.
    assert_eq!(h.notifier.posts.lock().unwrap().len(), 1);
}

// S2: STOP from a stranger neither creates state nor notifies.
#[tokio::test]
async fn opt_out_of_non_subscriber() {
    let h = Harness::new();

    let reply = h.processor().process("+15550001111", "STOP").await.unwrap();
    assert_eq!(reply.as_deref(), Some("You're not currently subscribed."));

    assert!(h
        .db
        .find_subscriber_by_phone("+15550001111")
        .unwrap()
        .is_none());
    assert!(h.notifier.posts.lock().unwrap().is_empty());
}

// S3: include/exclude list algebra. L1={A,B}, L2={B,C}; include L1 and
// exclude L2 reaches exactly A.
#[tokio::test]
async fn targeted_broadcast_with_exclusion() {
    let h = Harness::new();
    h.seed_list("l1", "Organizers");
    h.seed_list("l2", "Downtown");
    h.seed_keyword("TRIBE", "Welcome!", None);

    let a = h.opt_in("+15550000001", "TRIBE").await;
    let b = h.opt_in("+15550000002", "TRIBE").await;
    let c = h.opt_in("+15550000003", "TRIBE").await;

    let now = Utc::now().to_rfc3339();
    h.db.insert_membership(&a, "l1", "manual", &now).unwrap();
    h.db.insert_membership(&b, "l1", "manual", &now).unwrap();
    h.db.insert_membership(&b, "l2", "manual", &now).unwrap();
    h.db.insert_membership(&c, "l2", "manual", &now).unwrap();

    // Clear opt-in traffic so the assertion below sees only the broadcast.
    let sends_before = h.gateway.sent.lock().unwrap().len();

    let outcome = h
        .engine()
        .execute(BroadcastRequest {
            message: "Hi".to_string(),
            campaign_name: None,
            approved_links: None,
            target_all: false,
            target_list_ids: vec!["l1".to_string()],
            exclude_list_ids: vec!["l2".to_string()],
        })
        .await
        .unwrap();

    assert_eq!(outcome.sent_to, 1);
    assert_eq!(outcome.failed, 0);
    assert_eq!(outcome.segment_count, 1);
    assert_eq!(format!("{:.2}", outcome.total_cost), "0.01");
    assert_eq!(outcome.targeted_lists, 2);

    let sent = h.gateway.sent.lock().unwrap();
    assert_eq!(sent.len(), sends_before + 1);
    assert_eq!(sent.last().unwrap().0, "+15550000001");
    drop(sent);

    // Broadcast header plus one include and one exclude target row.
    let broadcast_id = outcome.broadcast_id.expect("tracked");
    let broadcast = h.db.find_broadcast_by_id(&broadcast_id).unwrap().unwrap();
    assert_eq!(broadcast.message, "Hi");
    assert_eq!(broadcast.sent_count, 1);

    let targets: Vec<(String, String)> = h
        .db
        .with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT list_id, target_type FROM broadcast_targets
                 WHERE broadcast_id = ?1 ORDER BY list_id",
            )?;
            let rows = stmt
                .query_map([&broadcast_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .unwrap();
    assert_eq!(
        targets,
        vec![
            ("l1".to_string(), "include".to_string()),
            ("l2".to_string(), "exclude".to_string()),
        ]
    );
}

// Boundary: targetAll with an exclude list removes the excluded members
// from the all-active set, and exclude wins on overlap.
#[tokio::test]
async fn target_all_with_exclusion() {
    let h = Harness::new();
    h.seed_list("l1", "Mods");
    h.seed_keyword("TRIBE", "Welcome!", None);

    let _a = h.opt_in("+15550000001", "TRIBE").await;
    let b = h.opt_in("+15550000002", "TRIBE").await;

    let now = Utc::now().to_rfc3339();
    h.db.insert_membership(&b, "l1", "manual", &now).unwrap();

    let outcome = h
        .engine()
        .execute(BroadcastRequest {
            message: "Hi all".to_string(),
            campaign_name: None,
            approved_links: None,
            target_all: true,
            target_list_ids: vec![],
            exclude_list_ids: vec!["l1".to_string()],
        })
        .await
        .unwrap();

    assert_eq!(outcome.sent_to, 1);
    let sent = h.gateway.sent.lock().unwrap();
    assert_eq!(sent.last().unwrap().0, "+15550000001");
}

#[tokio::test]
async fn empty_audience_is_rejected() {
    let h = Harness::new();
    let err = h
        .engine()
        .execute(BroadcastRequest {
            message: "Hi".to_string(),
            campaign_name: None,
            approved_links: None,
            target_all: true,
            target_list_ids: vec![],
            exclude_list_ids: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, sanctuary_core::Error::InvalidInput(_)));
}

// Per-recipient failures accumulate without aborting the campaign.
#[tokio::test]
async fn one_failed_recipient_does_not_abort() {
    let h = Harness::new();
    h.seed_keyword("TRIBE", "Welcome!", None);
    h.opt_in("+15550000001", "TRIBE").await;
    h.opt_in("+15550000002", "TRIBE").await;
    h.gateway.fail_for("+15550000001");

    let outcome = h
        .engine()
        .execute(BroadcastRequest {
            message: "Hi".to_string(),
            campaign_name: None,
            approved_links: None,
            target_all: true,
            target_list_ids: vec![],
            exclude_list_ids: vec![],
        })
        .await
        .unwrap();

    assert_eq!(outcome.sent_to, 1);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains("+15550000001"));

    // The failed recipient still gets an outbound row, marked FAILED.
    let rows = h.db.messages_for_phone("+15550000001", 10, 0).unwrap();
    let failed: Vec<_> = rows
        .iter()
        .filter(|m| m.delivery_status.as_deref() == Some("FAILED"))
        .collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].provider_message_id.is_none());
}

// S4: approved links are rewritten to short links; the outbound body
// carries the minted code.
#[tokio::test]
async fn broadcast_with_link_shortening() {
    let h = Harness::new();
    h.seed_keyword("TRIBE", "Welcome!", None);
    h.opt_in("+15550000001", "TRIBE").await;

    let outcome = h
        .engine()
        .execute(BroadcastRequest {
            message: "See https://example.com/x".to_string(),
            campaign_name: Some("Launch".to_string()),
            approved_links: Some(vec!["https://example.com/x".to_string()]),
            target_all: true,
            target_list_ids: vec![],
            exclude_list_ids: vec![],
        })
        .await
        .unwrap();

    assert_eq!(outcome.links_tracked, 1);

    let body = h.gateway.last_body().unwrap();
    let pattern =
        Regex::new(r"^See https://sanctuary\.example/sanctuary/[A-Za-z0-9]{8}$").unwrap();
    assert!(pattern.is_match(&body), "body: {body}");

    let code = body.rsplit('/').next().unwrap();
    let link = h.db.find_link_by_short_code(code).unwrap().unwrap();
    assert_eq!(link.original_url, "https://example.com/x");
    assert_eq!(link.broadcast_id, outcome.broadcast_id.unwrap());
}

// S5's storage half: a click against a stored link lands with attribution.
// (The 308 redirect itself is exercised at the HTTP layer.)
#[tokio::test]
async fn click_recording_with_attribution() {
    let h = Harness::new();
    let broadcast_id = {
        let row = sanctuary_db::models::BroadcastRow {
            id: Uuid::new_v4().to_string(),
            name: None,
            message: "x".to_string(),
            sent_count: 0,
            total_cost: 0.0,
            target_all: true,
            created_at: Utc::now().to_rfc3339(),
        };
        h.db.insert_broadcast(&row).unwrap();
        row.id
    };
    h.db.insert_link(&LinkRow {
        id: "link1".to_string(),
        broadcast_id: broadcast_id.clone(),
        original_url: "https://example.com/x".to_string(),
        short_code: "abc12345".to_string(),
    })
    .unwrap();

    let link = h.db.find_link_by_short_code("abc12345").unwrap().unwrap();
    h.db.insert_link_click("click1", &link.id, Some("SUB123"), &Utc::now().to_rfc3339())
        .unwrap();

    assert_eq!(h.db.click_count_for_broadcast(&broadcast_id).unwrap(), 1);
}

// S6: a delivery callback flips the outbound row to DELIVERED.
#[tokio::test]
async fn delivery_reconciliation() {
    let h = Harness::new();
    h.seed_keyword("TRIBE", "Welcome!", None);
    h.opt_in("+15550000001", "TRIBE").await;

    let provider_id = h
        .db
        .messages_for_phone("+15550000001", 10, 0)
        .unwrap()
        .into_iter()
        .find_map(|m| m.provider_message_id)
        .expect("outbound row has a provider id");

    let reconciler = DeliveryReconciler::new(h.db.clone());
    reconciler
        .apply(DeliveryUpdate {
            provider_message_id: provider_id.clone(),
            provider_status: "delivered".to_string(),
            error_code: None,
            error_message: None,
        })
        .await
        .unwrap();

    let row = h
        .db
        .find_message_by_provider_id(&provider_id)
        .unwrap()
        .unwrap();
    assert_eq!(row.delivery_status.as_deref(), Some("DELIVERED"));

    // Unknown provider ids succeed silently.
    reconciler
        .apply(DeliveryUpdate {
            provider_message_id: "SMunknown".to_string(),
            provider_status: "failed".to_string(),
            error_code: Some("30003".to_string()),
            error_message: Some("Unreachable handset".to_string()),
        })
        .await
        .unwrap();
}

// Conversational messages thread: the first notification establishes the
// subscriber's thread ref, later ones reuse it.
#[tokio::test]
async fn conversation_threads_are_sticky() {
    let h = Harness::new();
    h.seed_keyword("TRIBE", "Welcome!", None);
    let id = h.opt_in("+15550000001", "TRIBE").await;

    h.processor()
        .process("+15550000001", "first question")
        .await
        .unwrap();
    let adopted = h
        .db
        .find_subscriber_by_id(&id)
        .unwrap()
        .unwrap()
        .notifier_thread_ref
        .expect("thread ref adopted");

    h.processor()
        .process("+15550000001", "second question")
        .await
        .unwrap();

    let posts = h.notifier.posts.lock().unwrap();
    let threaded: Vec<_> = posts.iter().filter_map(|(_, t)| t.clone()).collect();
    assert_eq!(threaded, vec![adopted]);
}

// Notifier outages are non-fatal: the message still lands and the reply
// still goes out.
#[tokio::test]
async fn notifier_failure_does_not_poison_inbound() {
    let h = Harness::new();
    h.seed_keyword("TRIBE", "Welcome!", None);
    h.notifier.fail_all();

    let reply = h.processor().process("+15551234567", "TRIBE").await.unwrap();
    assert_eq!(reply.as_deref(), Some("Welcome!"));
    assert!(h
        .db
        .find_subscriber_by_phone("+15551234567")
        .unwrap()
        .is_some());
}
