//! Contract tests against the assembled router: webhook TwiML shapes, the
//! short-link redirect, and admin authentication.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use sanctuary_api::{AppState, AppStateInner, Config};
use sanctuary_core::testing::{FakeGateway, FakeNotifier};
use sanctuary_db::models::{BroadcastRow, KeywordRow, LinkRow};
use sanctuary_db::Database;

const BASE_URL: &str = "https://sanctuary.example";

struct Harness {
    state: AppState,
    gateway: Arc<FakeGateway>,
}

impl Harness {
    fn new() -> Self {
        Self::with_admin_token(None)
    }

    fn with_admin_token(admin_token: Option<&str>) -> Self {
        let gateway = Arc::new(FakeGateway::new());
        let state = Arc::new(AppStateInner {
            db: Arc::new(Database::open_in_memory().unwrap()),
            config: Config {
                database_path: ":memory:".to_string(),
                host: "127.0.0.1".to_string(),
                port: 0,
                environment: "test".to_string(),
                admin_token: admin_token.map(String::from),
                twilio_account_sid: None,
                twilio_auth_token: None,
                twilio_messaging_service_sid: None,
                slack_bot_token: None,
                slack_channel: None,
                admin_phone_number: None,
                sms_notifications_enabled: false,
                base_url: BASE_URL.to_string(),
                verify_webhook_signatures: false,
            },
            gateway: gateway.clone(),
            notifier: Arc::new(FakeNotifier::new()),
        });
        Self { state, gateway }
    }

    fn router(&self) -> Router {
        sanctuary_api::router(self.state.clone())
    }

    fn seed_keyword(&self, text: &str, auto_response: &str) {
        self.state
            .db
            .insert_keyword(&KeywordRow {
                id: Uuid::new_v4().to_string(),
                keyword: text.to_string(),
                auto_response: auto_response.to_string(),
                is_active: true,
                list_id: None,
                created_at: Utc::now().to_rfc3339(),
            })
            .unwrap();
    }
}

fn sms_webhook_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/sms")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn sms_webhook_opt_in_returns_twiml_reply() {
    let h = Harness::new();
    h.seed_keyword("TRIBE", "Welcome!");

    let response = h
        .router()
        .oneshot(sms_webhook_request(
            "MessageSid=SM123&From=%2B15551234567&To=%2B15559999999&Body=TRIBE",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/xml"
    );
    let body = body_string(response).await;
    assert_eq!(
        body,
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Message>Welcome!</Message></Response>"#
    );

    let subscriber = h
        .state
        .db
        .find_subscriber_by_phone("+15551234567")
        .unwrap()
        .unwrap();
    assert!(subscriber.is_active);
}

#[tokio::test]
async fn sms_webhook_stop_from_stranger() {
    let h = Harness::new();

    let response = h
        .router()
        .oneshot(sms_webhook_request(
            "MessageSid=SM124&From=%2B15550001111&To=%2B15559999999&Body=STOP",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(
        body.contains("<Message>You&apos;re not currently subscribed.</Message>"),
        "body: {body}"
    );
    assert!(h
        .state
        .db
        .find_subscriber_by_phone("+15550001111")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn sms_webhook_missing_fields_is_400() {
    let h = Harness::new();

    let response = h
        .router()
        .oneshot(sms_webhook_request("MessageSid=SM125&From=%2B15551234567"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert_eq!(body, r#"{"error":"Missing required fields"}"#);
}

#[tokio::test]
async fn sms_webhook_swallows_internal_errors_into_empty_twiml() {
    let h = Harness::new();
    // An invalid sender phone fails canonicalization inside the processor.
    let response = h
        .router()
        .oneshot(sms_webhook_request(
            "MessageSid=SM126&From=garbage&To=%2B15559999999&Body=hello",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert_eq!(
        body,
        r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#
    );
}

#[tokio::test]
async fn delivery_webhook_updates_status_and_always_200s() {
    let h = Harness::new();
    h.seed_keyword("TRIBE", "Welcome!");

    // Create an outbound row via opt-in, then reconcile it.
    h.router()
        .oneshot(sms_webhook_request(
            "MessageSid=SM1&From=%2B15551234567&To=%2B15559999999&Body=TRIBE",
        ))
        .await
        .unwrap();

    let provider_id = h
        .state
        .db
        .messages_for_phone("+15551234567", 10, 0)
        .unwrap()
        .into_iter()
        .find_map(|m| m.provider_message_id)
        .unwrap();

    let response = h
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/webhooks/delivery-status")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!(
                    "MessageSid={provider_id}&MessageStatus=delivered&To=%2B15551234567&From=%2B15559999999"
                )))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let row = h
        .state
        .db
        .find_message_by_provider_id(&provider_id)
        .unwrap()
        .unwrap();
    assert_eq!(row.delivery_status.as_deref(), Some("DELIVERED"));

    // Unknown sid: still 200.
    let response = h
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/webhooks/delivery-status")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("MessageSid=SMnope&MessageStatus=failed"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn short_link_redirects_with_click_attribution() {
    let h = Harness::new();
    let broadcast = BroadcastRow {
        id: Uuid::new_v4().to_string(),
        name: None,
        message: "x".to_string(),
        sent_count: 0,
        total_cost: 0.0,
        target_all: true,
        created_at: Utc::now().to_rfc3339(),
    };
    h.state.db.insert_broadcast(&broadcast).unwrap();
    h.state
        .db
        .insert_link(&LinkRow {
            id: "link1".to_string(),
            broadcast_id: broadcast.id.clone(),
            original_url: "https://example.com/x".to_string(),
            short_code: "abc12345".to_string(),
        })
        .unwrap();

    let response = h
        .router()
        .oneshot(
            Request::builder()
                .uri("/sanctuary/abc12345?sid=SUB123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "https://example.com/x"
    );

    let attributed: Option<String> = h
        .state
        .db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT subscriber_id FROM link_clicks WHERE link_id = 'link1'",
                [],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(attributed.as_deref(), Some("SUB123"));
}

#[tokio::test]
async fn unknown_short_link_is_404_html() {
    let h = Harness::new();

    let response = h
        .router()
        .oneshot(
            Request::builder()
                .uri("/sanctuary/zzzzzzzz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_string(response).await;
    assert!(body.contains("<h1>Link not found</h1>"));
}

#[tokio::test]
async fn admin_routes_require_bearer_token_when_configured() {
    let h = Harness::with_admin_token(Some("sekrit"));

    let unauthenticated = h
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/keywords")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

    let wrong = h
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/keywords")
                .header(header::AUTHORIZATION, "Bearer wrong!")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let authenticated = h
        .router()
        .oneshot(
            Request::builder()
                .uri("/api/keywords")
                .header(header::AUTHORIZATION, "Bearer sekrit")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(authenticated.status(), StatusCode::OK);

    // Webhooks stay public.
    let webhook = h
        .router()
        .oneshot(sms_webhook_request(
            "MessageSid=SM1&From=%2B15551234567&To=%2B15559999999&Body=hello",
        ))
        .await
        .unwrap();
    assert_eq!(webhook.status(), StatusCode::OK);

    // The gateway fake was never touched by the auth checks.
    let _ = &h.gateway;
}

#[tokio::test]
async fn broadcast_endpoint_shapes_the_summary() {
    let h = Harness::new();
    h.seed_keyword("TRIBE", "Welcome!");

    // One subscriber via webhook opt-in.
    h.router()
        .oneshot(sms_webhook_request(
            "MessageSid=SM1&From=%2B15551234567&To=%2B15559999999&Body=TRIBE",
        ))
        .await
        .unwrap();

    let response = h
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/broadcast")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"message":"Hi there","targetAll":true}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value =
        serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["sentTo"], 1);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["segmentCount"], 1);
    assert_eq!(body["totalCost"], "0.01");
    assert_eq!(body["results"].as_array().unwrap().len(), 1);

    // Validation failure surfaces as 400 with a single error field.
    let invalid = h
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/broadcast")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"message":"Hi there"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&body_string(invalid).await).unwrap();
    assert!(body["error"].is_string());
}
