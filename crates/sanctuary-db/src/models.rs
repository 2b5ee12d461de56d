//! Database row types — these map directly to SQLite rows.
//! Distinct from the sanctuary-types API models to keep the DB layer
//! independent. Timestamps are RFC 3339 UTC text; enums are stored as the
//! canonical uppercase/lowercase strings checked by the schema.

#[derive(Debug, Clone)]
pub struct SubscriberRow {
    pub id: String,
    pub phone_number: String,
    pub is_active: bool,
    pub joined_at: String,
    pub last_read_at: Option<String>,
    pub joined_via_keyword: Option<String>,
    pub notifier_thread_ref: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct KeywordRow {
    pub id: String,
    pub keyword: String,
    pub auto_response: String,
    pub is_active: bool,
    pub list_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub phone_number: String,
    pub content: String,
    pub direction: String,
    pub created_at: String,
    pub broadcast_id: Option<String>,
    pub provider_message_id: Option<String>,
    pub delivery_status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BroadcastRow {
    pub id: String,
    pub name: Option<String>,
    pub message: String,
    pub sent_count: u32,
    pub total_cost: f64,
    pub target_all: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct LinkRow {
    pub id: String,
    pub broadcast_id: String,
    pub original_url: String,
    pub short_code: String,
}

/// One member of a list, joined against the subscriber for display.
#[derive(Debug, Clone)]
pub struct MemberDetailRow {
    pub subscriber_id: String,
    pub phone_number: String,
    pub joined_at: String,
    pub joined_via: String,
}

/// One inbox conversation header; the preview message is fetched separately.
#[derive(Debug, Clone)]
pub struct ConversationRow {
    pub subscriber_id: String,
    pub phone_number: String,
    pub has_unread: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfigRow {
    pub default_welcome_message: String,
    pub legacy_opt_in_keyword: Option<String>,
    pub legacy_welcome_response: Option<String>,
    pub legacy_already_subscribed_response: Option<String>,
}

/// Per-broadcast delivery funnel, aggregated from outbound message rows.
#[derive(Debug, Clone, Default)]
pub struct DeliveryCounts {
    pub delivered: u32,
    pub undelivered: u32,
    pub failed: u32,
}
