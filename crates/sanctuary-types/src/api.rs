use serde::{Deserialize, Serialize};

use crate::domain::{DeliveryStatus, Direction};

// -- Errors --

/// Admin endpoints surface every failure as `{"error": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// -- Broadcast --

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub message: String,
    #[serde(default)]
    pub campaign_name: Option<String>,
    /// Exact URL strings approved for shortening. URLs in the draft that
    /// are not listed here are sent verbatim and untracked.
    #[serde(default)]
    pub approved_links: Option<Vec<String>>,
    #[serde(default)]
    pub target_all: bool,
    #[serde(default)]
    pub target_list_ids: Vec<String>,
    #[serde(default)]
    pub exclude_list_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestBroadcastRequest {
    pub message: String,
    pub phone_number: String,
    #[serde(default)]
    pub approved_links: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResultEntry {
    pub phone_number: String,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResponse {
    pub success: bool,
    pub broadcast_id: Option<String>,
    pub campaign_name: Option<String>,
    pub sent_to: usize,
    pub failed: usize,
    /// Fixed-point dollars, two decimal places.
    pub total_cost: String,
    pub segment_count: u32,
    pub links_tracked: usize,
    pub target_all: bool,
    pub targeted_lists: usize,
    /// First few per-recipient outcomes, capped at 10.
    pub results: Vec<SendResultEntry>,
    /// First few per-recipient failures, capped at 5.
    pub errors: Vec<String>,
}

// -- Inbox --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    pub content: String,
    pub direction: Direction,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    pub subscriber_id: String,
    pub phone_number: String,
    pub formatted_phone: String,
    pub has_unread: bool,
    pub last_message: Option<MessagePreview>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxResponse {
    pub conversations: Vec<ConversationEntry>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxStats {
    pub unread_count: u32,
    pub total_conversations: u32,
}

// -- Keywords --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeywordRequest {
    pub keyword: String,
    pub auto_response: String,
    #[serde(default)]
    pub list_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKeywordRequest {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub auto_response: Option<String>,
    #[serde(default)]
    pub list_id: Option<Option<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordResponse {
    pub id: String,
    pub keyword: String,
    pub auto_response: String,
    pub is_active: bool,
    pub list_id: Option<String>,
    pub created_at: String,
}

// -- Lists --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub member_count: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMemberResponse {
    pub subscriber_id: String,
    pub phone_number: String,
    pub formatted_phone: String,
    pub joined_at: String,
    pub joined_via: String,
}

// -- Subscribers --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriberRequest {
    pub phone_number: String,
    #[serde(default)]
    pub list_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberResponse {
    pub id: String,
    pub phone_number: String,
    pub formatted_phone: String,
    pub is_active: bool,
    pub joined_at: String,
    pub joined_via_keyword: Option<String>,
    pub lists: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportRequest {
    pub phone_numbers: Vec<String>,
    #[serde(default)]
    pub list_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BulkImportOutcome {
    Added,
    SkippedDuplicate,
    RejectedInvalidFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportEntry {
    pub phone_number: String,
    pub outcome: BulkImportOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportResponse {
    pub added: usize,
    pub skipped_duplicate: usize,
    pub rejected_invalid_format: usize,
    pub entries: Vec<BulkImportEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    pub phone_number: String,
    pub content: String,
    pub direction: Direction,
    pub created_at: String,
    pub delivery_status: Option<DeliveryStatus>,
    pub broadcast_id: Option<String>,
}

// -- Settings --

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub default_welcome_message: String,
    pub legacy_opt_in_keyword: Option<String>,
    pub legacy_welcome_response: Option<String>,
    pub legacy_already_subscribed_response: Option<String>,
}

// -- Analytics & dashboard --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastAnalytics {
    pub id: String,
    pub name: Option<String>,
    pub created_at: String,
    pub sent_count: u32,
    pub total_cost: String,
    pub delivered: u32,
    pub undelivered: u32,
    pub failed: u32,
    pub clicks: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberGrowth {
    pub total: u32,
    pub active: u32,
    pub opted_out: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub broadcasts: Vec<BroadcastAnalytics>,
    pub subscribers: SubscriberGrowth,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub active_subscribers: u32,
    pub total_broadcasts: u32,
    pub messages_in_last_7_days: u32,
    pub messages_out_last_7_days: u32,
    pub unread_count: u32,
}

fn default_true() -> bool {
    true
}
