//! Inbox and conversation read-state endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use sanctuary_core::inbox::InboxFilter;
use sanctuary_core::{phone, Error};
use sanctuary_types::api::{ConversationEntry, InboxResponse, InboxStats, MessagePreview};
use sanctuary_types::domain::Direction;

use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    pub filter: Option<String>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /api/inbox
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<InboxResponse>> {
    let filter = match &query.filter {
        None => InboxFilter::All,
        Some(raw) => InboxFilter::parse(raw)
            .ok_or_else(|| Error::invalid(format!("Unknown filter: {raw}")))?,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = query.offset.unwrap_or(0);
    let search = query.search.filter(|s| !s.trim().is_empty());

    let conversations = state.inbox().list(filter, search, limit, offset).await?;

    let conversations = conversations
        .into_iter()
        .map(|c| ConversationEntry {
            formatted_phone: phone::format_display(&c.phone_number),
            subscriber_id: c.subscriber_id,
            phone_number: c.phone_number,
            has_unread: c.has_unread,
            last_message: c.last_message.map(|m| MessagePreview {
                direction: Direction::parse(&m.direction).unwrap_or(Direction::Inbound),
                content: m.content,
                created_at: m.created_at,
            }),
        })
        .collect();

    Ok(Json(InboxResponse {
        conversations,
        limit,
        offset,
    }))
}

/// GET /api/inbox/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<InboxStats>> {
    let counts = state.inbox().counts().await?;
    Ok(Json(InboxStats {
        unread_count: counts.unread,
        total_conversations: counts.conversations,
    }))
}

/// POST /api/conversations/{id}/mark-read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.inbox().mark_read(&id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /api/conversations/{id}/mark-unread
pub async fn mark_unread(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.inbox().mark_unread(&id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// POST /api/conversations/mark-all-read
pub async fn mark_all_read(
    State(state): State<AppState>,
) -> ApiResult<Json<serde_json::Value>> {
    state.inbox().mark_all_read().await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
