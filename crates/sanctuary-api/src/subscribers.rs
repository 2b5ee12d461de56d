//! Subscriber administration: roster, bulk import, conversation history,
//! operator replies.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use sanctuary_core::{admin, phone, Error};
use sanctuary_db::models::{MessageRow, SubscriberRow};
use sanctuary_types::api::{
    BulkImportRequest, BulkImportResponse, CreateSubscriberRequest, MessageResponse,
    ReplyRequest, SubscriberResponse,
};
use sanctuary_types::domain::{DeliveryStatus, Direction};

use crate::error::ApiResult;
use crate::state::{blocking, AppState};

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /api/subscribers
pub async fn list(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<SubscriberResponse>>> {
    let limit = page.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = page.offset.unwrap_or(0);

    let db = state.db.clone();
    let rows = blocking(move || {
        let rows = db.list_subscribers(limit, offset)?;
        rows.into_iter()
            .map(|row| {
                let lists = db.list_names_for_subscriber(&row.id)?;
                Ok(to_response(row, lists))
            })
            .collect::<Result<Vec<_>, Error>>()
    })
    .await?;

    Ok(Json(rows))
}

/// POST /api/subscribers — explicit admin add; duplicates are a conflict.
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateSubscriberRequest>,
) -> ApiResult<(StatusCode, Json<SubscriberResponse>)> {
    let row = admin::add_subscriber(state.db.clone(), req.phone_number, req.list_id).await?;

    let db = state.db.clone();
    let id = row.id.clone();
    let lists = blocking(move || db.list_names_for_subscriber(&id).map_err(Error::from)).await?;

    Ok((StatusCode::CREATED, Json(to_response(row, lists))))
}

/// POST /api/subscribers/bulk
pub async fn bulk(
    State(state): State<AppState>,
    Json(req): Json<BulkImportRequest>,
) -> ApiResult<Json<BulkImportResponse>> {
    let response = admin::bulk_import(state.db.clone(), req.phone_numbers, req.list_id).await?;
    Ok(Json(response))
}

/// GET /api/subscribers/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SubscriberResponse>> {
    let db = state.db.clone();
    let (row, lists) = blocking(move || {
        let row = db
            .find_subscriber_by_id(&id)?
            .ok_or_else(|| Error::not_found(format!("Subscriber not found: {id}")))?;
        let lists = db.list_names_for_subscriber(&row.id)?;
        Ok((row, lists))
    })
    .await?;
    Ok(Json(to_response(row, lists)))
}

/// DELETE /api/subscribers/{id} — admin-initiated opt-out; the row stays.
pub async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    admin::deactivate_subscriber(state.db.clone(), id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// GET /api/subscribers/{id}/messages — the conversation, oldest first.
pub async fn messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let limit = page.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = page.offset.unwrap_or(0);

    let db = state.db.clone();
    let rows = blocking(move || {
        let subscriber = db
            .find_subscriber_by_id(&id)?
            .ok_or_else(|| Error::not_found(format!("Subscriber not found: {id}")))?;
        db.messages_for_phone(&subscriber.phone_number, limit, offset)
            .map_err(Error::from)
    })
    .await?;

    Ok(Json(rows.into_iter().map(to_message_response).collect()))
}

/// POST /api/subscribers/{id}/reply
pub async fn reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ReplyRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let row = admin::send_reply(state.db.clone(), state.gateway.clone(), id, req.message).await?;
    Ok(Json(to_message_response(row)))
}

fn to_response(row: SubscriberRow, lists: Vec<String>) -> SubscriberResponse {
    SubscriberResponse {
        id: row.id,
        formatted_phone: phone::format_display(&row.phone_number),
        phone_number: row.phone_number,
        is_active: row.is_active,
        joined_at: row.joined_at,
        joined_via_keyword: row.joined_via_keyword,
        lists,
    }
}

pub(crate) fn to_message_response(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: row.id,
        phone_number: row.phone_number,
        content: row.content,
        direction: Direction::parse(&row.direction).unwrap_or(Direction::Inbound),
        created_at: row.created_at,
        delivery_status: row.delivery_status.as_deref().and_then(DeliveryStatus::parse),
        broadcast_id: row.broadcast_id,
    }
}
