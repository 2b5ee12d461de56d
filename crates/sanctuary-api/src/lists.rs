//! Subscriber list administration and membership management.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use sanctuary_core::{admin, phone, Error};
use sanctuary_types::api::{CreateListRequest, ListMemberResponse, ListResponse};

use crate::error::ApiResult;
use crate::state::{blocking, AppState};

/// GET /api/lists
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<ListResponse>>> {
    let db = state.db.clone();
    let rows = blocking(move || db.all_lists_with_counts().map_err(Error::from)).await?;
    Ok(Json(
        rows.into_iter()
            .map(|(row, member_count)| ListResponse {
                id: row.id,
                name: row.name,
                description: row.description,
                created_at: row.created_at,
                member_count,
            })
            .collect(),
    ))
}

/// POST /api/lists
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateListRequest>,
) -> ApiResult<(StatusCode, Json<ListResponse>)> {
    let row = admin::create_list(state.db.clone(), req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ListResponse {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            member_count: 0,
        }),
    ))
}

/// DELETE /api/lists/{id} — rejected while signup keywords reference the list.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    admin::delete_list(state.db.clone(), id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// GET /api/lists/{id}/members
pub async fn members(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ListMemberResponse>>> {
    let db = state.db.clone();
    let rows = blocking(move || {
        db.find_list_by_id(&id)?
            .ok_or_else(|| Error::not_found(format!("List not found: {id}")))?;
        db.members_of_list(&id).map_err(Error::from)
    })
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|m| ListMemberResponse {
                formatted_phone: phone::format_display(&m.phone_number),
                subscriber_id: m.subscriber_id,
                phone_number: m.phone_number,
                joined_at: m.joined_at,
                joined_via: m.joined_via,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub subscriber_id: String,
}

/// POST /api/lists/{id}/members — idempotent manual enrollment.
pub async fn add_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let db = state.db.clone();
    let added = blocking(move || {
        db.find_list_by_id(&id)?
            .ok_or_else(|| Error::not_found(format!("List not found: {id}")))?;
        db.find_subscriber_by_id(&req.subscriber_id)?
            .ok_or_else(|| {
                Error::not_found(format!("Subscriber not found: {}", req.subscriber_id))
            })?;
        db.insert_membership(&req.subscriber_id, &id, "manual", &Utc::now().to_rfc3339())
            .map_err(Error::from)
    })
    .await?;
    Ok(Json(serde_json::json!({ "success": true, "added": added })))
}

/// DELETE /api/lists/{id}/members/{subscriber_id}
pub async fn remove_member(
    State(state): State<AppState>,
    Path((id, subscriber_id)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let db = state.db.clone();
    blocking(move || {
        db.find_list_by_id(&id)?
            .ok_or_else(|| Error::not_found(format!("List not found: {id}")))?;
        db.remove_membership(&subscriber_id, &id).map_err(Error::from)
    })
    .await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
