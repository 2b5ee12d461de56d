//! Signup keyword administration.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use sanctuary_core::{admin, Error};
use sanctuary_db::models::KeywordRow;
use sanctuary_types::api::{CreateKeywordRequest, KeywordResponse, UpdateKeywordRequest};

use crate::error::ApiResult;
use crate::state::{blocking, AppState};

/// GET /api/keywords
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<KeywordResponse>>> {
    let db = state.db.clone();
    let rows = blocking(move || db.all_keywords().map_err(Error::from)).await?;
    Ok(Json(rows.into_iter().map(to_response).collect()))
}

/// GET /api/keywords/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<KeywordResponse>> {
    let db = state.db.clone();
    let row = blocking(move || {
        db.find_keyword_by_id(&id)?
            .ok_or_else(|| Error::not_found(format!("Keyword not found: {id}")))
    })
    .await?;
    Ok(Json(to_response(row)))
}

/// POST /api/keywords
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateKeywordRequest>,
) -> ApiResult<(StatusCode, Json<KeywordResponse>)> {
    let row = admin::create_keyword(state.db.clone(), req).await?;
    Ok((StatusCode::CREATED, Json(to_response(row))))
}

/// PUT /api/keywords/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateKeywordRequest>,
) -> ApiResult<Json<KeywordResponse>> {
    let row = admin::update_keyword(state.db.clone(), id, req).await?;
    Ok(Json(to_response(row)))
}

/// DELETE /api/keywords/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    admin::delete_keyword(state.db.clone(), id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

fn to_response(row: KeywordRow) -> KeywordResponse {
    KeywordResponse {
        id: row.id,
        keyword: row.keyword,
        auto_response: row.auto_response,
        is_active: row.is_active,
        list_id: row.list_id,
        created_at: row.created_at,
    }
}
