//! AppConfig singleton: default welcome message and legacy response strings.

use axum::extract::State;
use axum::Json;

use sanctuary_core::Error;
use sanctuary_db::models::AppConfigRow;
use sanctuary_types::api::Settings;

use crate::error::ApiResult;
use crate::state::{blocking, AppState};

/// GET /api/settings
pub async fn get(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    let db = state.db.clone();
    let row = blocking(move || db.get_app_config().map_err(Error::from)).await?;
    Ok(Json(Settings {
        default_welcome_message: row.default_welcome_message,
        legacy_opt_in_keyword: row.legacy_opt_in_keyword,
        legacy_welcome_response: row.legacy_welcome_response,
        legacy_already_subscribed_response: row.legacy_already_subscribed_response,
    }))
}

/// PUT /api/settings
pub async fn update(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> ApiResult<Json<Settings>> {
    if settings.default_welcome_message.trim().is_empty() {
        return Err(Error::invalid("Default welcome message cannot be empty").into());
    }

    let db = state.db.clone();
    let row = AppConfigRow {
        default_welcome_message: settings.default_welcome_message.clone(),
        legacy_opt_in_keyword: settings.legacy_opt_in_keyword.clone(),
        legacy_welcome_response: settings.legacy_welcome_response.clone(),
        legacy_already_subscribed_response: settings.legacy_already_subscribed_response.clone(),
    };
    blocking(move || db.update_app_config(&row).map_err(Error::from)).await?;
    Ok(Json(settings))
}
