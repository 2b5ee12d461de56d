//! Public short-link redirect with click attribution.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::state::AppState;

const NOT_FOUND_PAGE: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Link not found</title></head>
  <body>
    <h1>Link not found</h1>
    <p>This link may have expired or never existed.</p>
  </body>
</html>"#;

#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    /// Subscriber id for click attribution.
    pub sid: Option<String>,
}

/// GET /sanctuary/{code}
pub async fn follow(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<RedirectQuery>,
) -> Response {
    let link = {
        let db = state.db.clone();
        let code = code.clone();
        tokio::task::spawn_blocking(move || db.find_link_by_short_code(&code)).await
    };

    let link = match link {
        Ok(Ok(Some(link))) => link,
        Ok(Ok(None)) => {
            return (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response();
        }
        Ok(Err(e)) => {
            warn!(%code, error = %e, "link_lookup_failed");
            return (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response();
        }
        Err(e) => {
            warn!(%code, error = %e, "link_lookup_join_failed");
            return (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response();
        }
    };

    // Click recording never blocks the redirect.
    {
        let db = state.db.clone();
        let link_id = link.id.clone();
        let subscriber_id = query.sid.clone();
        let recorded = tokio::task::spawn_blocking(move || {
            db.insert_link_click(
                &Uuid::new_v4().to_string(),
                &link_id,
                subscriber_id.as_deref(),
                &Utc::now().to_rfc3339(),
            )
        })
        .await;
        match recorded {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(%code, error = %e, "click_record_failed"),
            Err(e) => warn!(%code, error = %e, "click_record_join_failed"),
        }
    }

    (
        StatusCode::PERMANENT_REDIRECT,
        [(header::LOCATION, link.original_url)],
    )
        .into_response()
}
