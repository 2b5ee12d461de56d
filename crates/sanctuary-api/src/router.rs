//! Route table. Webhooks and short-link redirects are public; everything
//! under the admin surface sits behind the bearer-token middleware.

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;
use crate::{
    analytics, broadcast, inbox, keywords, lists, middleware, redirect, settings, subscribers,
    webhooks,
};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/api/webhooks/sms", post(webhooks::inbound_sms))
        .route(
            "/api/webhooks/delivery-status",
            post(webhooks::delivery_status),
        )
        .route("/sanctuary/{code}", get(redirect::follow));

    let admin = Router::new()
        .route("/api/broadcast", post(broadcast::send))
        .route("/api/broadcast/test", post(broadcast::send_test))
        .route("/api/inbox", get(inbox::list))
        .route("/api/inbox/stats", get(inbox::stats))
        .route(
            "/api/conversations/mark-all-read",
            post(inbox::mark_all_read),
        )
        .route("/api/conversations/{id}/mark-read", post(inbox::mark_read))
        .route(
            "/api/conversations/{id}/mark-unread",
            post(inbox::mark_unread),
        )
        .route("/api/keywords", get(keywords::list).post(keywords::create))
        .route(
            "/api/keywords/{id}",
            get(keywords::get)
                .put(keywords::update)
                .delete(keywords::delete),
        )
        .route("/api/lists", get(lists::list).post(lists::create))
        .route("/api/lists/{id}", delete(lists::delete))
        .route(
            "/api/lists/{id}/members",
            get(lists::members).post(lists::add_member),
        )
        .route(
            "/api/lists/{id}/members/{subscriber_id}",
            delete(lists::remove_member),
        )
        .route(
            "/api/subscribers",
            get(subscribers::list).post(subscribers::create),
        )
        .route("/api/subscribers/bulk", post(subscribers::bulk))
        .route(
            "/api/subscribers/{id}",
            get(subscribers::get).delete(subscribers::deactivate),
        )
        .route("/api/subscribers/{id}/messages", get(subscribers::messages))
        .route("/api/subscribers/{id}/reply", post(subscribers::reply))
        .route("/api/settings", get(settings::get).put(settings::update))
        .route("/api/analytics", get(analytics::analytics))
        .route("/api/dashboard/stats", get(analytics::dashboard_stats))
        .route("/api/dashboard/messages", get(analytics::dashboard_messages))
        .layer(from_fn_with_state(state.clone(), middleware::require_admin));

    Router::new().merge(public).merge(admin).with_state(state)
}
