//! Analytics and dashboard read models.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;

use sanctuary_core::Error;
use sanctuary_types::api::{
    AnalyticsResponse, BroadcastAnalytics, DashboardStats, MessageResponse, SubscriberGrowth,
};
use sanctuary_types::domain::Direction;

use crate::error::ApiResult;
use crate::state::{blocking, AppState};
use crate::subscribers::to_message_response;

/// GET /api/analytics — per-broadcast delivery funnel and subscriber growth.
pub async fn analytics(State(state): State<AppState>) -> ApiResult<Json<AnalyticsResponse>> {
    let db = state.db.clone();
    let response = blocking(move || {
        let broadcasts = db
            .all_broadcasts()?
            .into_iter()
            .map(|b| {
                let delivery = db.delivery_counts_for_broadcast(&b.id)?;
                let clicks = db.click_count_for_broadcast(&b.id)?;
                Ok(BroadcastAnalytics {
                    id: b.id,
                    name: b.name,
                    created_at: b.created_at,
                    sent_count: b.sent_count,
                    total_cost: format!("{:.2}", b.total_cost),
                    delivered: delivery.delivered,
                    undelivered: delivery.undelivered,
                    failed: delivery.failed,
                    clicks,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let (total, active) = db.subscriber_counts()?;
        Ok(AnalyticsResponse {
            broadcasts,
            subscribers: SubscriberGrowth {
                total,
                active,
                opted_out: total - active,
            },
        })
    })
    .await?;

    Ok(Json(response))
}

/// GET /api/dashboard/stats
pub async fn dashboard_stats(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    let db = state.db.clone();
    let stats = blocking(move || {
        let (_, active) = db.subscriber_counts()?;
        let cutoff = (Utc::now() - Duration::days(7)).to_rfc3339();
        Ok(DashboardStats {
            active_subscribers: active,
            total_broadcasts: db.broadcast_count()?,
            messages_in_last_7_days: db
                .count_messages_since(Direction::Inbound.as_str(), &cutoff)?,
            messages_out_last_7_days: db
                .count_messages_since(Direction::Outbound.as_str(), &cutoff)?,
            unread_count: db.unread_count()?,
        })
    })
    .await?;

    Ok(Json(stats))
}

const DEFAULT_FEED_LIMIT: u32 = 20;
const MAX_FEED_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<u32>,
}

/// GET /api/dashboard/messages — most recent messages across all
/// conversations.
pub async fn dashboard_messages(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let limit = query.limit.unwrap_or(DEFAULT_FEED_LIMIT).min(MAX_FEED_LIMIT);
    let db = state.db.clone();
    let rows = blocking(move || db.recent_messages(limit).map_err(Error::from)).await?;
    Ok(Json(rows.into_iter().map(to_message_response).collect()))
}
