//! Broadcast endpoints.

use axum::extract::State;
use axum::Json;
use tracing::info;

use sanctuary_core::broadcast::BroadcastOutcome;
use sanctuary_types::api::{
    BroadcastRequest, BroadcastResponse, SendResultEntry, TestBroadcastRequest,
};

use crate::error::ApiResult;
use crate::state::AppState;

const MAX_RESULTS_IN_RESPONSE: usize = 10;
const MAX_ERRORS_IN_RESPONSE: usize = 5;

/// POST /api/broadcast
pub async fn send(
    State(state): State<AppState>,
    Json(req): Json<BroadcastRequest>,
) -> ApiResult<Json<BroadcastResponse>> {
    info!(
        target_all = req.target_all,
        target_lists = req.target_list_ids.len(),
        exclude_lists = req.exclude_list_ids.len(),
        "broadcast_requested"
    );
    let outcome = state.broadcast_engine().execute(req).await?;
    Ok(Json(to_response(outcome)))
}

/// POST /api/broadcast/test — single recipient, recorded under a
/// `[TEST]`-prefixed broadcast.
pub async fn send_test(
    State(state): State<AppState>,
    Json(req): Json<TestBroadcastRequest>,
) -> ApiResult<Json<BroadcastResponse>> {
    let outcome = state.broadcast_engine().execute_test(req).await?;
    Ok(Json(to_response(outcome)))
}

fn to_response(outcome: BroadcastOutcome) -> BroadcastResponse {
    BroadcastResponse {
        success: true,
        broadcast_id: outcome.broadcast_id,
        campaign_name: outcome.campaign_name,
        sent_to: outcome.sent_to,
        failed: outcome.failed,
        total_cost: format!("{:.2}", outcome.total_cost),
        segment_count: outcome.segment_count,
        links_tracked: outcome.links_tracked,
        target_all: outcome.target_all,
        targeted_lists: outcome.targeted_lists,
        results: outcome
            .results
            .into_iter()
            .take(MAX_RESULTS_IN_RESPONSE)
            .map(|r| SendResultEntry {
                phone_number: r.phone_number,
                status: r.status,
                provider_message_id: r.provider_message_id,
            })
            .collect(),
        errors: outcome
            .errors
            .into_iter()
            .take(MAX_ERRORS_IN_RESPONSE)
            .collect(),
    }
}
