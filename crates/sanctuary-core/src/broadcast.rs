//! Broadcast fan-out: audience resolution, cost estimation, link
//! tokenization, and the per-recipient send loop.
//!
//! The send itself is the only fatal path. The analytics envelope around it
//! (broadcast header, target rows, link rows, per-message rows) is
//! best-effort; any of those writes failing downgrades tracking but never
//! blocks a campaign.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use sanctuary_db::models::{BroadcastRow, MessageRow, SubscriberRow};
use sanctuary_db::Database;
use sanctuary_types::api::{BroadcastRequest, TestBroadcastRequest};
use sanctuary_types::domain::{DeliveryStatus, Direction, TargetType};

use crate::error::{Error, Result};
use crate::gateway::SmsGateway;
use crate::links::{self, TokenizedDraft};
use crate::task::run_blocking;
use crate::{phone, segment_count, COST_PER_SEGMENT, MAX_MESSAGE_LEN};

/// Upper bound on one gateway call; a recipient whose send exceeds it is
/// recorded FAILED and the fan-out continues.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SendRecord {
    pub phone_number: String,
    pub provider_message_id: Option<String>,
    pub status: DeliveryStatus,
}

#[derive(Debug)]
pub struct BroadcastOutcome {
    /// None when the header insert failed and the campaign ran untracked.
    pub broadcast_id: Option<String>,
    pub campaign_name: Option<String>,
    pub sent_to: usize,
    pub failed: usize,
    pub total_cost: f64,
    pub segment_count: u32,
    pub links_tracked: usize,
    pub target_all: bool,
    pub targeted_lists: usize,
    pub results: Vec<SendRecord>,
    pub errors: Vec<String>,
}

pub struct BroadcastEngine {
    db: Arc<Database>,
    gateway: Arc<dyn SmsGateway>,
    base_url: String,
}

impl BroadcastEngine {
    pub fn new(db: Arc<Database>, gateway: Arc<dyn SmsGateway>, base_url: String) -> Self {
        Self {
            db,
            gateway,
            base_url,
        }
    }

    /// Run a campaign against the resolved audience.
    pub async fn execute(&self, req: BroadcastRequest) -> Result<BroadcastOutcome> {
        validate_draft(&req.message)?;
        if !req.target_all && req.target_list_ids.is_empty() && req.exclude_list_ids.is_empty() {
            return Err(Error::invalid(
                "Select all subscribers or at least one target or exclude list",
            ));
        }

        let audience = {
            let db = self.db.clone();
            let req = req.clone();
            run_blocking(move || resolve_audience(&db, &req)).await?
        };
        if audience.is_empty() {
            return Err(Error::invalid("No recipients match the selected audience"));
        }

        let segments = segment_count(req.message.chars().count());
        let total_cost = segments as f64 * audience.len() as f64 * COST_PER_SEGMENT;
        let targeted_lists = req.target_list_ids.len() + req.exclude_list_ids.len();

        // Header + targets + links are analytics; their failure must not
        // block the send.
        let (broadcast_id, draft) = {
            let db = self.db.clone();
            let req = req.clone();
            let base_url = self.base_url.clone();
            run_blocking(move || {
                Ok(prepare_tracking(
                    &db,
                    &req.message,
                    req.campaign_name.as_deref(),
                    req.target_all,
                    &req.target_list_ids,
                    &req.exclude_list_ids,
                    req.approved_links.as_deref(),
                    total_cost,
                    &base_url,
                ))
            })
            .await?
        };

        let mut outcome = BroadcastOutcome {
            broadcast_id: broadcast_id.clone(),
            campaign_name: req.campaign_name.clone(),
            sent_to: 0,
            failed: 0,
            total_cost,
            segment_count: segments,
            links_tracked: draft.links.len(),
            target_all: req.target_all,
            targeted_lists,
            results: Vec::with_capacity(audience.len()),
            errors: Vec::new(),
        };

        for recipient in &audience {
            self.send_one(
                &recipient.phone_number,
                &draft.body,
                broadcast_id.as_deref(),
                &mut outcome,
            )
            .await;
        }

        if let Some(id) = &broadcast_id {
            let db = self.db.clone();
            let id = id.clone();
            let attempted = audience.len() as u32;
            let result =
                run_blocking(move || db.set_broadcast_sent_count(&id, attempted).map_err(Error::from))
                    .await;
            if let Err(e) = result {
                warn!(error = %e, "broadcast_sent_count_update_failed");
            }
        }

        info!(
            broadcast_id = ?outcome.broadcast_id,
            sent_to = outcome.sent_to,
            failed = outcome.failed,
            links_tracked = outcome.links_tracked,
            "broadcast_complete"
        );
        Ok(outcome)
    }

    /// Single-recipient dry run against a real phone. Recorded under a
    /// `[TEST]`-prefixed broadcast so it stays visible in analytics without
    /// being mistaken for a campaign.
    pub async fn execute_test(&self, req: TestBroadcastRequest) -> Result<BroadcastOutcome> {
        validate_draft(&req.message)?;
        let to = phone::canonicalize(&req.phone_number)?;

        let label: String = req.message.chars().take(40).collect();
        let campaign_name = format!("[TEST] {label}");

        let segments = segment_count(req.message.chars().count());
        let total_cost = segments as f64 * COST_PER_SEGMENT;

        let (broadcast_id, draft) = {
            let db = self.db.clone();
            let message = req.message.clone();
            let approved = req.approved_links.clone();
            let campaign_name = campaign_name.clone();
            let base_url = self.base_url.clone();
            run_blocking(move || {
                Ok(prepare_tracking(
                    &db,
                    &message,
                    Some(&campaign_name),
                    false,
                    &[],
                    &[],
                    approved.as_deref(),
                    total_cost,
                    &base_url,
                ))
            })
            .await?
        };

        let mut outcome = BroadcastOutcome {
            broadcast_id: broadcast_id.clone(),
            campaign_name: Some(campaign_name),
            sent_to: 0,
            failed: 0,
            total_cost,
            segment_count: segments,
            links_tracked: draft.links.len(),
            target_all: false,
            targeted_lists: 0,
            results: Vec::with_capacity(1),
            errors: Vec::new(),
        };

        self.send_one(&to, &draft.body, broadcast_id.as_deref(), &mut outcome)
            .await;

        if let Some(id) = &broadcast_id {
            let db = self.db.clone();
            let id = id.clone();
            let result =
                run_blocking(move || db.set_broadcast_sent_count(&id, 1).map_err(Error::from)).await;
            if let Err(e) = result {
                warn!(error = %e, "broadcast_sent_count_update_failed");
            }
        }

        Ok(outcome)
    }

    async fn send_one(
        &self,
        to: &str,
        body: &str,
        broadcast_id: Option<&str>,
        outcome: &mut BroadcastOutcome,
    ) {
        let sent = tokio::time::timeout(SEND_TIMEOUT, self.gateway.send(to, body)).await;
        let record = match sent {
            Ok(Ok(result)) => {
                outcome.sent_to += 1;
                SendRecord {
                    phone_number: to.to_string(),
                    provider_message_id: Some(result.provider_id),
                    status: DeliveryStatus::Sent,
                }
            }
            Ok(Err(e)) => {
                outcome.failed += 1;
                outcome.errors.push(format!("{to}: {e}"));
                SendRecord {
                    phone_number: to.to_string(),
                    provider_message_id: None,
                    status: DeliveryStatus::Failed,
                }
            }
            Err(_) => {
                outcome.failed += 1;
                outcome.errors.push(format!("{to}: send timed out"));
                SendRecord {
                    phone_number: to.to_string(),
                    provider_message_id: None,
                    status: DeliveryStatus::Failed,
                }
            }
        };

        // Per-recipient logging is non-fatal; the send's outcome stands.
        let db = self.db.clone();
        let row = MessageRow {
            id: Uuid::new_v4().to_string(),
            phone_number: record.phone_number.clone(),
            content: body.to_string(),
            direction: Direction::Outbound.as_str().to_string(),
            created_at: Utc::now().to_rfc3339(),
            broadcast_id: broadcast_id.map(String::from),
            provider_message_id: record.provider_message_id.clone(),
            delivery_status: Some(record.status.as_str().to_string()),
        };
        let persisted = run_blocking(move || db.insert_message(&row).map_err(Error::from)).await;
        if let Err(e) = persisted {
            warn!(to, error = %e, "broadcast_message_record_failed");
        }

        outcome.results.push(record);
    }
}

fn validate_draft(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(Error::invalid("Message cannot be empty"));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(Error::invalid(format!(
            "Message exceeds {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(())
}

/// Audience = INCLUDE \ EXCLUDE over active subscribers, in joined_at order.
fn resolve_audience(db: &Database, req: &BroadcastRequest) -> Result<Vec<SubscriberRow>> {
    for list_id in req.target_list_ids.iter().chain(&req.exclude_list_ids) {
        if db.find_list_by_id(list_id)?.is_none() {
            return Err(Error::invalid(format!("Unknown list: {list_id}")));
        }
    }

    let include = if req.target_all || req.target_list_ids.is_empty() {
        db.all_active_subscribers()?
    } else {
        db.active_subscribers_in_lists(&req.target_list_ids)?
    };

    let excluded: HashSet<String> = db
        .subscriber_ids_in_lists(&req.exclude_list_ids)?
        .into_iter()
        .collect();

    Ok(include
        .into_iter()
        .filter(|s| !excluded.contains(&s.id))
        .collect())
}

/// Best-effort analytics setup: broadcast header, target rows, link
/// tokenization. Returns the header id (None when untracked) and the body
/// to send.
#[allow(clippy::too_many_arguments)]
fn prepare_tracking(
    db: &Database,
    message: &str,
    campaign_name: Option<&str>,
    target_all: bool,
    target_list_ids: &[String],
    exclude_list_ids: &[String],
    approved_links: Option<&[String]>,
    total_cost: f64,
    base_url: &str,
) -> (Option<String>, TokenizedDraft) {
    let header = BroadcastRow {
        id: Uuid::new_v4().to_string(),
        name: campaign_name.map(String::from),
        message: message.to_string(),
        sent_count: 0,
        total_cost,
        target_all,
        created_at: Utc::now().to_rfc3339(),
    };

    let broadcast_id = match db.insert_broadcast(&header) {
        Ok(()) => Some(header.id),
        Err(e) => {
            warn!(error = %e, "broadcast_header_insert_failed");
            None
        }
    };

    if let Some(id) = &broadcast_id {
        for list_id in target_list_ids {
            if let Err(e) = db.insert_broadcast_target(id, list_id, TargetType::Include.as_str()) {
                warn!(%list_id, error = %e, "broadcast_target_insert_failed");
            }
        }
        for list_id in exclude_list_ids {
            if let Err(e) = db.insert_broadcast_target(id, list_id, TargetType::Exclude.as_str()) {
                warn!(%list_id, error = %e, "broadcast_target_insert_failed");
            }
        }
    }

    let draft = match &broadcast_id {
        Some(id) => links::tokenize(db, id, message, approved_links, base_url),
        // No header row to hang link records off: send the draft untouched.
        None => TokenizedDraft {
            body: message.to_string(),
            links: Vec::new(),
        },
    };

    (broadcast_id, draft)
}
