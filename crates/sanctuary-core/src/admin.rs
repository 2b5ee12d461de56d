//! Administrative operations: keyword and list management, subscriber
//! add / bulk import, and operator replies.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use sanctuary_db::models::{KeywordRow, ListRow, MessageRow, SubscriberRow};
use sanctuary_db::Database;
use sanctuary_types::api::{
    BulkImportEntry, BulkImportOutcome, BulkImportResponse, CreateKeywordRequest,
    CreateListRequest, UpdateKeywordRequest,
};
use sanctuary_types::domain::{DeliveryStatus, Direction};

use crate::error::{Error, Result};
use crate::gateway::SmsGateway;
use crate::phone;
use crate::task::run_blocking;

/// Largest accepted bulk import batch.
pub const MAX_BULK_IMPORT: usize = 5000;

// -- Keywords --

pub async fn create_keyword(db: Arc<Database>, req: CreateKeywordRequest) -> Result<KeywordRow> {
    run_blocking(move || {
        let keyword = normalize_keyword(&req.keyword)?;
        if req.auto_response.trim().is_empty() {
            return Err(Error::invalid("Auto-response cannot be empty"));
        }
        if let Some(list_id) = &req.list_id {
            require_list(&db, list_id)?;
        }
        if db.keyword_text_taken(&keyword, None)? {
            return Err(Error::conflict(format!("Keyword already exists: {keyword}")));
        }

        let row = KeywordRow {
            id: Uuid::new_v4().to_string(),
            keyword,
            auto_response: req.auto_response,
            is_active: req.is_active,
            list_id: req.list_id,
            created_at: Utc::now().to_rfc3339(),
        };
        db.insert_keyword(&row)?;
        Ok(row)
    })
    .await
}

pub async fn update_keyword(
    db: Arc<Database>,
    id: String,
    req: UpdateKeywordRequest,
) -> Result<KeywordRow> {
    run_blocking(move || {
        let mut row = db
            .find_keyword_by_id(&id)?
            .ok_or_else(|| Error::not_found(format!("Keyword not found: {id}")))?;

        if let Some(text) = req.keyword {
            let normalized = normalize_keyword(&text)?;
            // Renaming collides only against OTHER rows.
            if db.keyword_text_taken(&normalized, Some(&id))? {
                return Err(Error::conflict(format!(
                    "Keyword already exists: {normalized}"
                )));
            }
            row.keyword = normalized;
        }
        if let Some(auto_response) = req.auto_response {
            if auto_response.trim().is_empty() {
                return Err(Error::invalid("Auto-response cannot be empty"));
            }
            row.auto_response = auto_response;
        }
        if let Some(list_id) = req.list_id {
            if let Some(list_id) = &list_id {
                require_list(&db, list_id)?;
            }
            row.list_id = list_id;
        }
        if let Some(is_active) = req.is_active {
            row.is_active = is_active;
        }

        db.update_keyword(&row)?;
        Ok(row)
    })
    .await
}

pub async fn delete_keyword(db: Arc<Database>, id: String) -> Result<()> {
    run_blocking(move || {
        db.find_keyword_by_id(&id)?
            .ok_or_else(|| Error::not_found(format!("Keyword not found: {id}")))?;
        db.delete_keyword(&id)?;
        Ok(())
    })
    .await
}

// -- Lists --

pub async fn create_list(db: Arc<Database>, req: CreateListRequest) -> Result<ListRow> {
    run_blocking(move || {
        let name = req.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::invalid("List name cannot be empty"));
        }
        if db.find_list_by_name(&name)?.is_some() {
            return Err(Error::conflict(format!("List already exists: {name}")));
        }

        let row = ListRow {
            id: Uuid::new_v4().to_string(),
            name,
            description: req.description,
            created_at: Utc::now().to_rfc3339(),
        };
        db.insert_list(&row)?;
        Ok(row)
    })
    .await
}

/// Deletion is blocked while any signup keyword auto-enrolls into the list;
/// the store does not cascade, so the check lives here.
pub async fn delete_list(db: Arc<Database>, id: String) -> Result<()> {
    run_blocking(move || {
        require_list(&db, &id)?;
        let referencing = db.keyword_count_for_list(&id)?;
        if referencing > 0 {
            return Err(Error::conflict(format!(
                "List is referenced by {referencing} signup keyword(s)"
            )));
        }
        db.delete_list(&id)?;
        Ok(())
    })
    .await
}

// -- Subscribers --

/// Explicit admin add. Unlike keyword opt-in, adding a number that already
/// exists is a conflict.
pub async fn add_subscriber(
    db: Arc<Database>,
    raw_phone: String,
    list_id: Option<String>,
) -> Result<SubscriberRow> {
    run_blocking(move || {
        let phone = phone::canonicalize(&raw_phone)?;
        if db.find_subscriber_by_phone(&phone)?.is_some() {
            return Err(Error::conflict(format!("Subscriber already exists: {phone}")));
        }
        if let Some(list_id) = &list_id {
            require_list(&db, list_id)?;
        }

        let now = Utc::now().to_rfc3339();
        let row = SubscriberRow {
            id: Uuid::new_v4().to_string(),
            phone_number: phone,
            is_active: true,
            joined_at: now.clone(),
            last_read_at: None,
            joined_via_keyword: None,
            notifier_thread_ref: None,
        };
        let created = db.insert_subscriber(&row)?;

        if let Some(list_id) = &list_id {
            db.insert_membership(&created.id, list_id, "manual", &now)?;
        }
        Ok(created)
    })
    .await
}

pub async fn deactivate_subscriber(db: Arc<Database>, id: String) -> Result<()> {
    run_blocking(move || {
        db.find_subscriber_by_id(&id)?
            .ok_or_else(|| Error::not_found(format!("Subscriber not found: {id}")))?;
        db.deactivate_subscriber(&id)?;
        Ok(())
    })
    .await
}

/// Bulk import with per-entry outcomes. Duplicates are skipped but still
/// enrolled when a list is given, so re-importing a roster into a new list
/// works.
pub async fn bulk_import(
    db: Arc<Database>,
    raw_numbers: Vec<String>,
    list_id: Option<String>,
) -> Result<BulkImportResponse> {
    if raw_numbers.len() > MAX_BULK_IMPORT {
        return Err(Error::invalid(format!(
            "At most {MAX_BULK_IMPORT} numbers per import"
        )));
    }

    run_blocking(move || {
        if let Some(list_id) = &list_id {
            require_list(&db, list_id)?;
        }

        let mut response = BulkImportResponse {
            added: 0,
            skipped_duplicate: 0,
            rejected_invalid_format: 0,
            entries: Vec::with_capacity(raw_numbers.len()),
        };

        for raw in raw_numbers {
            let phone = match phone::canonicalize(&raw) {
                Ok(phone) => phone,
                Err(_) => {
                    response.rejected_invalid_format += 1;
                    response.entries.push(BulkImportEntry {
                        phone_number: raw,
                        outcome: BulkImportOutcome::RejectedInvalidFormat,
                    });
                    continue;
                }
            };

            let now = Utc::now().to_rfc3339();
            let (subscriber_id, outcome) = match db.find_subscriber_by_phone(&phone)? {
                Some(existing) => (existing.id, BulkImportOutcome::SkippedDuplicate),
                None => {
                    let row = SubscriberRow {
                        id: Uuid::new_v4().to_string(),
                        phone_number: phone.clone(),
                        is_active: true,
                        joined_at: now.clone(),
                        last_read_at: None,
                        joined_via_keyword: None,
                        notifier_thread_ref: None,
                    };
                    let created = db.insert_subscriber(&row)?;
                    (created.id, BulkImportOutcome::Added)
                }
            };

            if let Some(list_id) = &list_id {
                db.insert_membership(&subscriber_id, list_id, "bulk-import", &now)?;
            }

            match outcome {
                BulkImportOutcome::Added => response.added += 1,
                BulkImportOutcome::SkippedDuplicate => response.skipped_duplicate += 1,
                BulkImportOutcome::RejectedInvalidFormat => {}
            }
            response.entries.push(BulkImportEntry {
                phone_number: phone,
                outcome,
            });
        }

        Ok(response)
    })
    .await
}

/// Operator-composed reply to one subscriber. The send is the fatal path;
/// recording and the read-watermark bump are best-effort.
pub async fn send_reply(
    db: Arc<Database>,
    gateway: Arc<dyn SmsGateway>,
    subscriber_id: String,
    message: String,
) -> Result<MessageRow> {
    if message.trim().is_empty() {
        return Err(Error::invalid("Message cannot be empty"));
    }

    let subscriber = {
        let db = db.clone();
        let id = subscriber_id.clone();
        run_blocking(move || {
            db.find_subscriber_by_id(&id)?
                .ok_or_else(|| Error::not_found(format!("Subscriber not found: {id}")))
        })
        .await?
    };

    let outcome = gateway.send(&subscriber.phone_number, &message).await?;

    let row = MessageRow {
        id: Uuid::new_v4().to_string(),
        phone_number: subscriber.phone_number.clone(),
        content: message,
        direction: Direction::Outbound.as_str().to_string(),
        created_at: Utc::now().to_rfc3339(),
        broadcast_id: None,
        provider_message_id: Some(outcome.provider_id),
        delivery_status: Some(DeliveryStatus::Sent.as_str().to_string()),
    };

    {
        let db = db.clone();
        let row = row.clone();
        let result = run_blocking(move || db.insert_message(&row).map_err(Error::from)).await;
        if let Err(e) = result {
            warn!(error = %e, "reply_record_failed");
        }
    }

    // Replying means the operator has seen the conversation.
    {
        let now = Utc::now().to_rfc3339();
        let result = run_blocking(move || {
            db.set_last_read_at(&subscriber_id, Some(&now))
                .map_err(Error::from)
        })
        .await;
        if let Err(e) = result {
            warn!(error = %e, "reply_mark_read_failed");
        }
    }

    Ok(row)
}

fn normalize_keyword(raw: &str) -> Result<String> {
    let keyword = raw.trim().to_uppercase();
    if keyword.is_empty() {
        return Err(Error::invalid("Keyword cannot be empty"));
    }
    Ok(keyword)
}

fn require_list(db: &Database, id: &str) -> Result<ListRow> {
    db.find_list_by_id(id)?
        .ok_or_else(|| Error::invalid(format!("Unknown list: {id}")))
}
