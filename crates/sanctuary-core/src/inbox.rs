//! Inbox projection: unread counts and conversation listings derived from
//! message history and each subscriber's read watermark.

use std::sync::Arc;

use chrono::Utc;

use sanctuary_db::models::MessageRow;
use sanctuary_db::Database;

use crate::error::{Error, Result};
use crate::task::run_blocking;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InboxFilter {
    #[default]
    All,
    Unread,
    Read,
}

impl InboxFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(InboxFilter::All),
            "unread" => Some(InboxFilter::Unread),
            "read" => Some(InboxFilter::Read),
            _ => None,
        }
    }

    fn unread_filter(self) -> Option<bool> {
        match self {
            InboxFilter::All => None,
            InboxFilter::Unread => Some(true),
            InboxFilter::Read => Some(false),
        }
    }
}

#[derive(Debug)]
pub struct Conversation {
    pub subscriber_id: String,
    pub phone_number: String,
    pub has_unread: bool,
    pub last_message: Option<MessageRow>,
}

#[derive(Debug, Clone, Copy)]
pub struct InboxCounts {
    pub unread: u32,
    pub conversations: u32,
}

pub struct InboxProjector {
    db: Arc<Database>,
}

impl InboxProjector {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn counts(&self) -> Result<InboxCounts> {
        let db = self.db.clone();
        run_blocking(move || {
            Ok(InboxCounts {
                unread: db.unread_count()?,
                conversations: db.conversation_count()?,
            })
        })
        .await
    }

    pub async fn list(
        &self,
        filter: InboxFilter,
        search: Option<String>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Conversation>> {
        let db = self.db.clone();
        run_blocking(move || {
            let headers =
                db.conversations(filter.unread_filter(), search.as_deref(), limit, offset)?;
            headers
                .into_iter()
                .map(|header| {
                    let last_message = db.latest_message_for_phone(&header.phone_number)?;
                    Ok(Conversation {
                        subscriber_id: header.subscriber_id,
                        phone_number: header.phone_number,
                        has_unread: header.has_unread,
                        last_message,
                    })
                })
                .collect()
        })
        .await
    }

    /// Idempotent up to the monotonic watermark timestamp.
    pub async fn mark_read(&self, subscriber_id: &str) -> Result<()> {
        let db = self.db.clone();
        let id = subscriber_id.to_string();
        run_blocking(move || {
            require_subscriber(&db, &id)?;
            let now = Utc::now().to_rfc3339();
            db.set_last_read_at(&id, Some(&now))?;
            Ok(())
        })
        .await
    }

    /// Clears the watermark so every inbound message counts as unread again.
    pub async fn mark_unread(&self, subscriber_id: &str) -> Result<()> {
        let db = self.db.clone();
        let id = subscriber_id.to_string();
        run_blocking(move || {
            require_subscriber(&db, &id)?;
            db.set_last_read_at(&id, None)?;
            Ok(())
        })
        .await
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        let db = self.db.clone();
        run_blocking(move || {
            let now = Utc::now().to_rfc3339();
            db.mark_all_read(&now)?;
            Ok(())
        })
        .await
    }
}

fn require_subscriber(db: &Database, id: &str) -> Result<()> {
    db.find_subscriber_by_id(id)?
        .map(|_| ())
        .ok_or_else(|| Error::not_found(format!("Subscriber not found: {id}")))
}
