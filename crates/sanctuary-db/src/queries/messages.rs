use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::models::{ConversationRow, MessageRow};
use crate::Database;

const SELECT: &str = "SELECT id, phone_number, content, direction, created_at,
                             broadcast_id, provider_message_id, delivery_status
                      FROM messages";

/// A subscriber is unread when some inbound message postdates the read
/// watermark. NULL watermark coalesces to '' which sorts before any
/// RFC 3339 timestamp.
const UNREAD_PREDICATE: &str = "EXISTS (
    SELECT 1 FROM messages m
    WHERE m.phone_number = s.phone_number
      AND m.direction = 'INBOUND'
      AND m.created_at > COALESCE(s.last_read_at, ''))";

impl Database {
    pub fn insert_message(&self, row: &MessageRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages
                     (id, phone_number, content, direction, created_at,
                      broadcast_id, provider_message_id, delivery_status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    row.id,
                    row.phone_number,
                    row.content,
                    row.direction,
                    row.created_at,
                    row.broadcast_id,
                    row.provider_message_id,
                    row.delivery_status,
                ],
            )?;
            Ok(())
        })
    }

    pub fn find_message_by_provider_id(&self, provider_id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(&format!("{SELECT} WHERE provider_message_id = ?1"))?
                .query_row([provider_id], map_message)
                .optional()?;
            Ok(row)
        })
    }

    /// Returns whether a row was updated; false means the provider id is
    /// unknown (the message may predate tracking).
    pub fn set_delivery_status(&self, provider_id: &str, status: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE messages SET delivery_status = ?2 WHERE provider_message_id = ?1",
                rusqlite::params![provider_id, status],
            )?;
            Ok(n > 0)
        })
    }

    /// Conversation view: oldest first.
    pub fn messages_for_phone(&self, phone: &str, limit: u32, offset: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{SELECT} WHERE phone_number = ?1 ORDER BY created_at ASC, rowid ASC LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![phone, limit, offset], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn latest_message_for_phone(&self, phone: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(&format!(
                    "{SELECT} WHERE phone_number = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1"
                ))?
                .query_row([phone], map_message)
                .optional()?;
            Ok(row)
        })
    }

    /// Most recent messages across all conversations, for the dashboard feed.
    pub fn recent_messages(&self, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("{SELECT} ORDER BY created_at DESC, rowid DESC LIMIT ?1"))?;
            let rows = stmt
                .query_map([limit], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_messages_since(&self, direction: &str, cutoff: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE direction = ?1 AND created_at >= ?2",
                rusqlite::params![direction, cutoff],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }

    /// Count of active subscribers with at least one unread inbound message.
    pub fn unread_count(&self) -> Result<u32> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                &format!("SELECT COUNT(*) FROM subscribers s WHERE s.is_active = 1 AND {UNREAD_PREDICATE}"),
                [],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }

    /// Count of active subscribers with at least one message either way.
    pub fn conversation_count(&self) -> Result<u32> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM subscribers s
                 WHERE s.is_active = 1
                   AND EXISTS (SELECT 1 FROM messages m WHERE m.phone_number = s.phone_number)",
                [],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }

    /// Inbox conversation headers: active subscribers with message history,
    /// most recently active first. `unread_filter` is `Some(true)` for the
    /// unread view, `Some(false)` for read, `None` for all. `search` is a
    /// phone-number substring.
    pub fn conversations(
        &self,
        unread_filter: Option<bool>,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ConversationRow>> {
        self.with_conn(|conn| {
            let mut sql = format!(
                "SELECT s.id, s.phone_number, {UNREAD_PREDICATE} AS has_unread
                 FROM subscribers s
                 WHERE s.is_active = 1
                   AND EXISTS (SELECT 1 FROM messages m WHERE m.phone_number = s.phone_number)"
            );
            match unread_filter {
                Some(true) => sql.push_str(&format!(" AND {UNREAD_PREDICATE}")),
                Some(false) => sql.push_str(&format!(" AND NOT {UNREAD_PREDICATE}")),
                None => {}
            }
            if search.is_some() {
                sql.push_str(" AND s.phone_number LIKE '%' || ?1 || '%'");
            }
            sql.push_str(
                " ORDER BY (SELECT MAX(m.created_at) FROM messages m
                            WHERE m.phone_number = s.phone_number) DESC",
            );

            let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<ConversationRow> {
                Ok(ConversationRow {
                    subscriber_id: row.get(0)?,
                    phone_number: row.get(1)?,
                    has_unread: row.get(2)?,
                })
            };

            let rows = match search {
                Some(q) => {
                    sql.push_str(" LIMIT ?2 OFFSET ?3");
                    let mut stmt = conn.prepare(&sql)?;
                    let result = stmt
                        .query_map(rusqlite::params![q, limit, offset], map)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    result
                }
                None => {
                    sql.push_str(" LIMIT ?1 OFFSET ?2");
                    let mut stmt = conn.prepare(&sql)?;
                    let result = stmt
                        .query_map(rusqlite::params![limit, offset], map)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    result
                }
            };
            Ok(rows)
        })
    }
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        content: row.get(2)?,
        direction: row.get(3)?,
        created_at: row.get(4)?,
        broadcast_id: row.get(5)?,
        provider_message_id: row.get(6)?,
        delivery_status: row.get(7)?,
    })
}
