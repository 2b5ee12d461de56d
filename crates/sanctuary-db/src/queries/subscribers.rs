use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::models::SubscriberRow;
use crate::Database;

impl Database {
    /// Insert a new active subscriber. On a phone-number collision (two
    /// concurrent opt-in webhooks racing) the existing row is reactivated
    /// instead, so the caller always ends up with an active subscriber.
    pub fn insert_subscriber(&self, row: &SubscriberRow) -> Result<SubscriberRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO subscribers
                     (id, phone_number, is_active, joined_at, last_read_at,
                      joined_via_keyword, notifier_thread_ref)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(phone_number) DO UPDATE SET
                     is_active = 1,
                     joined_via_keyword = excluded.joined_via_keyword",
                rusqlite::params![
                    row.id,
                    row.phone_number,
                    row.is_active,
                    row.joined_at,
                    row.last_read_at,
                    row.joined_via_keyword,
                    row.notifier_thread_ref,
                ],
            )?;
            query_by_phone(conn, &row.phone_number)?
                .ok_or_else(|| anyhow::anyhow!("subscriber vanished after insert"))
        })
    }

    pub fn find_subscriber_by_phone(&self, phone: &str) -> Result<Option<SubscriberRow>> {
        self.with_conn(|conn| query_by_phone(conn, phone))
    }

    pub fn find_subscriber_by_id(&self, id: &str) -> Result<Option<SubscriberRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(&select("WHERE id = ?1"))?
                .query_row([id], map_subscriber)
                .optional()?;
            Ok(row)
        })
    }

    pub fn deactivate_subscriber(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("UPDATE subscribers SET is_active = 0 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn reactivate_subscriber(&self, id: &str, via_keyword: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE subscribers SET is_active = 1, joined_via_keyword = ?2 WHERE id = ?1",
                rusqlite::params![id, via_keyword],
            )?;
            Ok(())
        })
    }

    /// `None` clears the watermark (mark-unread).
    pub fn set_last_read_at(&self, id: &str, at: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE subscribers SET last_read_at = ?2 WHERE id = ?1",
                rusqlite::params![id, at],
            )?;
            Ok(())
        })
    }

    pub fn mark_all_read(&self, at: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("UPDATE subscribers SET last_read_at = ?1", [at])?;
            Ok(())
        })
    }

    /// First-write-wins: only stores the thread ref if none is set yet.
    /// Returns whether this call established the ref.
    pub fn set_thread_ref_if_unset(&self, id: &str, thread_ref: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE subscribers SET notifier_thread_ref = ?2
                 WHERE id = ?1 AND notifier_thread_ref IS NULL",
                rusqlite::params![id, thread_ref],
            )?;
            Ok(n > 0)
        })
    }

    pub fn list_subscribers(&self, limit: u32, offset: u32) -> Result<Vec<SubscriberRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&select("ORDER BY joined_at DESC LIMIT ?1 OFFSET ?2"))?;
            let rows = stmt
                .query_map(rusqlite::params![limit, offset], map_subscriber)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// All active subscribers in stable audience order (joined_at asc).
    pub fn all_active_subscribers(&self) -> Result<Vec<SubscriberRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&select("WHERE is_active = 1 ORDER BY joined_at ASC, id ASC"))?;
            let rows = stmt
                .query_map([], map_subscriber)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Active subscribers holding a membership in any of the given lists,
    /// in stable audience order. Empty input yields an empty set.
    pub fn active_subscribers_in_lists(&self, list_ids: &[String]) -> Result<Vec<SubscriberRow>> {
        if list_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let placeholders = placeholders(list_ids.len());
            let sql = format!(
                "SELECT DISTINCT s.id, s.phone_number, s.is_active, s.joined_at,
                        s.last_read_at, s.joined_via_keyword, s.notifier_thread_ref
                 FROM subscribers s
                 JOIN list_members m ON m.subscriber_id = s.id
                 WHERE s.is_active = 1 AND m.list_id IN ({placeholders})
                 ORDER BY s.joined_at ASC, s.id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(list_ids), map_subscriber)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Ids of every subscriber (active or not) belonging to any given list.
    pub fn subscriber_ids_in_lists(&self, list_ids: &[String]) -> Result<Vec<String>> {
        if list_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let placeholders = placeholders(list_ids.len());
            let sql = format!(
                "SELECT DISTINCT subscriber_id FROM list_members WHERE list_id IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(list_ids), |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// (total, active) subscriber counts.
    pub fn subscriber_counts(&self) -> Result<(u32, u32)> {
        self.with_conn(|conn| {
            let row = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_active), 0) FROM subscribers",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(row)
        })
    }
}

fn select(suffix: &str) -> String {
    format!(
        "SELECT id, phone_number, is_active, joined_at, last_read_at,
                joined_via_keyword, notifier_thread_ref
         FROM subscribers {suffix}"
    )
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn query_by_phone(conn: &Connection, phone: &str) -> Result<Option<SubscriberRow>> {
    let row = conn
        .prepare(&select("WHERE phone_number = ?1"))?
        .query_row([phone], map_subscriber)
        .optional()?;
    Ok(row)
}

fn map_subscriber(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubscriberRow> {
    Ok(SubscriberRow {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        is_active: row.get(2)?,
        joined_at: row.get(3)?,
        last_read_at: row.get(4)?,
        joined_via_keyword: row.get(5)?,
        notifier_thread_ref: row.get(6)?,
    })
}
