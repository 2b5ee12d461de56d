use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::models::{BroadcastRow, DeliveryCounts};
use crate::Database;

const SELECT: &str = "SELECT id, name, message, sent_count, total_cost, target_all, created_at
                      FROM broadcasts";

impl Database {
    pub fn insert_broadcast(&self, row: &BroadcastRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO broadcasts (id, name, message, sent_count, total_cost, target_all, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    row.id,
                    row.name,
                    row.message,
                    row.sent_count,
                    row.total_cost,
                    row.target_all,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Recorded after fan-out completes: how many recipients were attempted.
    pub fn set_broadcast_sent_count(&self, id: &str, sent_count: u32) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE broadcasts SET sent_count = ?2 WHERE id = ?1",
                rusqlite::params![id, sent_count],
            )?;
            Ok(())
        })
    }

    pub fn insert_broadcast_target(
        &self,
        broadcast_id: &str,
        list_id: &str,
        target_type: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO broadcast_targets (broadcast_id, list_id, target_type)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![broadcast_id, list_id, target_type],
            )?;
            Ok(())
        })
    }

    pub fn find_broadcast_by_id(&self, id: &str) -> Result<Option<BroadcastRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(&format!("{SELECT} WHERE id = ?1"))?
                .query_row([id], map_broadcast)
                .optional()?;
            Ok(row)
        })
    }

    pub fn all_broadcasts(&self) -> Result<Vec<BroadcastRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT} ORDER BY created_at DESC"))?;
            let rows = stmt
                .query_map([], map_broadcast)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn broadcast_count(&self) -> Result<u32> {
        self.with_conn(|conn| {
            let n = conn.query_row("SELECT COUNT(*) FROM broadcasts", [], |row| row.get(0))?;
            Ok(n)
        })
    }

    /// Delivery funnel from the outbound message rows of one broadcast.
    pub fn delivery_counts_for_broadcast(&self, broadcast_id: &str) -> Result<DeliveryCounts> {
        self.with_conn(|conn| {
            let counts = conn.query_row(
                "SELECT
                     COALESCE(SUM(delivery_status = 'DELIVERED'), 0),
                     COALESCE(SUM(delivery_status = 'UNDELIVERED'), 0),
                     COALESCE(SUM(delivery_status = 'FAILED'), 0)
                 FROM messages WHERE broadcast_id = ?1",
                [broadcast_id],
                |row| {
                    Ok(DeliveryCounts {
                        delivered: row.get(0)?,
                        undelivered: row.get(1)?,
                        failed: row.get(2)?,
                    })
                },
            )?;
            Ok(counts)
        })
    }

    pub fn click_count_for_broadcast(&self, broadcast_id: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM link_clicks c
                 JOIN links l ON l.id = c.link_id
                 WHERE l.broadcast_id = ?1",
                [broadcast_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }
}

fn map_broadcast(row: &rusqlite::Row<'_>) -> rusqlite::Result<BroadcastRow> {
    Ok(BroadcastRow {
        id: row.get(0)?,
        name: row.get(1)?,
        message: row.get(2)?,
        sent_count: row.get(3)?,
        total_cost: row.get(4)?,
        target_all: row.get(5)?,
        created_at: row.get(6)?,
    })
}
