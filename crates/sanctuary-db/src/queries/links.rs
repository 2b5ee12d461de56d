use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::models::LinkRow;
use crate::Database;

impl Database {
    pub fn insert_link(&self, row: &LinkRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO links (id, broadcast_id, original_url, short_code)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![row.id, row.broadcast_id, row.original_url, row.short_code],
            )?;
            Ok(())
        })
    }

    /// All-or-nothing insert for the links of one tokenized draft. On any
    /// failure (short-code collision included) no rows are kept.
    pub fn insert_links(&self, rows: &[LinkRow]) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute_batch("BEGIN IMMEDIATE")?;
            for row in rows {
                let inserted = conn.execute(
                    "INSERT INTO links (id, broadcast_id, original_url, short_code)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![row.id, row.broadcast_id, row.original_url, row.short_code],
                );
                if let Err(e) = inserted {
                    conn.execute_batch("ROLLBACK").ok();
                    return Err(e.into());
                }
            }
            conn.execute_batch("COMMIT")?;
            Ok(())
        })
    }

    pub fn find_link_by_short_code(&self, short_code: &str) -> Result<Option<LinkRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(
                    "SELECT id, broadcast_id, original_url, short_code
                     FROM links WHERE short_code = ?1",
                )?
                .query_row([short_code], |row| {
                    Ok(LinkRow {
                        id: row.get(0)?,
                        broadcast_id: row.get(1)?,
                        original_url: row.get(2)?,
                        short_code: row.get(3)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn short_code_exists(&self, short_code: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n: u32 = conn.query_row(
                "SELECT COUNT(*) FROM links WHERE short_code = ?1",
                [short_code],
                |row| row.get(0),
            )?;
            Ok(n > 0)
        })
    }

    pub fn insert_link_click(
        &self,
        id: &str,
        link_id: &str,
        subscriber_id: Option<&str>,
        clicked_at: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO link_clicks (id, link_id, subscriber_id, clicked_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, link_id, subscriber_id, clicked_at],
            )?;
            Ok(())
        })
    }
}
