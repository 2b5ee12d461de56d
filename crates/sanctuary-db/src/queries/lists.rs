use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::models::{ListRow, MemberDetailRow};
use crate::Database;

impl Database {
    pub fn insert_list(&self, row: &ListRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO lists (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![row.id, row.name, row.description, row.created_at],
            )?;
            Ok(())
        })
    }

    pub fn find_list_by_id(&self, id: &str) -> Result<Option<ListRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare("SELECT id, name, description, created_at FROM lists WHERE id = ?1")?
                .query_row([id], map_list)
                .optional()?;
            Ok(row)
        })
    }

    pub fn find_list_by_name(&self, name: &str) -> Result<Option<ListRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare("SELECT id, name, description, created_at FROM lists WHERE name = ?1")?
                .query_row([name], map_list)
                .optional()?;
            Ok(row)
        })
    }

    /// Every list with its member count, newest first.
    pub fn all_lists_with_counts(&self) -> Result<Vec<(ListRow, u32)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT l.id, l.name, l.description, l.created_at,
                        (SELECT COUNT(*) FROM list_members m WHERE m.list_id = l.id)
                 FROM lists l
                 ORDER BY l.created_at DESC",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((map_list(row)?, row.get(4)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Removes memberships first; list_members has no ON DELETE CASCADE.
    /// Callers must check for referencing keywords before deleting.
    pub fn delete_list(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM list_members WHERE list_id = ?1", [id])?;
            conn.execute("DELETE FROM lists WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Idempotent enrollment: re-inserting an existing (subscriber, list)
    /// pair is a no-op. Returns whether a new membership was created.
    pub fn insert_membership(
        &self,
        subscriber_id: &str,
        list_id: &str,
        joined_via: &str,
        joined_at: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO list_members (subscriber_id, list_id, joined_at, joined_via)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![subscriber_id, list_id, joined_at, joined_via],
            )?;
            Ok(n > 0)
        })
    }

    pub fn remove_membership(&self, subscriber_id: &str, list_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM list_members WHERE subscriber_id = ?1 AND list_id = ?2",
                rusqlite::params![subscriber_id, list_id],
            )?;
            Ok(())
        })
    }

    pub fn members_of_list(&self, list_id: &str) -> Result<Vec<MemberDetailRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.subscriber_id, s.phone_number, m.joined_at, m.joined_via
                 FROM list_members m
                 JOIN subscribers s ON s.id = m.subscriber_id
                 WHERE m.list_id = ?1
                 ORDER BY m.joined_at ASC",
            )?;
            let rows = stmt
                .query_map([list_id], |row| {
                    Ok(MemberDetailRow {
                        subscriber_id: row.get(0)?,
                        phone_number: row.get(1)?,
                        joined_at: row.get(2)?,
                        joined_via: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_names_for_subscriber(&self, subscriber_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT l.name FROM lists l
                 JOIN list_members m ON m.list_id = l.id
                 WHERE m.subscriber_id = ?1
                 ORDER BY l.name ASC",
            )?;
            let rows = stmt
                .query_map([subscriber_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// How many signup keywords auto-enroll into this list. A non-zero
    /// count blocks list deletion.
    pub fn keyword_count_for_list(&self, list_id: &str) -> Result<u32> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM keywords WHERE list_id = ?1",
                [list_id],
                |row| row.get(0),
            )?;
            Ok(n)
        })
    }
}

fn map_list(row: &rusqlite::Row<'_>) -> rusqlite::Result<ListRow> {
    Ok(ListRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}
