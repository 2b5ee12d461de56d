use anyhow::Result;
use rusqlite::OptionalExtension;

use crate::models::KeywordRow;
use crate::Database;

const SELECT: &str =
    "SELECT id, keyword, auto_response, is_active, list_id, created_at FROM keywords";

impl Database {
    pub fn insert_keyword(&self, row: &KeywordRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO keywords (id, keyword, auto_response, is_active, list_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    row.id,
                    row.keyword,
                    row.auto_response,
                    row.is_active,
                    row.list_id,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_keyword(&self, row: &KeywordRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE keywords
                 SET keyword = ?2, auto_response = ?3, is_active = ?4, list_id = ?5
                 WHERE id = ?1",
                rusqlite::params![row.id, row.keyword, row.auto_response, row.is_active, row.list_id],
            )?;
            Ok(())
        })
    }

    pub fn delete_keyword(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM keywords WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn find_keyword_by_id(&self, id: &str) -> Result<Option<KeywordRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(&format!("{SELECT} WHERE id = ?1"))?
                .query_row([id], map_keyword)
                .optional()?;
            Ok(row)
        })
    }

    /// Lookup used by the keyword router: exact match on the persisted
    /// uppercase form, active keywords only.
    pub fn find_active_keyword(&self, keyword: &str) -> Result<Option<KeywordRow>> {
        self.with_conn(|conn| {
            let row = conn
                .prepare(&format!("{SELECT} WHERE keyword = ?1 AND is_active = 1"))?
                .query_row([keyword], map_keyword)
                .optional()?;
            Ok(row)
        })
    }

    /// Collision check for create/update; `exclude_id` makes an update
    /// collide only against OTHER rows.
    pub fn keyword_text_taken(&self, keyword: &str, exclude_id: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let n: u32 = match exclude_id {
                Some(id) => conn.query_row(
                    "SELECT COUNT(*) FROM keywords WHERE keyword = ?1 AND id != ?2",
                    rusqlite::params![keyword, id],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    "SELECT COUNT(*) FROM keywords WHERE keyword = ?1",
                    [keyword],
                    |row| row.get(0),
                )?,
            };
            Ok(n > 0)
        })
    }

    pub fn all_keywords(&self) -> Result<Vec<KeywordRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT} ORDER BY created_at ASC"))?;
            let rows = stmt
                .query_map([], map_keyword)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Uppercase texts of every active keyword, for "Text X or Y" replies.
    pub fn active_keyword_texts(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT keyword FROM keywords WHERE is_active = 1 ORDER BY created_at ASC")?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn map_keyword(row: &rusqlite::Row<'_>) -> rusqlite::Result<KeywordRow> {
    Ok(KeywordRow {
        id: row.get(0)?,
        keyword: row.get(1)?,
        auto_response: row.get(2)?,
        is_active: row.get(3)?,
        list_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}
