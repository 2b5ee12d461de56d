use anyhow::Result;

use crate::models::AppConfigRow;
use crate::Database;

impl Database {
    /// The config row is seeded by migration v1 and never deleted.
    pub fn get_app_config(&self) -> Result<AppConfigRow> {
        self.with_conn(|conn| {
            let row = conn.query_row(
                "SELECT default_welcome_message, legacy_opt_in_keyword,
                        legacy_welcome_response, legacy_already_subscribed_response
                 FROM app_config WHERE id = 1",
                [],
                |row| {
                    Ok(AppConfigRow {
                        default_welcome_message: row.get(0)?,
                        legacy_opt_in_keyword: row.get(1)?,
                        legacy_welcome_response: row.get(2)?,
                        legacy_already_subscribed_response: row.get(3)?,
                    })
                },
            )?;
            Ok(row)
        })
    }

    pub fn update_app_config(&self, row: &AppConfigRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE app_config
                 SET default_welcome_message = ?1,
                     legacy_opt_in_keyword = ?2,
                     legacy_welcome_response = ?3,
                     legacy_already_subscribed_response = ?4
                 WHERE id = 1",
                rusqlite::params![
                    row.default_welcome_message,
                    row.legacy_opt_in_keyword,
                    row.legacy_welcome_response,
                    row.legacy_already_subscribed_response,
                ],
            )?;
            Ok(())
        })
    }
}
