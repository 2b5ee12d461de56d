//! Keyword routing: classify an inbound body into an intent.
//!
//! Pure aside from the keyword lookup the caller injects, so the
//! classification rules are testable without a database.

use sanctuary_db::models::KeywordRow;

use crate::error::Result;

/// Fixed opt-out tokens. These win over keyword matches even if an admin
/// creates a keyword literally named STOP.
pub const OPT_OUT_TOKENS: &[&str] = &["STOP", "UNSUBSCRIBE"];

#[derive(Debug)]
pub enum Intent {
    /// Body matched an active signup keyword.
    OptIn(KeywordRow),
    /// Body was one of the fixed opt-out tokens.
    OptOut,
    /// Anything else; the raw body is preserved for downstream use.
    Conversational,
}

/// Classify `body`. `lookup` receives the normalized (trimmed, uppercased)
/// form and returns the matching keyword row, if any.
pub fn route<F>(body: &str, lookup: F) -> Result<Intent>
where
    F: FnOnce(&str) -> Result<Option<KeywordRow>>,
{
    let normalized = body.trim().to_uppercase();

    if OPT_OUT_TOKENS.contains(&normalized.as_str()) {
        return Ok(Intent::OptOut);
    }

    if let Some(keyword) = lookup(&normalized)? {
        if keyword.is_active {
            return Ok(Intent::OptIn(keyword));
        }
    }

    Ok(Intent::Conversational)
}
