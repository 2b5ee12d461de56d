//! Link shortening for broadcast drafts.
//!
//! Approved URLs in a draft are replaced with `<base>/sanctuary/<code>`
//! trackable short links tied to the broadcast. Tokenization never fails a
//! send: if link rows cannot be persisted, the original draft goes out
//! unshortened and zero links are recorded.

use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;
use tracing::warn;
use uuid::Uuid;

use sanctuary_db::models::LinkRow;
use sanctuary_db::Database;

pub const SHORT_CODE_LEN: usize = 8;

/// Bounded retries when a freshly minted code collides with an existing row.
const MAX_MINT_ATTEMPTS: u32 = 10;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://[^\s]+").expect("static pattern"))
}

/// URLs in order of first appearance, deduplicated.
pub fn extract_urls(body: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for m in url_pattern().find_iter(body) {
        let url = m.as_str();
        if !seen.iter().any(|u| u == url) {
            seen.push(url.to_string());
        }
    }
    seen
}

pub fn mint_short_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SHORT_CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug)]
pub struct TokenizedDraft {
    pub body: String,
    pub links: Vec<LinkRow>,
}

/// Rewrite `draft` for sending under `broadcast_id`.
///
/// Only URLs in `approved` are shortened; with `approved` absent every
/// extracted URL is. Multiple occurrences of one URL share a single short
/// code. Persistence failures downgrade to the original body.
pub fn tokenize(
    db: &Database,
    broadcast_id: &str,
    draft: &str,
    approved: Option<&[String]>,
    base_url: &str,
) -> TokenizedDraft {
    let urls = extract_urls(draft);
    let mut rows = Vec::new();
    let mut body = draft.to_string();

    for url in &urls {
        if let Some(approved) = approved {
            if !approved.iter().any(|a| a == url) {
                continue;
            }
        }

        let short_code = match mint_unique_code(db) {
            Some(code) => code,
            None => {
                warn!(broadcast_id, %url, "short_code_mint_exhausted");
                return TokenizedDraft {
                    body: draft.to_string(),
                    links: Vec::new(),
                };
            }
        };

        body = body.replace(url, &format!("{base_url}/sanctuary/{short_code}"));
        rows.push(LinkRow {
            id: Uuid::new_v4().to_string(),
            broadcast_id: broadcast_id.to_string(),
            original_url: url.clone(),
            short_code,
        });
    }

    if rows.is_empty() {
        return TokenizedDraft {
            body,
            links: Vec::new(),
        };
    }

    match db.insert_links(&rows) {
        Ok(()) => TokenizedDraft { body, links: rows },
        Err(e) => {
            // Analytics downgrade, never a send failure.
            warn!(broadcast_id, error = %e, "link_persist_failed");
            TokenizedDraft {
                body: draft.to_string(),
                links: Vec::new(),
            }
        }
    }
}

fn mint_unique_code(db: &Database) -> Option<String> {
    for _ in 0..MAX_MINT_ATTEMPTS {
        let code = mint_short_code();
        match db.short_code_exists(&code) {
            Ok(false) => return Some(code),
            Ok(true) => continue,
            Err(e) => {
                warn!(error = %e, "short_code_lookup_failed");
                return None;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sanctuary_db::models::BroadcastRow;

    fn setup_broadcast(db: &Database) -> String {
        let row = BroadcastRow {
            id: Uuid::new_v4().to_string(),
            name: None,
            message: "draft".into(),
            sent_count: 0,
            total_cost: 0.0,
            target_all: true,
            created_at: Utc::now().to_rfc3339(),
        };
        db.insert_broadcast(&row).unwrap();
        row.id
    }

    #[test]
    fn extracts_in_order_without_duplicates() {
        let urls = extract_urls(
            "go to https://a.example/x then http://b.example and again https://a.example/x",
        );
        assert_eq!(urls, vec!["https://a.example/x", "http://b.example"]);
    }

    #[test]
    fn short_codes_are_eight_alphanumerics() {
        for _ in 0..50 {
            let code = mint_short_code();
            assert_eq!(code.len(), SHORT_CODE_LEN);
            assert!(code.bytes().all(|b| b.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn approved_url_is_rewritten_and_persisted() {
        let db = Database::open_in_memory().unwrap();
        let broadcast_id = setup_broadcast(&db);

        let approved = vec!["https://example.com/x".to_string()];
        let result = tokenize(
            &db,
            &broadcast_id,
            "See https://example.com/x",
            Some(&approved),
            "https://sanctuary.example",
        );

        assert_eq!(result.links.len(), 1);
        let code = &result.links[0].short_code;
        assert_eq!(
            result.body,
            format!("See https://sanctuary.example/sanctuary/{code}")
        );

        let stored = db.find_link_by_short_code(code).unwrap().unwrap();
        assert_eq!(stored.original_url, "https://example.com/x");
        assert_eq!(stored.broadcast_id, broadcast_id);
    }

    #[test]
    fn unapproved_url_left_verbatim() {
        let db = Database::open_in_memory().unwrap();
        let broadcast_id = setup_broadcast(&db);

        let approved: Vec<String> = vec![];
        let draft = "See https://example.com/x";
        let result = tokenize(&db, &broadcast_id, draft, Some(&approved), "https://s.example");

        assert_eq!(result.body, draft);
        assert!(result.links.is_empty());
    }

    #[test]
    fn repeated_url_shares_one_code() {
        let db = Database::open_in_memory().unwrap();
        let broadcast_id = setup_broadcast(&db);

        let result = tokenize(
            &db,
            &broadcast_id,
            "https://example.com/x and again https://example.com/x",
            None,
            "https://s.example",
        );

        assert_eq!(result.links.len(), 1);
        let code = &result.links[0].short_code;
        let expected = format!(
            "https://s.example/sanctuary/{code} and again https://s.example/sanctuary/{code}"
        );
        assert_eq!(result.body, expected);
    }

    #[test]
    fn persistence_failure_falls_back_to_original_body() {
        let db = Database::open_in_memory().unwrap();
        // No broadcast row: the foreign key on links.broadcast_id fails.
        let draft = "See https://example.com/x";
        let result = tokenize(&db, "missing-broadcast", draft, None, "https://s.example");

        assert_eq!(result.body, draft);
        assert!(result.links.is_empty());
    }
}
