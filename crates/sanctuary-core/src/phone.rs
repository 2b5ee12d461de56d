//! US phone number canonicalization and display formatting.
//!
//! Canonical storage form is E.164 US: `+1` followed by ten digits.

use crate::error::{Error, Result};

/// Normalize operator- or webhook-supplied input to `+1XXXXXXXXXX`.
///
/// Accepts common formatting (spaces, dashes, dots, parentheses), a bare
/// ten-digit number, or an eleven-digit number with leading country code 1.
pub fn canonicalize(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid("Phone number cannot be empty"));
    }

    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    let has_plus = trimmed.starts_with('+');

    match (digits.len(), has_plus) {
        (10, false) => Ok(format!("+1{digits}")),
        (11, _) if digits.starts_with('1') => Ok(format!("+{digits}")),
        _ => Err(Error::invalid(format!(
            "Invalid US phone number: {trimmed}"
        ))),
    }
}

/// Whether a string is already in canonical `+1XXXXXXXXXX` form.
pub fn is_canonical(phone: &str) -> bool {
    let rest = match phone.strip_prefix("+1") {
        Some(rest) => rest,
        None => return false,
    };
    rest.len() == 10 && rest.bytes().all(|b| b.is_ascii_digit())
}

/// Display form `(XXX) XXX-XXXX`. Non-canonical input is returned as-is.
pub fn format_display(phone: &str) -> String {
    match phone.strip_prefix("+1") {
        Some(rest) if rest.len() == 10 && rest.bytes().all(|b| b.is_ascii_digit()) => {
            format!("({}) {}-{}", &rest[..3], &rest[3..6], &rest[6..])
        }
        _ => phone.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_accepts_common_forms() {
        for raw in [
            "+15551234567",
            "15551234567",
            "5551234567",
            "(555) 123-4567",
            "555-123-4567",
            "555.123.4567",
            " +1 555 123 4567 ",
        ] {
            assert_eq!(canonicalize(raw).unwrap(), "+15551234567", "input: {raw}");
        }
    }

    #[test]
    fn canonicalize_rejects_bad_input() {
        for raw in ["", "   ", "555123", "+445551234567", "25551234567", "not a phone"] {
            assert!(canonicalize(raw).is_err(), "input: {raw}");
        }
    }

    #[test]
    fn canonical_form_check() {
        assert!(is_canonical("+15551234567"));
        assert!(!is_canonical("5551234567"));
        assert!(!is_canonical("+1555123456"));
        assert!(!is_canonical("+1555123456a"));
    }

    #[test]
    fn display_grouping() {
        assert_eq!(format_display("+15551234567"), "(555) 123-4567");
        // Non-canonical input passes through untouched.
        assert_eq!(format_display("12345"), "12345");
    }
}
