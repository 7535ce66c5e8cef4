//! Input rules for registration.

use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Longest email address accepted (RFC 5321 path limit).
pub const MAX_EMAIL_LEN: usize = 254;

// local-part@label.label...; labels may not start or end with a hyphen
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email regex is valid")
});

/// Check an email address against the usual address grammar.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN {
        return false;
    }
    let Some((local, _)) = email.split_once('@') else {
        return false;
    };
    if local.len() > 64 || local.starts_with('.') || local.ends_with('.') || local.contains("..")
    {
        return false;
    }
    EMAIL_RE.is_match(email)
}

/// Whether a password meets the minimum length.
pub fn is_strong_enough(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_addresses() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last+tag@mail.example.co.uk"));
        assert!(is_valid_email("o'brien@example.org"));
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("plainaddress"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("a@localhost"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("a@-x.com"));
        assert!(!is_valid_email(".a@x.com"));
        assert!(!is_valid_email("a..b@x.com"));
        assert!(!is_valid_email("a@x..com"));
    }

    #[test]
    fn test_rejects_overlong_addresses() {
        let local = "a".repeat(65);
        assert!(!is_valid_email(&format!("{local}@x.com")));
        let domain = format!("{}.com", "d".repeat(250));
        assert!(!is_valid_email(&format!("a@{domain}")));
    }

    #[test]
    fn test_password_length_counts_characters() {
        assert!(is_strong_enough("password"));
        assert!(!is_strong_enough("short12"));
        // 8 multi-byte characters
        assert!(is_strong_enough("ééééééé€"));
    }
}
