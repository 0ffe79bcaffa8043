//! Normalization rules for uniqueness-sensitive fields.
//!
//! Every value that feeds a uniqueness index key or a search field passes
//! through one of these functions, so that "Asha  Rao" and "asha rao" land
//! on the same key. The `#` key separator is stripped unconditionally —
//! normalized values must never be able to forge a key boundary.

/// Lowercase, trim, collapse internal whitespace, strip the key separator.
pub fn normalize_name(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .map(|w| w.replace('#', ""))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Preset and medicine names additionally drop punctuation, keeping only
/// alphanumerics and single spaces.
pub fn normalize_preset_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Emails lowercase and trim; the separator is stripped like everywhere
/// else.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase().replace('#', "")
}

/// Keep only ASCII digits.
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalize a phone number to national format with country-code prefix.
///
/// Ten-digit national numbers get the `91` country code prepended; inputs
/// that already carry it keep their trailing twelve digits. Anything else
/// is stored digits-only as given (front desks key in all sorts of things).
pub fn normalize_phone(raw: &str) -> String {
    let digits = digits_only(raw);
    match digits.len() {
        10 => format!("91{digits}"),
        n if n > 12 => digits[n - 12..].to_string(),
        _ => digits,
    }
}

/// Precomputed filter field for substring patient search: normalized name
/// plus normalized phone in one haystack.
pub fn search_text(name: &str, phone: &str) -> String {
    format!("{} {}", normalize_name(name), normalize_phone(phone))
}
