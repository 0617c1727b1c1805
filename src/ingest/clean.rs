//! Field cleaners applied to raw upload rows before staging.
//!
//! Upstream datasets arrive as loosely-typed text: phone numbers with
//! formatting noise, numeric columns carrying the `N/A` sentinel, and free
//! text that must survive the `COPY ... FROM STDIN` text format. Everything
//! here is pure so the loader can normalize rows without touching the
//! database.

/// Textual sentinel upstream providers use for missing values.
const MISSING_SENTINEL: &str = "n/a";

const SCALE_MILLION: i64 = 1_000_000;
const SCALE_BILLION: i64 = 1_000_000_000;

/// Strip a phone number to digits plus an optional leading `+`.
///
/// Returns `None` when nothing usable remains.
pub fn normalize_phone(raw: Option<&str>) -> Option<String> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(raw.len());
    for (i, c) in raw.chars().enumerate() {
        if c.is_ascii_digit() || (c == '+' && i == 0) {
            out.push(c);
        }
    }

    if out.is_empty() || out == "+" {
        None
    } else {
        Some(out)
    }
}

/// Parse an integer-like field with strict digit validation.
///
/// Empty strings and the missing sentinel are absent; anything containing a
/// non-digit character is treated as absent rather than guessed at.
pub fn parse_count(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if is_missing(raw) {
        return None;
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Parse a currency-scaled integer, accepting a trailing `M` or `B` suffix.
pub fn parse_scaled(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if is_missing(raw) {
        return None;
    }

    let (digits, scale) = match raw.as_bytes().last() {
        Some(b'M') | Some(b'm') => (&raw[..raw.len() - 1], SCALE_MILLION),
        Some(b'B') | Some(b'b') => (&raw[..raw.len() - 1], SCALE_BILLION),
        _ => (raw, 1),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    digits.parse::<i64>().ok()?.checked_mul(scale)
}

/// True when a trimmed value is empty or the textual missing sentinel.
pub fn is_missing(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case(MISSING_SENTINEL)
}

/// Escape a text value for the `COPY` text format.
///
/// Backslash, tab, newline, and carriage return are the only bytes the wire
/// format treats specially.
pub fn escape_copy(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Render an optional text field as a `COPY` column (`\N` for absent).
pub fn copy_text(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !is_missing(v) => escape_copy(v),
        _ => "\\N".to_string(),
    }
}

/// Render an optional integer as a `COPY` column.
pub fn copy_int(value: Option<i64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "\\N".to_string(),
    }
}
