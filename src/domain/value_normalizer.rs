//! Pure text-to-value conversions used by the extraction rules
//!
//! None of these functions fail loudly: unparsable input yields `None`
//! (mapped to the record sentinel by the caller) or, for compact counts, zero.

use once_cell::sync::Lazy;
use regex::Regex;

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digit run regex"));

static COMPACT_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d[\d,]*)(?:\.(\d+))?\s*([km])?").expect("compact number regex")
});

/// Parse counts like `1.2K`, `3,482` or `12` into an integer.
///
/// Non-numeric input (including the empty string) yields 0. Decimal
/// digits beyond the suffix's precision are truncated, which keeps the
/// mapping monotonic for a fixed suffix.
pub fn parse_compact_number(text: &str) -> u64 {
    let Some(caps) = COMPACT_NUMBER.captures(text) else {
        return 0;
    };

    // the capture always starts with a digit, so a failed parse is an overflow
    let whole: String = caps[1].chars().filter(char::is_ascii_digit).collect();
    let whole = whole.parse::<u64>().unwrap_or(u64::MAX);

    let (multiplier, scale_digits) = match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(suffix) if suffix == "k" => (1_000_u64, 3_usize),
        Some(suffix) if suffix == "m" => (1_000_000_u64, 6_usize),
        _ => (1_u64, 0_usize),
    };

    let fraction = caps
        .get(2)
        .map(|m| {
            let digits: String = m.as_str().chars().take(scale_digits).collect();
            let padded = format!("{digits:0<scale_digits$}");
            padded.parse::<u64>().unwrap_or(0)
        })
        .unwrap_or(0);

    whole.saturating_mul(multiplier).saturating_add(fraction)
}

/// Build an ISO `YYYY-MM-DD` date from separate parts.
///
/// All three parts must be present and integer-valued.
pub fn parse_date_parts(year: Option<&str>, month: Option<&str>, day: Option<&str>) -> Option<String> {
    let year: i32 = year?.trim().parse().ok()?;
    let month: u32 = month?.trim().parse().ok()?;
    let day: u32 = day?.trim().parse().ok()?;
    Some(format!("{year:04}-{month:02}-{day:02}"))
}

/// First run of ASCII digits as an integer (`"118 mins"` → 118)
pub fn first_integer(text: &str) -> Option<i64> {
    DIGIT_RUN.find(text)?.as_str().parse().ok()
}

/// All digit runs joined together (`"Watched by 1,234,567 members"` → 1234567)
pub fn concat_digits(text: &str) -> Option<i64> {
    let digits: String = DIGIT_RUN.find_iter(text).map(|m| m.as_str()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Count shown on a histogram bar tooltip such as `"1,234 ★★★½ ratings (12%)"`.
///
/// The trailing digit run is the percentage and is dropped when more than one
/// run is present. Empty or digit-free text counts as zero.
pub fn histogram_bar_count(text: &str) -> u64 {
    let runs: Vec<&str> = DIGIT_RUN.find_iter(text).map(|m| m.as_str()).collect();
    let kept = match runs.len() {
        0 => return 0,
        1 => &runs[..],
        n => &runs[..n - 1],
    };
    kept.concat().parse().unwrap_or(0)
}

/// Parse the first `len` characters of `text` as a float (`"3.91 out of 5"` → 3.91)
pub fn float_prefix(text: &str, len: usize) -> Option<f64> {
    let prefix: String = text.trim().chars().take(len).collect();
    prefix.trim().parse().ok()
}

/// Trim and collapse non-breaking spaces; `None` for blank text
pub fn clean_text(text: &str) -> Option<String> {
    let cleaned = text.replace('\u{a0}', " ");
    let trimmed = cleaned.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
