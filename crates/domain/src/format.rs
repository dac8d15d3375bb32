//! Display helpers shared by the storefront and admin views.
//!
//! All helpers are total: malformed input produces a fallback value rather than an
//! error, so views can call them unconditionally.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex_lite::Regex;

use crate::error::DomainError;

/// Placeholder shown for dates that cannot be parsed.
pub const MISSING_DATE: &str = "N/A";

/// Class applied to statuses with no dedicated color.
pub const DEFAULT_STATUS_COLOR: &str = "bg-gray-100 text-gray-800";

/// Format an amount as US dollars, e.g. `1234.5` -> `$1,234.50`.
///
/// Non-finite amounts render as `$0.00`.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return "$0.00".to_string();
    }

    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };

    format!("{sign}${}.{frac:02}", group_thousands(whole))
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Parse an RFC 3339 timestamp as sent by the backend.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::parse(format!("invalid timestamp '{raw}': {e}")))
}

/// `Mar 1, 2024`
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// `Mar 1, 2024, 3:05 PM`
pub fn format_date_time(date: &DateTime<Utc>) -> String {
    date.format("%b %-d, %Y, %-I:%M %p").to_string()
}

/// Format a raw backend timestamp, falling back to [`MISSING_DATE`].
pub fn format_date_str(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|dt| format_date(&dt))
        .unwrap_or_else(|_| MISSING_DATE.to_string())
}

/// Build a URL slug: lowercase, ASCII word characters and single hyphens only.
pub fn slugify(text: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();

    let non_word = NON_WORD.get_or_init(|| Regex::new(r"[^a-z0-9\s_-]").expect("valid slug regex"));
    let separators =
        SEPARATORS.get_or_init(|| Regex::new(r"[\s_-]+").expect("valid separator regex"));

    let lowered = text.trim().to_lowercase();
    let stripped = non_word.replace_all(&lowered, "");
    let joined = separators.replace_all(&stripped, "-");
    joined.trim_matches('-').to_string()
}

/// Mean of the given star ratings rounded to one decimal place; `0.0` when empty.
pub fn average_rating(ratings: &[u8]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: u32 = ratings.iter().map(|&r| u32::from(r)).sum();
    let avg = f64::from(sum) / ratings.len() as f64;
    (avg * 10.0).round() / 10.0
}

/// Badge classes for an order / payment / review status.
pub fn status_color(status: &str) -> &'static str {
    match status.trim().to_ascii_lowercase().as_str() {
        "pending" => "bg-yellow-100 text-yellow-800",
        "processing" => "bg-blue-100 text-blue-800",
        "shipped" => "bg-indigo-100 text-indigo-800",
        "delivered" | "completed" | "paid" | "approved" | "active" => {
            "bg-green-100 text-green-800"
        }
        "cancelled" | "failed" | "rejected" => "bg-red-100 text-red-800",
        "refunded" => "bg-purple-100 text-purple-800",
        _ => DEFAULT_STATUS_COLOR,
    }
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
