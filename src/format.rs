//! Display formatting for amounts, times and addresses.
//!
//! Every function here is total: bad input yields a fixed default ("$0",
//! "$0.00", "0" or "") rather than a panic, since renderers call these
//! on whatever the indexer sent back.

use chrono::{DateTime, Utc};

const THOUSAND: f64 = 1_000.0;
const MILLION: f64 = 1_000_000.0;
const BILLION: f64 = 1_000_000_000.0;

/// `$1.25M`, `$50.00K`, `$1.00B`, `$999.00`.
pub fn abbreviate(value: f64) -> String {
    if !value.is_finite() || value < 0.0 {
        return "$0".to_string();
    }
    // An empty sum is -0.0, which passes the guard above.
    let value = value + 0.0;
    format!("${}", abbreviate_bands(value, |v| format!("{v:.2}")))
}

/// Same bands as [`abbreviate`] without the currency sign, for counts.
pub fn abbreviate_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    abbreviate_bands(value, |v| format!("{}", v.trunc() as i64))
}

fn abbreviate_bands(value: f64, small: impl Fn(f64) -> String) -> String {
    if value >= BILLION {
        format!("{:.2}B", value / BILLION)
    } else if value >= MILLION {
        format!("{:.2}M", value / MILLION)
    } else if value >= THOUSAND {
        format!("{:.2}K", value / THOUSAND)
    } else {
        small(value)
    }
}

/// Exact currency string with comma grouping, e.g. `$1,234,567.89`.
pub fn exact(value: f64) -> String {
    if !value.is_finite() || value < 0.0 {
        return "$0.00".to_string();
    }
    let value = value + 0.0;
    let fixed = format!("{value:.2}");
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    format!("${}.{}", group_thousands(whole), cents)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `+1.23%` / `-0.50%`.
pub fn percent_change(value: f64) -> String {
    if !value.is_finite() {
        return "0%".to_string();
    }
    let value = value + 0.0;
    if value > 0.0 {
        format!("+{value:.2}%")
    } else {
        format!("{value:.2}%")
    }
}

fn parse_unix(timestamp: &str) -> Option<i64> {
    timestamp.trim().parse::<i64>().ok()
}

/// Bucket the age of a unix-seconds timestamp into a short phrase.
pub fn relative_time(timestamp: &str, now: DateTime<Utc>) -> String {
    let Some(ts) = parse_unix(timestamp) else {
        return String::new();
    };
    let elapsed = now.timestamp().saturating_sub(ts);

    if elapsed < 60 {
        "just now".to_string()
    } else if elapsed < 3_600 {
        plural(elapsed / 60, "minute")
    } else if elapsed < 86_400 {
        plural(elapsed / 3_600, "hour")
    } else {
        plural(elapsed / 86_400, "day")
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// `Mar 4, 2025 9:07 PM`, in UTC.
pub fn absolute_time(timestamp: &str) -> String {
    parse_unix(timestamp)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%b %-d, %Y %-I:%M %p").to_string())
        .unwrap_or_default()
}

/// First 6 and last 4 characters joined by an ellipsis.
pub fn shorten_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
