use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// USDC carries 6 fractional digits on-chain.
pub const USDC_DECIMALS: u32 = 6;

/// The one scaling constant for an asset.
///
/// Every amount and balance in a formatting pass goes through the same
/// `Units` value; the decimal count is never guessed from the magnitude of
/// the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Units {
    pub decimals: u32,
}

impl Default for Units {
    fn default() -> Self {
        Self {
            decimals: USDC_DECIMALS,
        }
    }
}

impl Units {
    pub fn new(decimals: u32) -> Self {
        Self { decimals }
    }

    pub fn scale(&self, raw: &str) -> f64 {
        scale(raw, self.decimals)
    }

    pub fn to_raw(&self, display: f64) -> String {
        to_raw_amount(display, self.decimals)
    }
}

/// Convert an integer string in the token's smallest unit to display units.
///
/// Empty or unparseable input reads as zero, and so does anything negative.
pub fn scale(raw: &str, decimals: u32) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }

    let value = match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            debug!(raw, "malformed amount field, treating as zero");
            return 0.0;
        }
    };

    if value <= 0.0 {
        if value < 0.0 {
            debug!(raw, "negative amount field, clamping to zero");
        }
        return 0.0;
    }

    value / 10f64.powi(decimals as i32)
}

/// Inverse of [`scale`], used to build amount filters for queries.
pub fn to_raw_amount(display: f64, decimals: u32) -> String {
    if !display.is_finite() || display <= 0.0 {
        return "0".to_string();
    }
    let raw = (display * 10f64.powi(decimals as i32)).round();
    // f64 -> u128 saturates, so absurd inputs cannot wrap.
    (raw as u128).to_string()
}

/// Parse a count field such as `transferCount`.
pub fn parse_count(raw: &str) -> u64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }
    raw.parse::<u64>().unwrap_or_else(|_| {
        debug!(raw, "malformed count field, treating as zero");
        0
    })
}

/// Unix-seconds string for `secs` before `now`, as the indexer's
/// `timestamp_gt` filters expect.
pub fn seconds_ago(now: DateTime<Utc>, secs: i64) -> String {
    now.timestamp().saturating_sub(secs).max(0).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn zero_and_empty_are_zero() {
        assert_eq!(scale("0", 6), 0.0);
        assert_eq!(scale("", 6), 0.0);
        assert_eq!(scale("   ", 6), 0.0);
    }

    #[test]
    fn negative_clamps_to_zero() {
        assert_eq!(scale("-100", 6), 0.0);
        assert_eq!(scale("-50000000000", 6), 0.0);
    }

    #[test]
    fn malformed_is_zero() {
        assert_eq!(scale("0xdeadbeef", 6), 0.0);
        assert_eq!(scale("12abc", 6), 0.0);
        assert_eq!(scale("NaN", 6), 0.0);
    }

    #[test]
    fn fifty_thousand_dollars() {
        assert_eq!(scale("50000000000", 6), 50_000.0);
        assert_eq!(Units::default().scale("50000000000"), 50_000.0);
    }

    #[test]
    fn decimals_come_from_the_constant_only() {
        let units = Units::new(18);
        // A value that would look "unreasonable" at 18 decimals is still
        // scaled at 18; no fallback to 6.
        assert_eq!(units.scale("1000000"), 1e-12);
        assert_eq!(Units::new(6).scale("1000000"), 1.0);
    }

    #[test]
    fn raw_amount_inverse() {
        assert_eq!(to_raw_amount(50_000.0, 6), "50000000000");
        assert_eq!(to_raw_amount(1_000_000.0, 6), "1000000000000");
        assert_eq!(to_raw_amount(0.5, 6), "500000");
        assert_eq!(to_raw_amount(-3.0, 6), "0");
        assert_eq!(to_raw_amount(f64::NAN, 6), "0");
    }

    #[test]
    fn counts() {
        assert_eq!(parse_count("1234"), 1234);
        assert_eq!(parse_count(""), 0);
        assert_eq!(parse_count("-4"), 0);
    }

    #[test]
    fn seconds_ago_is_unix_string() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(seconds_ago(now, 3600), "1699996400");
        assert_eq!(seconds_ago(now, 2_000_000_000), "0");
    }
}
