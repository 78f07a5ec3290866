//! Period keys: the calendar date a delivery belongs to.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub const PERIOD_FORMAT: &str = "%Y-%m-%d";

/// `YYYY-MM-DD` for `now` as seen in `tz`.
pub fn period_key(now: DateTime<Utc>, tz: Tz) -> String {
    now.with_timezone(&tz).format(PERIOD_FORMAT).to_string()
}

/// Numeric seed for a period key: `2026-02-07` becomes `20260207`.
/// Keys without digits fall back to a byte sum so any key still seeds.
pub fn seed(period_key: &str) -> u64 {
    let digits: String = period_key.chars().filter(char::is_ascii_digit).collect();
    digits
        .parse::<u64>()
        .unwrap_or_else(|_| period_key.bytes().map(u64::from).sum())
}
