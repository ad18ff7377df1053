//! Day-granularity timestamp arithmetic.
//!
//! All schedule arithmetic in the engine works on fractional days over UTC
//! instants. Conversions clamp to the representable [`Timestamp`] range
//! instead of failing, since sampled simulation offsets can be extreme.

use jiff::Timestamp;

const SECONDS_PER_DAY: f64 = 86_400.0;

// Timestamp::MIN/MAX are not constructible from arbitrary seconds; this range
// (years ~1700..9900) is comfortably inside jiff's supported span.
const MIN_SECOND: i64 = -8_520_336_000;
const MAX_SECOND: i64 = 250_221_120_000;

/// Fractional days from `from` to `to` (negative when `to` precedes `from`).
pub fn days_between(from: Timestamp, to: Timestamp) -> f64 {
    (to.as_second() - from.as_second()) as f64 / SECONDS_PER_DAY
}

/// Adds a fractional number of days to a timestamp, clamping on overflow.
pub fn add_days(ts: Timestamp, days: f64) -> Timestamp {
    let delta = (days * SECONDS_PER_DAY).round() as i64;
    let second = ts.as_second().saturating_add(delta).clamp(MIN_SECOND, MAX_SECOND);
    Timestamp::from_second(second).unwrap_or(ts)
}

/// Whole days of `b - a`, truncated toward zero, never negative.
pub fn whole_days_late(due: Timestamp, now: Timestamp) -> i64 {
    let days = days_between(due, now);
    if days <= 0.0 {
        0
    } else {
        days.trunc() as i64
    }
}
