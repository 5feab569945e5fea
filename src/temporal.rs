// ⏰ Temporal Model - reference time zone, clocks, and storage format
//
// Every wall-clock reading happens in one fixed reference zone
// (UTC+03:00 unless configured otherwise). Storage always holds UTC text
// with millisecond precision so that rows sort lexicographically.

use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, SubsecRound, Utc};

/// Default reference zone offset, in hours east of UTC
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 3;

/// Build the reference zone from an hour offset (`None` if out of range)
pub fn reference_zone(hours: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(hours.checked_mul(3600)?)
}

pub fn default_zone() -> FixedOffset {
    reference_zone(DEFAULT_UTC_OFFSET_HOURS).unwrap_or_else(|| Utc.fix())
}

// ============================================================================
// CLOCKS
// ============================================================================

/// Source of "now" for everything that stamps or windows by time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the reference zone, truncated to storage precision
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    zone: FixedOffset,
}

impl SystemClock {
    pub fn new(zone: FixedOffset) -> Self {
        SystemClock { zone }
    }

    pub fn zone(&self) -> FixedOffset {
        self.zone
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(default_zone())
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.zone).trunc_subsecs(3)
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    at: DateTime<FixedOffset>,
}

impl FixedClock {
    pub fn at(at: DateTime<FixedOffset>) -> Self {
        FixedClock { at }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.at
    }
}

// ============================================================================
// COMPARISON & STORAGE
// ============================================================================

/// Instants are equal when they agree to the millisecond (storage precision),
/// whatever offset they are expressed in.
pub fn same_instant(a: &DateTime<FixedOffset>, b: &DateTime<FixedOffset>) -> bool {
    a.timestamp_millis() == b.timestamp_millis()
}

pub fn same_optional_instant(
    a: &Option<DateTime<FixedOffset>>,
    b: &Option<DateTime<FixedOffset>>,
) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_instant(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Format an instant as stored: `YYYY-MM-DDTHH:MM:SS.sssZ`
pub fn to_storage(ts: &DateTime<FixedOffset>) -> String {
    ts.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored instant and present it in the reference zone
pub fn from_storage(
    text: &str,
    zone: &FixedOffset,
) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(zone))
}

// ============================================================================
// TESTS
// ============================================================================
