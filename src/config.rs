//! Application-level constants and clock helpers.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};

pub const APP_NAME: &str = "Medidesk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default and maximum page sizes for paged queries.
pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const MAX_PAGE_SIZE: usize = 100;

/// Failed logins before the account locks, and how long the lock holds.
pub const LOCKOUT_THRESHOLD: i64 = 5;
pub const LOCKOUT_WINDOW_MS: i64 = 15 * 60 * 1000;

/// Refresh-token lifetime.
pub const REFRESH_TOKEN_TTL_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Clinic-local timezone offset (IST, +05:30). Bill numbering and
/// follow-up date validation run against the clinic-local calendar day.
pub const CLINIC_UTC_OFFSET_SECS: i32 = 5 * 3600 + 1800;

pub fn clinic_offset() -> FixedOffset {
    // The offset constant is a valid fixed offset by construction.
    FixedOffset::east_opt(CLINIC_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Today's date on the clinic's wall calendar.
pub fn clinic_today() -> NaiveDate {
    Utc::now().with_timezone(&clinic_offset()).date_naive()
}

/// Current time as epoch milliseconds — the timestamp format every
/// mutable item's created_at/updated_at carries.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn default_log_filter() -> &'static str {
    "info"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clinic_offset_is_ist() {
        assert_eq!(clinic_offset().local_minus_utc(), 19800);
    }

    #[test]
    fn page_size_bounds_are_sane() {
        assert!(DEFAULT_PAGE_SIZE <= MAX_PAGE_SIZE);
        assert!(DEFAULT_PAGE_SIZE > 0);
    }

    #[test]
    fn now_millis_is_epoch_scale() {
        // Sanity: past 2020, not in seconds or nanoseconds.
        let now = now_millis();
        assert!(now > 1_577_836_800_000);
        assert!(now < 10_000_000_000_000);
    }
}
