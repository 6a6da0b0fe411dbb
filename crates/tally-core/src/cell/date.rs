//! Excel date serials
//!
//! Dates are stored as serials in the 1900 date system: day 1 is 1900-01-01
//! and day 60 is the fictional 1900-02-29 kept for Lotus compatibility.

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Days between the 1900 and 1904 date systems' day zero
pub const DATE1904_OFFSET: f64 = 1462.0;

/// Largest serial Excel accepts (9999-12-31)
const MAX_SERIAL: f64 = 2_958_465.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Convert a 1900-system serial to a calendar date and time.
///
/// Returns `None` for serials Excel cannot display, including day 60.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..MAX_SERIAL + 1.0).contains(&serial) {
        return None;
    }
    let mut days = serial.trunc() as i64;
    if days == 60 {
        return None;
    }
    if days > 60 {
        days -= 1;
    }
    let millis = (serial.fract() * MILLIS_PER_DAY).round() as i64;

    let base = NaiveDate::from_ymd_opt(1899, 12, 31)?.and_hms_opt(0, 0, 0)?;
    base.checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::milliseconds(millis))
}
