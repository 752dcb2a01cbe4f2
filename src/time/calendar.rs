//! Calendar date/time conversions using O(1) algorithms
//!
//! Howard Hinnant's `days_from_civil` / `civil_from_days`.
//! Reference: http://howardhinnant.github.io/date_algorithms.html

use core::fmt;

const SECONDS_PER_DAY: u64 = 86_400;
/// Days from 0000-03-01 to 1970-01-01.
const EPOCH_SHIFT: i64 = 719_468;
const DAYS_PER_ERA: i64 = 146_097;

/// A UTC calendar date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    /// Whether each field is within its calendar range.
    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
    }
}

/// ISO-8601 with millisecond precision, as IoTConnect expects in `dt`.
impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.000Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DateTime {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "{=u16}-{=u8}-{=u8}T{=u8}:{=u8}:{=u8}Z",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second
        )
    }
}

pub fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Days since 1970-01-01 for a proleptic Gregorian date.
pub fn days_from_civil(year: u16, month: u8, day: u8) -> i64 {
    let y = i64::from(year) - i64::from(month <= 2);
    let era = (if y >= 0 { y } else { y - 399 }) / 400;
    let yoe = y - era * 400;
    let m = i64::from(month);
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + i64::from(day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * DAYS_PER_ERA + doe - EPOCH_SHIFT
}

/// Civil date `(year, month, day)` for a day count since 1970-01-01.
pub fn civil_from_days(days: i64) -> (u16, u8, u8) {
    let z = days + EPOCH_SHIFT;
    let era = (if z >= 0 { z } else { z - (DAYS_PER_ERA - 1) }) / DAYS_PER_ERA;
    let doe = z - era * DAYS_PER_ERA;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / (DAYS_PER_ERA - 1)) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year as u16, month, day)
}

pub fn unix_to_datetime(unix_secs: u64) -> DateTime {
    let days = (unix_secs / SECONDS_PER_DAY) as i64;
    let secs_today = unix_secs % SECONDS_PER_DAY;
    let (year, month, day) = civil_from_days(days);
    DateTime {
        year,
        month,
        day,
        hour: (secs_today / 3600) as u8,
        minute: ((secs_today % 3600) / 60) as u8,
        second: (secs_today % 60) as u8,
    }
}

/// Unix seconds for a UTC date. Dates before 1970 clamp to 0.
pub fn datetime_to_unix(dt: &DateTime) -> u64 {
    let days = days_from_civil(dt.year, dt.month, dt.day);
    if days < 0 {
        return 0;
    }
    days as u64 * SECONDS_PER_DAY
        + u64::from(dt.hour) * 3600
        + u64::from(dt.minute) * 60
        + u64::from(dt.second)
}
