//! Wall-clock tracking anchored to the monotonic tick clock.

use core::fmt::Write as _;

use heapless::String;

const SECS_PER_DAY: i64 = 86_400;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub const UNSET_TIME_TEXT: &str = "--:--:--";
pub const UNSET_DATE_TEXT: &str = "Date not set";

/// Civil date and time in the device's local zone.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LocalDateTime {
    pub year: i32,
    /// 1..=12
    pub month: u8,
    /// 1..=31
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// 0 = Sunday
    pub weekday: u8,
}

impl LocalDateTime {
    /// Converts seconds since the Unix epoch, shifted by `offset_secs`.
    pub fn from_unix(unix_secs: i64, offset_secs: i32) -> Self {
        let local = unix_secs + offset_secs as i64;
        let days = local.div_euclid(SECS_PER_DAY);
        let secs_of_day = local.rem_euclid(SECS_PER_DAY);

        let (year, month, day) = civil_from_days(days);
        // 1970-01-01 was a Thursday.
        let weekday = (days + 4).rem_euclid(7) as u8;

        Self {
            year,
            month,
            day,
            hour: (secs_of_day / 3_600) as u8,
            minute: (secs_of_day / 60 % 60) as u8,
            second: (secs_of_day % 60) as u8,
            weekday,
        }
    }

    pub fn format_time(&self) -> String<16> {
        let mut out = String::new();
        let _ = write!(out, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second);
        out
    }

    pub fn format_date(&self) -> String<24> {
        let mut out = String::new();
        let weekday = WEEKDAYS[self.weekday as usize % WEEKDAYS.len()];
        let month = MONTHS[(self.month as usize).saturating_sub(1) % MONTHS.len()];
        let _ = write!(out, "{} {:02} {} {}", weekday, self.day, month, self.year);
        out
    }
}

// Days since 1970-01-01 to (year, month, day) in the proleptic Gregorian calendar.
fn civil_from_days(days: i64) -> (i32, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year as i32, month, day)
}

/// Tracks wall-clock time between network synchronisations.
#[derive(Clone, Copy, Debug)]
pub struct TimeKeeper {
    anchor: Option<(u64, u64)>,
    offset_secs: i32,
}

impl TimeKeeper {
    pub const fn new(offset_secs: i32) -> Self {
        Self {
            anchor: None,
            offset_secs,
        }
    }

    /// Records that `unix_secs` was current at tick time `now_ms`.
    pub fn set_unix_time(&mut self, unix_secs: u64, now_ms: u64) {
        self.anchor = Some((unix_secs, now_ms));
    }

    pub const fn is_synced(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn unix_time(&self, now_ms: u64) -> Option<u64> {
        let (unix_secs, at_ms) = self.anchor?;
        Some(unix_secs + now_ms.saturating_sub(at_ms) / 1_000)
    }

    pub fn now(&self, now_ms: u64) -> Option<LocalDateTime> {
        self.unix_time(now_ms)
            .map(|unix_secs| LocalDateTime::from_unix(unix_secs as i64, self.offset_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_epoch_and_leap_day() {
        let epoch = LocalDateTime::from_unix(0, 0);
        assert_eq!((epoch.year, epoch.month, epoch.day), (1970, 1, 1));
        assert_eq!(epoch.format_date().as_str(), "Thu 01 Jan 1970");

        // 2024-02-29 13:45:07 UTC
        let leap = LocalDateTime::from_unix(1_709_214_307, 0);
        assert_eq!((leap.year, leap.month, leap.day), (2024, 2, 29));
        assert_eq!(leap.format_time().as_str(), "13:45:07");
        assert_eq!(leap.format_date().as_str(), "Thu 29 Feb 2024");
    }

    #[test]
    fn offset_can_cross_midnight_backwards() {
        let local = LocalDateTime::from_unix(0, -3_600);
        assert_eq!((local.year, local.month, local.day, local.hour), (1969, 12, 31, 23));
        assert_eq!(local.weekday, 3);
    }

    #[test]
    fn keeper_advances_with_ticks() {
        let mut keeper = TimeKeeper::new(2 * 3_600);
        assert!(keeper.now(0).is_none());

        keeper.set_unix_time(1_700_000_000, 5_000);
        let later = keeper.now(65_500).unwrap();
        // 1_700_000_060 UTC is 2023-11-14 22:14:20, shifted by two hours.
        assert_eq!((later.month, later.day), (11, 15));
        assert_eq!(later.format_time().as_str(), "00:14:20");
    }
}
