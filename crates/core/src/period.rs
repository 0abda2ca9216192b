// Calendar periods and scan windows
//
// Day, week and month boundaries are computed in a caller-supplied time zone
// (the process local zone in production) and stored as half-open UTC ranges.
// Weeks start on Monday.

use chrono::{
    DateTime, Datelike, Days, Duration, Local, LocalResult, Months, NaiveDate, NaiveTime, Offset,
    TimeZone, Utc,
};
use serde::{Deserialize, Serialize};

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Scan window of one scheduler tick: `[now, now + interval)`.
    pub fn scan_window(now: DateTime<Utc>, interval: std::time::Duration) -> Self {
        let end = Duration::from_std(interval)
            .ok()
            .and_then(|interval| now.checked_add_signed(interval))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(now, end)
    }

    /// Local day containing `anchor`.
    pub fn day(anchor: DateTime<Utc>) -> Self {
        Self::day_in(anchor, &Local)
    }

    /// Local Monday-to-Monday week containing `anchor`.
    pub fn week(anchor: DateTime<Utc>) -> Self {
        Self::week_in(anchor, &Local)
    }

    /// Local calendar month containing `anchor`.
    pub fn month(anchor: DateTime<Utc>) -> Self {
        Self::month_in(anchor, &Local)
    }

    pub fn day_in<Tz: TimeZone>(anchor: DateTime<Utc>, tz: &Tz) -> Self {
        let date = local_date(anchor, tz);
        let next = date.succ_opt().unwrap_or(NaiveDate::MAX);
        Self::new(start_of_day(tz, date), start_of_day(tz, next))
    }

    pub fn week_in<Tz: TimeZone>(anchor: DateTime<Utc>, tz: &Tz) -> Self {
        let date = local_date(anchor, tz);
        let monday = date
            .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
            .unwrap_or(NaiveDate::MIN);
        let next_monday = monday
            .checked_add_days(Days::new(7))
            .unwrap_or(NaiveDate::MAX);
        Self::new(start_of_day(tz, monday), start_of_day(tz, next_monday))
    }

    pub fn month_in<Tz: TimeZone>(anchor: DateTime<Utc>, tz: &Tz) -> Self {
        let date = local_date(anchor, tz);
        let first = date.with_day(1).unwrap_or(date);
        let next = first
            .checked_add_months(Months::new(1))
            .unwrap_or(NaiveDate::MAX);
        Self::new(start_of_day(tz, first), start_of_day(tz, next))
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Calendar date of `anchor` in `tz`, clamped at the ends of the date range.
fn local_date<Tz: TimeZone>(anchor: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    let utc = anchor.naive_utc();
    let offset = tz.offset_from_utc_datetime(&utc).fix();
    utc.checked_add_offset(offset).unwrap_or(utc).date()
}

/// First instant of `date` in `tz`, as UTC.
fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(t) => t.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // Midnight skipped by a DST jump: fall back to the zone's offset at that instant.
        LocalResult::None => {
            let offset = tz.offset_from_utc_datetime(&naive).fix();
            let utc = naive.checked_sub_offset(offset).unwrap_or(naive);
            Utc.from_utc_datetime(&utc)
        }
    }
}
