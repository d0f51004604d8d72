//! Wall clock: calendar date-time, field editing, formatting and the clock
//! device interface.

use core::fmt::Write as _;

use chrono::{
    Datelike,
    NaiveDate,
    NaiveDateTime,
    TimeDelta,
    Timelike,
};
use heapless::String;

/// Line of text as wide as the visible display.
pub type Line = String<16>;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
/// The clock counts years 0..=4095 and wraps after the last one.
pub const MAX_YEAR: i32 = 4095;

/// `year-month-day`, with the day pulled back to the end of a shorter month.
fn date_clamped(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    (1..=day.max(1))
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    date_clamped(year, month, 31).map_or(31, |d| d.day())
}

fn wrap(value: i32, lo: i32, hi: i32, up: bool) -> i32 {
    match (up, value) {
        (true, v) if v >= hi => lo,
        (true, v) => v + 1,
        (false, v) if v <= lo => hi,
        (false, v) => v - 1,
    }
}

/// Editable date-time fields, in the order the time configuration visits them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Field {
    Year,
    Month,
    Day,
    Weekday,
    Hour,
    Minute,
}

impl Field {
    pub const ALL: [Self; 6] = [
        Self::Year,
        Self::Month,
        Self::Day,
        Self::Weekday,
        Self::Hour,
        Self::Minute,
    ];
}

/// Calendar time as the RTC keeps it.
///
/// The weekday is its own register, as on the clock chip: it starts out
/// matching the date, follows it across midnight, and can be set apart from
/// it in the time configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateTime {
    at: NaiveDateTime,
    /// 0 is Sunday.
    weekday: u8,
}

impl DateTime {
    pub const EPOCH: Self = Self {
        at: NaiveDateTime::UNIX_EPOCH,
        weekday: 4,
    };

    pub fn from_naive(at: NaiveDateTime) -> Self {
        Self {
            at,
            weekday: at.weekday().num_days_from_sunday() as u8,
        }
    }

    pub fn from_unix(secs: u32) -> Self {
        chrono::DateTime::from_timestamp(i64::from(secs), 0)
            .map_or(Self::EPOCH, |t| Self::from_naive(t.naive_utc()))
    }

    /// Seconds since the Unix epoch; dates before 1970 give 0.
    pub fn to_unix(&self) -> u32 {
        let secs = (self.at - NaiveDateTime::UNIX_EPOCH).num_seconds();
        secs.clamp(0, i64::from(u32::MAX)) as u32
    }

    pub const fn naive(&self) -> NaiveDateTime {
        self.at
    }

    pub fn year(&self) -> i32 {
        self.at.year()
    }

    pub fn month(&self) -> u32 {
        self.at.month()
    }

    pub fn day(&self) -> u32 {
        self.at.day()
    }

    pub const fn weekday(&self) -> u8 {
        self.weekday
    }

    pub fn hour(&self) -> u32 {
        self.at.hour()
    }

    pub fn minute(&self) -> u32 {
        self.at.minute()
    }

    pub fn second(&self) -> u32 {
        self.at.second()
    }

    /// Start the minute over, as setting the clock does.
    pub fn clear_seconds(&mut self) {
        self.at = self.at.with_second(0).unwrap_or(self.at);
    }

    /// Advance one second, carrying into the larger fields.
    pub fn add_second(&mut self) {
        let Some(mut next) = self.at.checked_add_signed(TimeDelta::seconds(1)) else {
            return;
        };
        if next.date() != self.at.date() {
            self.weekday = (self.weekday + 1) % 7;
        }
        if next.year() > MAX_YEAR {
            next = next.with_year(0).unwrap_or(next);
        }
        self.at = next;
    }

    /// Step `field` up or down by one, wrapping within its range. The day is
    /// pulled back into range when the month or year changes under it.
    pub fn adjust(&mut self, field: Field, up: bool) {
        let (year, month, day) = (self.year(), self.month(), self.day());
        let date = match field {
            Field::Year => date_clamped(wrap(year, 0, MAX_YEAR, up), month, day),
            Field::Month => date_clamped(year, wrap(month as i32, 1, 12, up) as u32, day),
            Field::Day => {
                let dim = days_in_month(year, month) as i32;
                date_clamped(year, month, wrap(day as i32, 1, dim, up) as u32)
            }
            Field::Weekday => {
                self.weekday = wrap(i32::from(self.weekday), 0, 6, up) as u8;
                None
            }
            Field::Hour => {
                let hour = wrap(self.hour() as i32, 0, 23, up) as u32;
                self.at = self.at.with_hour(hour).unwrap_or(self.at);
                None
            }
            Field::Minute => {
                let minute = wrap(self.minute() as i32, 0, 59, up) as u32;
                self.at = self.at.with_minute(minute).unwrap_or(self.at);
                None
            }
        };
        if let Some(date) = date {
            self.at = date.and_time(self.at.time());
        }
    }

    /// `Ddd DD/MM/YYYY`, with `blank` replaced by spaces.
    pub fn date_line(&self, blank: Option<Field>) -> Line {
        let mut out = Line::new();
        let day_name = DAY_NAMES[usize::from(self.weekday % 7)];
        let _ = match blank {
            Some(Field::Weekday) => write!(out, "    "),
            _ => write!(out, "{day_name} "),
        };
        let _ = match blank {
            Some(Field::Day) => write!(out, "  /"),
            _ => write!(out, "{:02}/", self.day()),
        };
        let _ = match blank {
            Some(Field::Month) => write!(out, "  /"),
            _ => write!(out, "{:02}/", self.month()),
        };
        let _ = match blank {
            Some(Field::Year) => write!(out, "    "),
            _ => write!(out, "{:04}", self.year()),
        };
        out
    }

    /// `HH:MM:SS`, with `blank` replaced by spaces.
    pub fn time_line(&self, blank: Option<Field>) -> Line {
        let mut out = Line::new();
        let _ = match blank {
            Some(Field::Hour) => write!(out, "  :"),
            _ => write!(out, "{:02}:", self.hour()),
        };
        let _ = match blank {
            Some(Field::Minute) => write!(out, "  :"),
            _ => write!(out, "{:02}:", self.minute()),
        };
        let _ = write!(out, "{:02}", self.second());
        out
    }

    pub fn snapshot(&self) -> DateSnapshot {
        DateSnapshot {
            date: self.date_line(None),
            time: self.time_line(None),
        }
    }
}

impl Default for DateTime {
    fn default() -> Self {
        Self::EPOCH
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DateTime {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(
            f,
            "{}-{}-{} {}:{}:{}",
            self.year(),
            self.month(),
            self.day(),
            self.hour(),
            self.minute(),
            self.second()
        );
    }
}

/// Pre-formatted date and time lines for the idle screen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DateSnapshot {
    pub date: Line,
    pub time: Line,
}

/// A real-time clock.
pub trait Rtc {
    fn now(&self) -> DateTime;
    fn set(&mut self, time: DateTime);
    /// Pause or resume counting (paused while the user edits the time).
    fn set_running(&mut self, running: bool);
    /// Called once per second by the clock ticker. Clocks that count in
    /// hardware leave this empty.
    fn tick_second(&mut self) {}

    fn seconds(&self) -> u32 {
        self.now().to_unix()
    }

    fn set_seconds(&mut self, unix: u32) {
        self.set(DateTime::from_unix(unix));
    }
}

/// Clock kept in software, advanced by [`Rtc::tick_second`].
#[derive(Clone, Debug)]
pub struct SoftRtc {
    now: DateTime,
    running: bool,
}

impl SoftRtc {
    pub const fn new(now: DateTime) -> Self {
        Self { now, running: true }
    }

    pub const fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for SoftRtc {
    fn default() -> Self {
        Self::new(DateTime::EPOCH)
    }
}

impl Rtc for SoftRtc {
    fn now(&self) -> DateTime {
        self.now
    }

    fn set(&mut self, time: DateTime) {
        self.now = time;
    }

    fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    fn tick_second(&mut self) {
        if self.running {
            self.now.add_second();
        }
    }
}
