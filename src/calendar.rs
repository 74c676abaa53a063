//! Calendar systems used by DHIS2 instances.
//!
//! DHIS2 servers can run on a non-Gregorian system calendar, in which case
//! period identifiers (`201612`, `2016Q1`, ...) are expressed in that
//! calendar's years and months. Every calendar here converts to and from a
//! Julian day number, so the rest of the crate only ever deals with
//! [`chrono::NaiveDate`] (proleptic Gregorian) windows.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::period::PeriodWindow;

/// Julian day number of 0001-01-01 (proleptic Gregorian) minus one.
const CE_OFFSET: i64 = 1_721_425;

pub(crate) const ISO_SYSTEM: &dyn CalendarSystem = &Gregorian;

/// Calendar keys as reported by `/api/system/info` (`calendar`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Calendar {
    #[default]
    Iso8601,
    Gregorian,
    Julian,
    Ethiopian,
    Coptic,
    Islamic,
    #[serde(alias = "jalali")]
    Persian,
    #[serde(alias = "buddhist")]
    Thai,
    Nepali,
}

impl Calendar {
    pub fn as_str(self) -> &'static str {
        match self {
            Calendar::Iso8601 => "iso8601",
            Calendar::Gregorian => "gregorian",
            Calendar::Julian => "julian",
            Calendar::Ethiopian => "ethiopian",
            Calendar::Coptic => "coptic",
            Calendar::Islamic => "islamic",
            Calendar::Persian => "persian",
            Calendar::Thai => "thai",
            Calendar::Nepali => "nepali",
        }
    }

    /// Returns the registered conversion for this calendar.
    pub fn system(self) -> Result<&'static dyn CalendarSystem> {
        match self {
            Calendar::Iso8601 | Calendar::Gregorian => Ok(ISO_SYSTEM),
            Calendar::Julian => Ok(&Julian),
            Calendar::Ethiopian => Ok(&ETHIOPIAN),
            Calendar::Coptic => Ok(&COPTIC),
            Calendar::Islamic => Ok(&Islamic),
            Calendar::Persian => Ok(&Persian),
            Calendar::Thai => Ok(&Thai),
            // Nepali month lengths are published tables, not arithmetic.
            Calendar::Nepali => Err(Error::UnsupportedCalendar(self.as_str().to_string())),
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Calendar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let calendar = match s.trim().to_ascii_lowercase().as_str() {
            "" | "iso8601" | "iso" => Calendar::Iso8601,
            "gregorian" => Calendar::Gregorian,
            "julian" => Calendar::Julian,
            "ethiopian" => Calendar::Ethiopian,
            "coptic" => Calendar::Coptic,
            "islamic" => Calendar::Islamic,
            "persian" | "jalali" => Calendar::Persian,
            "thai" | "buddhist" => Calendar::Thai,
            "nepali" => Calendar::Nepali,
            _ => return Err(Error::UnsupportedCalendar(s.to_string())),
        };
        Ok(calendar)
    }
}

/// A year/month/day triple in some calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocalDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl LocalDate {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }
}

/// Conversion capability implemented once per supported calendar.
///
/// Implementors only describe the calendar's arithmetic; conversions to and
/// from Gregorian dates and year windows are derived from it.
pub trait CalendarSystem: Send + Sync {
    fn calendar(&self) -> Calendar;

    /// Julian day number of `year-month-day`. Month and day must be in range.
    fn day_number(&self, year: i32, month: u32, day: u32) -> i64;

    fn days_in_month(&self, year: i32, month: u32) -> u32;

    fn months_in_year(&self, _year: i32) -> u32 {
        12
    }

    fn mean_year_length(&self) -> f64 {
        365.2425
    }

    fn is_valid(&self, date: LocalDate) -> bool {
        date.month >= 1
            && date.month <= self.months_in_year(date.year)
            && date.day >= 1
            && date.day <= self.days_in_month(date.year, date.month)
    }

    fn to_gregorian(&self, date: LocalDate) -> Result<NaiveDate> {
        from_day_number(self.day_number(date.year, date.month, date.day))
            .ok_or_else(|| Error::DateOutOfRange(self.calendar().to_string()))
    }

    fn from_gregorian(&self, date: NaiveDate) -> LocalDate {
        let jdn = to_day_number(date);
        let epoch = self.day_number(1, 1, 1);

        let mut year = ((jdn - epoch) as f64 / self.mean_year_length()).floor() as i32 + 1;
        while self.day_number(year + 1, 1, 1) <= jdn {
            year += 1;
        }
        while self.day_number(year, 1, 1) > jdn {
            year -= 1;
        }

        let last = self.months_in_year(year);
        let mut month = 1;
        let mut start = self.day_number(year, 1, 1);
        loop {
            let len = i64::from(self.days_in_month(year, month));
            if jdn < start + len || month == last {
                break;
            }
            start += len;
            month += 1;
        }

        LocalDate {
            year,
            month,
            day: (jdn - start + 1) as u32,
        }
    }

    /// First and last Gregorian date of calendar year `year`.
    fn year_bounds(&self, year: i32) -> Result<PeriodWindow> {
        let start = self.to_gregorian(LocalDate::new(year, 1, 1))?;
        let next = self.to_gregorian(LocalDate::new(year + 1, 1, 1))?;
        let end = next
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| Error::DateOutOfRange(self.calendar().to_string()))?;
        Ok(PeriodWindow { start, end })
    }
}

pub(crate) fn to_day_number(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) + CE_OFFSET
}

pub(crate) fn from_day_number(jdn: i64) -> Option<NaiveDate> {
    let days = i32::try_from(jdn - CE_OFFSET).ok()?;
    NaiveDate::from_num_days_from_ce_opt(days)
}

/// Bounds of calendar year `year`.
pub fn calendar_year_bounds(calendar: Calendar, year: i32) -> Result<PeriodWindow> {
    calendar.system()?.year_bounds(year)
}

/// Bounds of the calendar year containing `date`.
pub fn calendar_year_bounds_for(calendar: Calendar, date: NaiveDate) -> Result<PeriodWindow> {
    let system = calendar.system()?;
    system.year_bounds(system.from_gregorian(date).year)
}

/// Label of the calendar year containing `date` (e.g. `2016` for an
/// Ethiopian date in late 2023).
pub fn calendar_year_of(calendar: Calendar, date: NaiveDate) -> Result<i32> {
    Ok(calendar.system()?.from_gregorian(date).year)
}

fn gregorian_leap(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn gregorian_days_in_month(year: i32, month: u32) -> u32 {
    match month {
        2 if gregorian_leap(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn gregorian_day_number(year: i32, month: u32, day: u32) -> i64 {
    let (y, m, d) = (i64::from(year), i64::from(month), i64::from(day));
    let a = (14 - m) / 12;
    let y = y + 4800 - a;
    let m = m + 12 * a - 3;
    d + (153 * m + 2) / 5 + 365 * y + y / 4 - y / 100 + y / 400 - 32045
}

#[derive(Debug, Clone, Copy)]
struct Gregorian;

impl CalendarSystem for Gregorian {
    fn calendar(&self) -> Calendar {
        Calendar::Gregorian
    }

    fn day_number(&self, year: i32, month: u32, day: u32) -> i64 {
        gregorian_day_number(year, month, day)
    }

    fn days_in_month(&self, year: i32, month: u32) -> u32 {
        gregorian_days_in_month(year, month)
    }

    fn from_gregorian(&self, date: NaiveDate) -> LocalDate {
        LocalDate::new(date.year(), date.month(), date.day())
    }
}

#[derive(Debug, Clone, Copy)]
struct Julian;

impl CalendarSystem for Julian {
    fn calendar(&self) -> Calendar {
        Calendar::Julian
    }

    fn day_number(&self, year: i32, month: u32, day: u32) -> i64 {
        let (y, m, d) = (i64::from(year), i64::from(month), i64::from(day));
        let a = (14 - m) / 12;
        let y = y + 4800 - a;
        let m = m + 12 * a - 3;
        d + (153 * m + 2) / 5 + 365 * y + y / 4 - 32083
    }

    fn days_in_month(&self, year: i32, month: u32) -> u32 {
        match month {
            2 if year.rem_euclid(4) == 0 => 29,
            2 => 28,
            4 | 6 | 9 | 11 => 30,
            _ => 31,
        }
    }

    fn mean_year_length(&self) -> f64 {
        365.25
    }
}

/// Buddhist-era years over Gregorian months.
#[derive(Debug, Clone, Copy)]
struct Thai;

const THAI_YEAR_OFFSET: i32 = 543;

impl CalendarSystem for Thai {
    fn calendar(&self) -> Calendar {
        Calendar::Thai
    }

    fn day_number(&self, year: i32, month: u32, day: u32) -> i64 {
        gregorian_day_number(year - THAI_YEAR_OFFSET, month, day)
    }

    fn days_in_month(&self, year: i32, month: u32) -> u32 {
        gregorian_days_in_month(year - THAI_YEAR_OFFSET, month)
    }

    fn from_gregorian(&self, date: NaiveDate) -> LocalDate {
        LocalDate::new(date.year() + THAI_YEAR_OFFSET, date.month(), date.day())
    }
}

/// Ethiopian and Coptic: twelve 30-day months and a short 13th month.
#[derive(Debug, Clone, Copy)]
struct Alexandrian {
    calendar: Calendar,
    epoch: i64,
}

const ETHIOPIAN: Alexandrian = Alexandrian {
    calendar: Calendar::Ethiopian,
    epoch: 1_724_221,
};

const COPTIC: Alexandrian = Alexandrian {
    calendar: Calendar::Coptic,
    epoch: 1_825_030,
};

impl CalendarSystem for Alexandrian {
    fn calendar(&self) -> Calendar {
        self.calendar
    }

    fn day_number(&self, year: i32, month: u32, day: u32) -> i64 {
        let y = i64::from(year);
        self.epoch + 365 * (y - 1) + y.div_euclid(4) + 30 * i64::from(month - 1) + i64::from(day)
            - 1
    }

    fn days_in_month(&self, year: i32, month: u32) -> u32 {
        match month {
            13 if year.rem_euclid(4) == 3 => 6,
            13 => 5,
            _ => 30,
        }
    }

    fn months_in_year(&self, _year: i32) -> u32 {
        13
    }

    fn mean_year_length(&self) -> f64 {
        365.25
    }
}

/// Tabular (civil) Islamic calendar, 30-year cycle.
#[derive(Debug, Clone, Copy)]
struct Islamic;

const ISLAMIC_EPOCH: i64 = 1_948_440;

impl CalendarSystem for Islamic {
    fn calendar(&self) -> Calendar {
        Calendar::Islamic
    }

    fn day_number(&self, year: i32, month: u32, day: u32) -> i64 {
        let y = i64::from(year);
        let m = i64::from(month);
        i64::from(day) + (59 * (m - 1) + 1) / 2 + (y - 1) * 354 + (3 + 11 * y).div_euclid(30)
            + ISLAMIC_EPOCH
            - 1
    }

    fn days_in_month(&self, year: i32, month: u32) -> u32 {
        if month == 12 && (14 + 11 * i64::from(year)).rem_euclid(30) < 11 {
            30
        } else if month % 2 == 1 {
            30
        } else {
            29
        }
    }

    fn mean_year_length(&self) -> f64 {
        354.367
    }
}

/// Arithmetic Persian (Solar Hijri) calendar using the 33-year leap cycle,
/// which tracks the astronomical calendar across the current era.
#[derive(Debug, Clone, Copy)]
struct Persian;

const PERSIAN_EPOCH: i64 = 1_948_320;
const PERSIAN_LEAP_RESIDUES: [i32; 8] = [1, 5, 9, 13, 17, 22, 26, 30];

impl Persian {
    fn is_leap(year: i32) -> bool {
        PERSIAN_LEAP_RESIDUES.contains(&year.rem_euclid(33))
    }

    fn leap_years_before(year: i32) -> i64 {
        let elapsed = year - 1;
        let cycles = i64::from(elapsed.div_euclid(33));
        let rest = elapsed.rem_euclid(33);
        let partial = PERSIAN_LEAP_RESIDUES.iter().filter(|r| **r <= rest).count() as i64;
        cycles * 8 + partial
    }
}

impl CalendarSystem for Persian {
    fn calendar(&self) -> Calendar {
        Calendar::Persian
    }

    fn day_number(&self, year: i32, month: u32, day: u32) -> i64 {
        let before_month = if month <= 7 {
            31 * (i64::from(month) - 1)
        } else {
            186 + 30 * (i64::from(month) - 7)
        };
        PERSIAN_EPOCH - 1
            + 365 * (i64::from(year) - 1)
            + Self::leap_years_before(year)
            + before_month
            + i64::from(day)
    }

    fn days_in_month(&self, year: i32, month: u32) -> u32 {
        match month {
            1..=6 => 31,
            12 if Self::is_leap(year) => 30,
            12 => 29,
            _ => 30,
        }
    }

    fn mean_year_length(&self) -> f64 {
        365.2424
    }
}
