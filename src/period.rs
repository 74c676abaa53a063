//! DHIS2 period identifiers and their date windows.
//!
//! A period identifier is a string such as `202401` (monthly), `2024Q1`
//! (quarterly) or `2024W5` (ISO week). Year, month and day fields are read in
//! the calendar the server runs on; [`PeriodCalculator`] carries that
//! calendar, while the free functions in this module assume ISO 8601.
//!
//! Calendars with a short 13th month (Ethiopian, Coptic) fold it into the
//! twelfth period month, so month-based period types always have twelve
//! months per year.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{Calendar, CalendarSystem, ISO_SYSTEM, LocalDate};
use crate::error::{Error, Result};

/// Period types as named by DHIS2 (`dataSet.periodType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    BiMonthly,
    Quarterly,
    SixMonthly,
    SixMonthlyApril,
    Yearly,
    FinancialApril,
    FinancialJuly,
    FinancialOct,
}

impl PeriodType {
    pub const ALL: [PeriodType; 11] = [
        PeriodType::Daily,
        PeriodType::Weekly,
        PeriodType::Monthly,
        PeriodType::BiMonthly,
        PeriodType::Quarterly,
        PeriodType::SixMonthly,
        PeriodType::SixMonthlyApril,
        PeriodType::Yearly,
        PeriodType::FinancialApril,
        PeriodType::FinancialJuly,
        PeriodType::FinancialOct,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PeriodType::Daily => "Daily",
            PeriodType::Weekly => "Weekly",
            PeriodType::Monthly => "Monthly",
            PeriodType::BiMonthly => "BiMonthly",
            PeriodType::Quarterly => "Quarterly",
            PeriodType::SixMonthly => "SixMonthly",
            PeriodType::SixMonthlyApril => "SixMonthlyApril",
            PeriodType::Yearly => "Yearly",
            PeriodType::FinancialApril => "FinancialApril",
            PeriodType::FinancialJuly => "FinancialJuly",
            PeriodType::FinancialOct => "FinancialOct",
        }
    }

    /// Infers the period type from the shape of an identifier.
    pub fn detect(period_id: &str) -> Option<PeriodType> {
        PeriodType::ALL
            .into_iter()
            .find(|pt| parse(*pt, period_id).is_some())
    }

    fn shape(self) -> Shape {
        match self {
            PeriodType::Daily => Shape::Day,
            PeriodType::Weekly => Shape::Week,
            PeriodType::Monthly => Shape::months(1, 0),
            PeriodType::BiMonthly => Shape::months(2, 0),
            PeriodType::Quarterly => Shape::months(3, 0),
            PeriodType::SixMonthly => Shape::months(6, 0),
            PeriodType::SixMonthlyApril => Shape::months(6, 3),
            PeriodType::Yearly => Shape::months(12, 0),
            PeriodType::FinancialApril => Shape::months(12, 3),
            PeriodType::FinancialJuly => Shape::months(12, 6),
            PeriodType::FinancialOct => Shape::months(12, 9),
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PeriodType::ALL
            .into_iter()
            .find(|pt| pt.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown period type `{s}`"))
    }
}

/// Inclusive date range covered by a period, in Gregorian dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodWindow {
    #[serde(rename = "startDate")]
    pub start: NaiveDate,
    #[serde(rename = "endDate")]
    pub end: NaiveDate,
}

impl PeriodWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days in the window, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Day,
    Week,
    /// `span` months per period, the first period starting `offset` months
    /// after the calendar year's first month.
    Months { span: u32, offset: u32 },
}

impl Shape {
    const fn months(span: u32, offset: u32) -> Self {
        Shape::Months { span, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parsed {
    Day(LocalDate),
    Week { year: i32, week: u32 },
    Span { year: i32, index: u32 },
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn number(s: &str, max_len: usize) -> Option<u32> {
    if s.len() > max_len || !all_digits(s) {
        return None;
    }
    s.parse().ok()
}

/// Syntactic parse. Day validity depends on the calendar and is checked by
/// the calculator.
fn parse(period_type: PeriodType, id: &str) -> Option<Parsed> {
    if id.len() < 4 || !id.is_char_boundary(4) {
        return None;
    }
    let (year, rest) = id.split_at(4);
    if !all_digits(year) {
        return None;
    }
    let year: i32 = year.parse().ok()?;

    let index = match period_type {
        PeriodType::Daily => {
            if rest.len() != 4 || !all_digits(rest) {
                return None;
            }
            let month = number(&rest[..2], 2)?;
            let day = number(&rest[2..], 2)?;
            return Some(Parsed::Day(LocalDate::new(year, month, day)));
        }
        PeriodType::Weekly => {
            let week = number(rest.strip_prefix('W')?, 2)?;
            NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
            return Some(Parsed::Week { year, week });
        }
        PeriodType::Monthly if rest.len() == 2 => number(rest, 2)?,
        PeriodType::Monthly => return None,
        PeriodType::BiMonthly => {
            let digits = rest.strip_suffix('B')?;
            if digits.len() != 2 {
                return None;
            }
            number(digits, 2)?
        }
        PeriodType::Quarterly => number(rest.strip_prefix('Q')?, 1)?,
        PeriodType::SixMonthly => number(rest.strip_prefix('S')?, 1)?,
        PeriodType::SixMonthlyApril => number(rest.strip_prefix("AprilS")?, 1)?,
        PeriodType::Yearly if rest.is_empty() => 1,
        PeriodType::FinancialApril if rest == "April" => 1,
        PeriodType::FinancialJuly if rest == "July" => 1,
        PeriodType::FinancialOct if rest == "Oct" => 1,
        PeriodType::Yearly
        | PeriodType::FinancialApril
        | PeriodType::FinancialJuly
        | PeriodType::FinancialOct => return None,
    };

    let Shape::Months { span, .. } = period_type.shape() else {
        return None;
    };
    if index == 0 || index > 12 / span {
        return None;
    }
    Some(Parsed::Span { year, index })
}

fn render(period_type: PeriodType, parsed: Parsed) -> String {
    match parsed {
        Parsed::Day(d) => format!("{:04}{:02}{:02}", d.year, d.month, d.day),
        Parsed::Week { year, week } => format!("{year:04}W{week}"),
        Parsed::Span { year, index } => match period_type {
            PeriodType::Monthly => format!("{year:04}{index:02}"),
            PeriodType::BiMonthly => format!("{year:04}{index:02}B"),
            PeriodType::Quarterly => format!("{year:04}Q{index}"),
            PeriodType::SixMonthly => format!("{year:04}S{index}"),
            PeriodType::SixMonthlyApril => format!("{year:04}AprilS{index}"),
            PeriodType::FinancialApril => format!("{year:04}April"),
            PeriodType::FinancialJuly => format!("{year:04}July"),
            PeriodType::FinancialOct => format!("{year:04}Oct"),
            PeriodType::Yearly | PeriodType::Daily | PeriodType::Weekly => format!("{year:04}"),
        },
    }
}

/// Period arithmetic bound to one calendar.
#[derive(Clone, Copy)]
pub struct PeriodCalculator {
    calendar: Calendar,
    system: &'static dyn CalendarSystem,
}

impl fmt::Debug for PeriodCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodCalculator")
            .field("calendar", &self.calendar)
            .finish()
    }
}

impl Default for PeriodCalculator {
    fn default() -> Self {
        Self::iso()
    }
}

impl PeriodCalculator {
    /// Fails with [`Error::UnsupportedCalendar`] when `calendar` has no
    /// registered conversion.
    pub fn new(calendar: Calendar) -> Result<Self> {
        Ok(Self {
            calendar,
            system: calendar.system()?,
        })
    }

    pub fn iso() -> Self {
        Self {
            calendar: Calendar::Iso8601,
            system: ISO_SYSTEM,
        }
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// Identifier of the `period_type` period containing `date`.
    pub fn period_key(&self, period_type: PeriodType, date: NaiveDate) -> String {
        let parsed = match period_type.shape() {
            Shape::Day => Parsed::Day(self.system.from_gregorian(date)),
            Shape::Week => {
                let week = date.iso_week();
                Parsed::Week {
                    year: week.year(),
                    week: week.week(),
                }
            }
            Shape::Months { span, offset } => {
                let local = self.system.from_gregorian(date);
                let month0 = local.month.min(12) - 1;
                let year = if month0 < offset {
                    local.year - 1
                } else {
                    local.year
                };
                let relative = (month0 + 12 - offset) % 12;
                Parsed::Span {
                    year,
                    index: relative / span + 1,
                }
            }
        };
        render(period_type, parsed)
    }

    /// Date window of `period_id`, the inverse of [`Self::period_key`].
    pub fn period_start_end(&self, period_type: PeriodType, period_id: &str) -> Result<PeriodWindow> {
        let parsed = self.parse(period_type, period_id)?;
        self.window(period_type, parsed)
    }

    /// Identifier of the period immediately after `period_id`.
    pub fn next_period_id(&self, period_type: PeriodType, period_id: &str) -> Result<String> {
        let parsed = self.parse(period_type, period_id)?;
        let next = match parsed {
            Parsed::Day(_) | Parsed::Week { .. } => {
                let window = self.window(period_type, parsed)?;
                let following = window
                    .end
                    .checked_add_days(Days::new(1))
                    .ok_or_else(|| Error::DateOutOfRange(self.calendar.to_string()))?;
                return Ok(self.period_key(period_type, following));
            }
            Parsed::Span { year, index } => {
                let Shape::Months { span, .. } = period_type.shape() else {
                    unreachable!("span periods are month based")
                };
                if index >= 12 / span {
                    Parsed::Span {
                        year: year + 1,
                        index: 1,
                    }
                } else {
                    Parsed::Span {
                        year,
                        index: index + 1,
                    }
                }
            }
        };
        Ok(render(period_type, next))
    }

    fn parse(&self, period_type: PeriodType, period_id: &str) -> Result<Parsed> {
        let invalid = || Error::InvalidPeriodIdentifier {
            period_type,
            id: period_id.to_string(),
        };
        let parsed = parse(period_type, period_id).ok_or_else(invalid)?;
        if let Parsed::Day(date) = parsed {
            if !self.system.is_valid(date) {
                return Err(invalid());
            }
        }
        Ok(parsed)
    }

    fn window(&self, period_type: PeriodType, parsed: Parsed) -> Result<PeriodWindow> {
        let out_of_range = || Error::DateOutOfRange(self.calendar.to_string());
        match parsed {
            Parsed::Day(date) => {
                let day = self.system.to_gregorian(date)?;
                Ok(PeriodWindow { start: day, end: day })
            }
            Parsed::Week { year, week } => {
                let start =
                    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(out_of_range)?;
                let end = start.checked_add_days(Days::new(6)).ok_or_else(out_of_range)?;
                Ok(PeriodWindow { start, end })
            }
            Parsed::Span { year, index } => {
                let Shape::Months { span, offset } = period_type.shape() else {
                    unreachable!("span periods are month based")
                };
                let first = offset + (index - 1) * span;
                let last = first + span - 1;
                let start = self.system.to_gregorian(LocalDate::new(
                    year + (first / 12) as i32,
                    first % 12 + 1,
                    1,
                ))?;
                let end = self.month_end(year + (last / 12) as i32, last % 12 + 1)?;
                Ok(PeriodWindow { start, end })
            }
        }
    }

    /// Last day of period month `month`; month 12 runs to the end of the
    /// calendar year so that a 13th month is absorbed.
    fn month_end(&self, year: i32, month: u32) -> Result<NaiveDate> {
        if month == 12 {
            return Ok(self.system.year_bounds(year)?.end);
        }
        let next = self.system.to_gregorian(LocalDate::new(year, month + 1, 1))?;
        next.checked_sub_days(Days::new(1))
            .ok_or_else(|| Error::DateOutOfRange(self.calendar.to_string()))
    }
}

/// Identifier of the ISO-calendar period containing `date`.
pub fn period_key(period_type: PeriodType, date: NaiveDate) -> String {
    PeriodCalculator::iso().period_key(period_type, date)
}

/// Date window of an ISO-calendar period identifier.
pub fn period_start_end(period_type: PeriodType, period_id: &str) -> Result<PeriodWindow> {
    PeriodCalculator::iso().period_start_end(period_type, period_id)
}

/// Identifier of the ISO-calendar period following `period_id`.
pub fn next_period_id(period_type: PeriodType, period_id: &str) -> Result<String> {
    PeriodCalculator::iso().next_period_id(period_type, period_id)
}

/// Sortable `(year, index, day)` key, so that the latest of a set of
/// identifiers of one type is its maximum.
pub fn period_sort_key(period_type: PeriodType, period_id: &str) -> Result<(i32, u32, u32)> {
    let parsed = parse(period_type, period_id).ok_or_else(|| Error::InvalidPeriodIdentifier {
        period_type,
        id: period_id.to_string(),
    })?;
    Ok(match parsed {
        Parsed::Day(d) => (d.year, d.month, d.day),
        Parsed::Week { year, week } => (year, week, 0),
        Parsed::Span { year, index } => (year, index, 0),
    })
}
