//! Fiscal months
//!
//! The fiscal year runs APRIL through MARCH. Months are stored and serialized
//! as their upper-case English names.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Month {
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
    January,
    February,
    March,
}

impl Month {
    /// Months in fiscal order, APRIL first
    pub const FISCAL_ORDER: [Month; 12] = [
        Month::April,
        Month::May,
        Month::June,
        Month::July,
        Month::August,
        Month::September,
        Month::October,
        Month::November,
        Month::December,
        Month::January,
        Month::February,
        Month::March,
    ];

    /// Parse a full month name or a three-letter abbreviation, ignoring case
    pub fn parse(raw: &str) -> Option<Month> {
        let month = match raw.trim().to_lowercase().as_str() {
            "jan" | "january" => Month::January,
            "feb" | "february" => Month::February,
            "mar" | "march" => Month::March,
            "apr" | "april" => Month::April,
            "may" => Month::May,
            "jun" | "june" => Month::June,
            "jul" | "july" => Month::July,
            "aug" | "august" => Month::August,
            "sep" | "sept" | "september" => Month::September,
            "oct" | "october" => Month::October,
            "nov" | "november" => Month::November,
            "dec" | "december" => Month::December,
            _ => return None,
        };
        Some(month)
    }

    /// Position in the fiscal year, APRIL = 0
    pub fn fiscal_index(self) -> usize {
        self as usize
    }

    /// Calendar month number, JANUARY = 1
    pub fn calendar_number(self) -> u8 {
        ((self.fiscal_index() + 3) % 12 + 1) as u8
    }

    pub fn from_calendar_number(number: u8) -> Option<Month> {
        if !(1..=12).contains(&number) {
            return None;
        }
        let fiscal = (usize::from(number) + 12 - 4) % 12;
        Some(Self::FISCAL_ORDER[fiscal])
    }

    /// The preceding month within the same fiscal year
    pub fn previous(self) -> Option<Month> {
        self.fiscal_index()
            .checked_sub(1)
            .map(|i| Self::FISCAL_ORDER[i])
    }

    pub fn name(self) -> &'static str {
        match self {
            Month::April => "APRIL",
            Month::May => "MAY",
            Month::June => "JUNE",
            Month::July => "JULY",
            Month::August => "AUGUST",
            Month::September => "SEPTEMBER",
            Month::October => "OCTOBER",
            Month::November => "NOVEMBER",
            Month::December => "DECEMBER",
            Month::January => "JANUARY",
            Month::February => "FEBRUARY",
            Month::March => "MARCH",
        }
    }

    /// Chart label, e.g. `APR`
    pub fn short_label(self) -> &'static str {
        &self.name()[..3]
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
