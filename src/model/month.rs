//! Ledger naming. Each calendar month has one spreadsheet, named `YYYY.MM`,
//! created externally before first use. This module owns that convention and
//! the `dd.mm.yyyy` date format used for entry rows.

use chrono::{Datelike, Local, NaiveDate};
use std::fmt;
use std::fmt::{Display, Formatter};

/// A calendar month, identifying one Ledger spreadsheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// The month of the local calendar date, i.e. the Ledger that new entries
    /// go into by default.
    pub(crate) fn current() -> Self {
        let today = Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    /// The spreadsheet name for this month.
    pub(crate) fn ledger_name(&self) -> String {
        format!("{:04}.{:02}", self.year, self.month)
    }
}

impl Display for Month {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ledger_name())
    }
}

/// Formats a date the way entry rows store it.
pub(crate) fn entry_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Today's date in entry-row format.
pub(crate) fn today() -> String {
    entry_date(Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_name_is_zero_padded() {
        let m = Month { year: 2026, month: 3 };
        assert_eq!(m.ledger_name(), "2026.03");
    }

    #[test]
    fn entry_date_format() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();
        assert_eq!(entry_date(d), "29.08.2026");
    }

    #[test]
    fn current_month_matches_today() {
        let name = Month::current().ledger_name();
        assert_eq!(name.len(), 7);
        assert_eq!(&name[4..5], ".");
    }
}
