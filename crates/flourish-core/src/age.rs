//! Age arithmetic in completed calendar months.

use chrono::{Datelike, NaiveDate};

/// Completed months between `dob` and `at`, or `None` when `dob` is later
/// than `at`.
///
/// A month is complete once the day-of-month of `dob` has been reached.
pub fn age_in_months(dob: NaiveDate, at: NaiveDate) -> Option<u32> {
  if dob > at {
    return None;
  }
  let mut months = (at.year() - dob.year()) * 12 + at.month() as i32
    - dob.month() as i32;
  if at.day() < dob.day() {
    months -= 1;
  }
  u32::try_from(months).ok()
}

/// Split a month count into `(years, months)` for display.
pub fn years_and_months(months: u32) -> (u32, u32) { (months / 12, months % 12) }
