use chrono::NaiveDate;

/// Today's calendar date in the local timezone.
///
/// Report dates are local business days, so this deliberately avoids
/// deriving the date from a UTC timestamp.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Format a report date as `yyyy-MM-dd`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parse a `yyyy-MM-dd` report date
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}
