use chrono::NaiveDate;

use crate::FetchError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a date the way the upstream APIs and the archive layout expect.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse `YYYY-MM-DD`, ignoring any time part (`2022-03-07T00:00:00.000+0000`).
pub fn parse_date(input: &str) -> Result<NaiveDate, FetchError> {
    let day = input.split_once('T').map_or(input, |(day, _)| day);
    NaiveDate::parse_from_str(day.trim(), DATE_FORMAT).map_err(|_| FetchError::invalid_date(input))
}
