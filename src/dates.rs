/// Date parsing and day-offset normalization.
///
/// Offsets are whole days from a reference date. Which reference applies is
/// a pipeline-wide choice (`DateReference`): either the earliest observation
/// in the whole dataset, or the earliest observation of each fitted group.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::model::PhenoError;

/// Accepted calendar formats, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateReference {
    /// Earliest leaf observation across the whole dataset.
    #[default]
    Global,
    /// Earliest date within each individual or species aggregate.
    PerGroup,
}

/// Parses a calendar date cell. A time-of-day component is discarded.
pub fn parse_date(column: &str, value: &str) -> Result<NaiveDate, PhenoError> {
    let trimmed = value.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    chrono::NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT)
        .map(|dt| dt.date())
        .map_err(|_| PhenoError::InvalidDate {
            column: column.to_string(),
            value: value.to_string(),
        })
}

/// Whole days from `reference` to `date`.
pub fn day_offset(date: NaiveDate, reference: NaiveDate) -> i64 {
    (date - reference).num_days()
}

/// Earliest date in `dates`, or `None` for an empty slice.
pub fn earliest(dates: &[NaiveDate]) -> Option<NaiveDate> {
    dates.iter().min().copied()
}

/// Offsets of every date from the earliest one in the slice.
///
/// The earliest date maps to 0 and all offsets are non-negative.
pub fn offsets_from_earliest(dates: &[NaiveDate]) -> Vec<i64> {
    match earliest(dates) {
        Some(reference) => dates.iter().map(|&d| day_offset(d, reference)).collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // --- Parsing ------------------------------------------------------------

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(parse_date("Observation_Date", "2019-04-02").unwrap(), ymd(2019, 4, 2));
    }

    #[test]
    fn test_parse_us_date() {
        assert_eq!(parse_date("Observation_Date", "04/02/2019").unwrap(), ymd(2019, 4, 2));
    }

    #[test]
    fn test_parse_datetime_discards_time() {
        assert_eq!(
            parse_date("Edited_Date", "2019-04-02 17:45:10").unwrap(),
            ymd(2019, 4, 2)
        );
    }

    #[test]
    fn test_unparseable_date_names_the_column() {
        let err = parse_date("Edited_Date", "spring").unwrap_err();
        assert_eq!(
            err,
            PhenoError::InvalidDate {
                column: "Edited_Date".to_string(),
                value: "spring".to_string(),
            }
        );
    }

    // --- Offsets ------------------------------------------------------------

    #[test]
    fn test_earliest_date_has_zero_offset() {
        let dates = vec![ymd(2019, 3, 10), ymd(2019, 1, 1), ymd(2019, 2, 1)];
        let offsets = offsets_from_earliest(&dates);
        assert_eq!(offsets, vec![68, 0, 31]);
    }

    #[test]
    fn test_offsets_are_monotone_in_calendar_date() {
        let mut dates = vec![
            ymd(2020, 12, 31),
            ymd(2020, 2, 29),
            ymd(2021, 1, 1),
            ymd(2020, 2, 28),
            ymd(2020, 2, 28),
        ];
        dates.sort();
        let offsets = offsets_from_earliest(&dates);
        assert_eq!(offsets[0], 0);
        assert!(offsets.windows(2).all(|w| w[0] <= w[1]), "offsets {:?}", offsets);
        assert!(offsets.iter().all(|&o| o >= 0));
    }

    #[test]
    fn test_offsets_span_year_boundary_in_whole_days() {
        assert_eq!(day_offset(ymd(2020, 1, 1), ymd(2019, 1, 1)), 365);
        assert_eq!(day_offset(ymd(2021, 1, 1), ymd(2020, 1, 1)), 366);
    }

    #[test]
    fn test_empty_group_has_no_offsets() {
        assert!(offsets_from_earliest(&[]).is_empty());
        assert_eq!(earliest(&[]), None);
    }
}
