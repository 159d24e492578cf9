use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

use crate::{error::Result, models::SalonRow};

use super::parse_time;

/// Parses the salon's comma-separated closed-day list ("friday" or
/// "friday,saturday", any case). Unknown tokens are ignored.
pub fn closed_day_set(closed_days: &str) -> HashSet<Weekday> {
    closed_days
        .split(',')
        .filter_map(|token| token.trim().to_lowercase().parse::<Weekday>().ok())
        .collect()
}

pub fn is_open(salon: &SalonRow, date: NaiveDate) -> bool {
    !closed_day_set(&salon.closed_days).contains(&date.weekday())
}

pub fn working_window(salon: &SalonRow) -> Result<(NaiveTime, NaiveTime)> {
    let open = parse_time(&salon.opening_time)?;
    let close = parse_time(&salon.closing_time)?;
    Ok((open, close))
}
