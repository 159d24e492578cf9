use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};
use sqlx::SqlitePool;

use crate::{
    error::Result,
    models::{SalonRow, OCCUPYING_STATUSES},
};

use super::{calendar, fmt_date, fmt_time, slots};

/// True iff an appointment in an occupying status already holds the exact
/// (salon, staff, date, time) tuple. Terminal and cancelled appointments do
/// not block the slot.
pub async fn is_occupied(
    pool: &SqlitePool,
    salon_id: &str,
    staff_id: &str,
    date: NaiveDate,
    time: NaiveTime,
) -> Result<bool> {
    is_occupied_excluding(pool, salon_id, staff_id, date, time, None).await
}

/// Occupancy check that can ignore one appointment id, used when a reschedule
/// re-validates a slot against everything except the appointment's own row.
pub async fn is_occupied_excluding(
    pool: &SqlitePool,
    salon_id: &str,
    staff_id: &str,
    date: NaiveDate,
    time: NaiveTime,
    exclude_id: Option<&str>,
) -> Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"SELECT COUNT(*) FROM appointments
           WHERE salon_id = ? AND staff_id = ?
             AND appointment_date = ? AND appointment_time = ?
             AND status IN (?, ?, ?)
             AND (? IS NULL OR id <> ?)"#,
    )
    .bind(salon_id)
    .bind(staff_id)
    .bind(fmt_date(date))
    .bind(fmt_time(time))
    .bind(OCCUPYING_STATUSES[0])
    .bind(OCCUPYING_STATUSES[1])
    .bind(OCCUPYING_STATUSES[2])
    .bind(exclude_id)
    .bind(exclude_id)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

pub async fn booked_times(
    pool: &SqlitePool,
    salon_id: &str,
    staff_id: &str,
    date: NaiveDate,
) -> Result<Vec<String>> {
    let times = sqlx::query_scalar::<_, String>(
        r#"SELECT appointment_time FROM appointments
           WHERE salon_id = ? AND staff_id = ? AND appointment_date = ?
             AND status IN (?, ?, ?)"#,
    )
    .bind(salon_id)
    .bind(staff_id)
    .bind(fmt_date(date))
    .bind(OCCUPYING_STATUSES[0])
    .bind(OCCUPYING_STATUSES[1])
    .bind(OCCUPYING_STATUSES[2])
    .fetch_all(pool)
    .await?;
    Ok(times)
}

/// The bookable times for a staff member on a date: the candidate grid minus
/// occupied slots, ascending. Returns an empty list when the salon is closed
/// on that date.
pub async fn available_times(
    pool: &SqlitePool,
    salon: &SalonRow,
    staff_id: &str,
    date: NaiveDate,
    granularity_minutes: i64,
) -> Result<Vec<NaiveTime>> {
    if !calendar::is_open(salon, date) {
        return Ok(Vec::new());
    }

    let (open, close) = calendar::working_window(salon)?;
    let booked: HashSet<String> = booked_times(pool, &salon.id, staff_id, date)
        .await?
        .into_iter()
        .collect();

    Ok(slots::generate_candidates(open, close, granularity_minutes)
        .into_iter()
        .filter(|time| !booked.contains(&fmt_time(*time)))
        .collect())
}
