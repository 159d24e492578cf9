use chrono::{Duration, NaiveDateTime};

use crate::{
    error::{Error, Result},
    models::{AppointmentRow, AppointmentStatus},
};

use super::{combine, parse_date, parse_time};

/// Minimum gap between now and the appointment start for a customer-facing
/// cancel or reschedule.
pub fn cancel_lead_time() -> Duration {
    Duration::hours(2)
}

pub fn appointment_datetime(appointment: &AppointmentRow) -> Result<NaiveDateTime> {
    let date = parse_date(&appointment.appointment_date)?;
    let time = parse_time(&appointment.appointment_time)?;
    Ok(combine(date, time))
}

pub fn can_cancel(status: AppointmentStatus, starts_at: NaiveDateTime, now: NaiveDateTime) -> bool {
    !status.is_terminal() && now + cancel_lead_time() < starts_at
}

pub fn ensure_can_cancel(appointment: &AppointmentRow, now: NaiveDateTime) -> Result<()> {
    let status = appointment.status()?;
    if status.is_terminal() {
        return Err(Error::PolicyViolation(format!(
            "a {} appointment can no longer be changed",
            status.as_str()
        )));
    }
    if !can_cancel(status, appointment_datetime(appointment)?, now) {
        return Err(Error::PolicyViolation(
            "appointments can only be cancelled or moved at least 2 hours before the start time"
                .to_string(),
        ));
    }
    Ok(())
}

/// Legality of a status change. pending -> confirmed -> in_progress ->
/// completed is the working chain; any occupying status may drop to cancelled
/// or no_show; terminal statuses accept nothing.
pub fn ensure_transition(from: AppointmentStatus, to: AppointmentStatus) -> Result<()> {
    use AppointmentStatus::*;

    let allowed = match (from, to) {
        (Pending, Confirmed) => true,
        (Confirmed, InProgress) => true,
        (InProgress, Completed) => true,
        (from, Cancelled) | (from, NoShow) => from.is_occupying(),
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(Error::IllegalTransition {
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}
