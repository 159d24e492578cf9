use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::SqlitePool;

use crate::{
    auth::{new_id, Actor},
    db,
    error::{Error, Result},
    models::{AppointmentRow, AppointmentStatus, PaymentMethod, SalonRow, ROLE_CUSTOMER},
};

use super::{calendar, combine, conflict, fmt_date, fmt_time, lifecycle, parse_date, parse_time};

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub salon_id: String,
    pub service_id: String,
    pub staff_id: String,
    pub date: String,
    pub time: String,
    pub customer_id: Option<String>,
    pub guest: Option<GuestInfo>,
    pub notes: String,
    pub total_price: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct GuestInfo {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, Copy)]
pub enum NotificationKind {
    Reminder,
    ConfirmationSms,
}

impl NotificationKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "reminder" => Ok(NotificationKind::Reminder),
            "confirmation_sms" => Ok(NotificationKind::ConfirmationSms),
            other => Err(Error::validation(format!("invalid notification kind: '{other}'"))),
        }
    }
}

/// Books a slot. Gates run in order and the first failure wins; the partial
/// unique index on occupying appointments arbitrates concurrent attempts for
/// the same slot, so the upfront occupancy check only exists to produce a
/// clean error on the common path.
pub async fn book_appointment(
    pool: &SqlitePool,
    request: &BookingRequest,
    now: NaiveDateTime,
) -> Result<AppointmentRow> {
    let salon = db::fetch_salon(pool, &request.salon_id)
        .await?
        .ok_or(Error::NotFound("salon"))?;
    if salon.is_active == 0 {
        return Err(Error::validation("salon is not accepting bookings"));
    }

    let staff = db::fetch_staff(pool, &request.staff_id)
        .await?
        .ok_or(Error::NotFound("staff"))?;
    if staff.salon_id != salon.id {
        return Err(Error::validation("staff member does not belong to this salon"));
    }

    let service = db::fetch_service(pool, &request.service_id)
        .await?
        .ok_or(Error::NotFound("service"))?;
    if service.salon_id != salon.id {
        return Err(Error::validation("service does not belong to this salon"));
    }
    if service.is_active == 0 {
        return Err(Error::validation("service is not active"));
    }

    let date = parse_date(&request.date)?;
    let time = parse_time(&request.time)?;
    validate_slot(&salon, date, time, now)?;

    if conflict::is_occupied(pool, &salon.id, &staff.id, date, time).await? {
        return Err(Error::SlotConflict);
    }

    let customer_id = resolve_customer(pool, request).await?;

    let total_price = match request.total_price {
        Some(price) if price <= 0 => {
            return Err(Error::validation("total price must be positive"))
        }
        Some(price) => price,
        None => service.price,
    };

    let appointment_id = new_id();
    let stamp = Utc::now().to_rfc3339();

    let mut tx = pool.begin().await.map_err(Error::from)?;

    sqlx::query(
        r#"INSERT INTO appointments
           (id, salon_id, customer_id, staff_id, service_id, appointment_date,
            appointment_time, status, notes, total_price, is_paid, payment_method,
            sms_sent, reminder_sent, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, NULL, 0, 0, ?, ?)"#,
    )
    .bind(&appointment_id)
    .bind(&salon.id)
    .bind(&customer_id)
    .bind(&staff.id)
    .bind(&service.id)
    .bind(fmt_date(date))
    .bind(fmt_time(time))
    .bind(AppointmentStatus::Pending.as_str())
    .bind(&request.notes)
    .bind(total_price)
    .bind(&stamp)
    .bind(&stamp)
    .execute(&mut *tx)
    .await?;

    // Attaching a customer to an appointment tags that user with the customer
    // role. Deliberate cross-entity write, applied in the same transaction.
    if let Some(ref customer_id) = customer_id {
        sqlx::query("UPDATE users SET role = ? WHERE id = ? AND role <> ?")
            .bind(ROLE_CUSTOMER)
            .bind(customer_id)
            .bind(ROLE_CUSTOMER)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    log::info!(
        "booked appointment {appointment_id} for salon {} staff {} at {} {}",
        salon.id,
        staff.id,
        request.date,
        request.time
    );
    db::log_activity(
        pool,
        "appointment_created",
        &format!("Appointment booked with {} at {} {}.", staff.display_name, request.date, request.time),
        customer_id.as_deref(),
        Some(&appointment_id),
    )
    .await;

    db::fetch_appointment(pool, &appointment_id)
        .await?
        .ok_or(Error::NotFound("appointment"))
}

/// Moves an appointment to a new slot. Customer-only; the 2-hour lead-time
/// rule applies to the ORIGINAL slot, and the new slot must pass every
/// booking gate with the appointment's own row excluded from the occupancy
/// check. A reschedule always drops back to pending for re-confirmation.
pub async fn reschedule_appointment(
    pool: &SqlitePool,
    appointment: &AppointmentRow,
    new_date: &str,
    new_time: &str,
    actor: &Actor,
    now: NaiveDateTime,
) -> Result<AppointmentRow> {
    if appointment.customer_id.as_deref() != Some(actor.user_id.as_str()) {
        return Err(Error::Unauthorized("only the booking customer can reschedule"));
    }

    lifecycle::ensure_can_cancel(appointment, now)?;

    let salon = db::fetch_salon(pool, &appointment.salon_id)
        .await?
        .ok_or(Error::NotFound("salon"))?;

    let date = parse_date(new_date)?;
    let time = parse_time(new_time)?;
    validate_slot(&salon, date, time, now)?;

    if conflict::is_occupied_excluding(pool, &salon.id, &appointment.staff_id, date, time, Some(&appointment.id))
        .await?
    {
        return Err(Error::SlotConflict);
    }

    sqlx::query(
        r#"UPDATE appointments
           SET appointment_date = ?, appointment_time = ?, status = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(fmt_date(date))
    .bind(fmt_time(time))
    .bind(AppointmentStatus::Pending.as_str())
    .bind(Utc::now().to_rfc3339())
    .bind(&appointment.id)
    .execute(pool)
    .await?;

    db::log_activity(
        pool,
        "appointment_rescheduled",
        &format!("Appointment {} moved to {new_date} {new_time}.", appointment.id),
        Some(&actor.user_id),
        Some(&appointment.id),
    )
    .await;

    db::fetch_appointment(pool, &appointment.id)
        .await?
        .ok_or(Error::NotFound("appointment"))
}

pub async fn cancel_appointment(
    pool: &SqlitePool,
    appointment: &AppointmentRow,
    actor: &Actor,
    now: NaiveDateTime,
) -> Result<AppointmentRow> {
    let salon = db::fetch_salon(pool, &appointment.salon_id)
        .await?
        .ok_or(Error::NotFound("salon"))?;

    let is_owning_customer = appointment.customer_id.as_deref() == Some(actor.user_id.as_str());
    if !is_owning_customer && !actor.manages(&salon) {
        return Err(Error::Unauthorized("you are not allowed to cancel this appointment"));
    }

    lifecycle::ensure_can_cancel(appointment, now)?;

    let updated = apply_status(pool, &appointment.id, AppointmentStatus::Cancelled).await?;

    db::log_activity(
        pool,
        "appointment_cancelled",
        &format!("Appointment {} cancelled by {}.", appointment.id, actor.display_name),
        Some(&actor.user_id),
        Some(&appointment.id),
    )
    .await;

    Ok(updated)
}

/// Owner/staff status change. Creation and customer cancel go through their
/// own paths; everything else lands here and is checked against the
/// transition table.
pub async fn update_status(
    pool: &SqlitePool,
    appointment: &AppointmentRow,
    new_status: AppointmentStatus,
    actor: &Actor,
) -> Result<AppointmentRow> {
    let salon = db::fetch_salon(pool, &appointment.salon_id)
        .await?
        .ok_or(Error::NotFound("salon"))?;
    if !actor.manages(&salon) {
        return Err(Error::Unauthorized(
            "only the salon owner or its staff can change appointment status",
        ));
    }

    lifecycle::ensure_transition(appointment.status()?, new_status)?;

    let updated = apply_status(pool, &appointment.id, new_status).await?;

    db::log_activity(
        pool,
        "appointment_status_changed",
        &format!(
            "{} set appointment {} to {}.",
            actor.display_name,
            appointment.id,
            new_status.as_str()
        ),
        Some(&actor.user_id),
        Some(&appointment.id),
    )
    .await;

    Ok(updated)
}

/// Records that payment happened out of band. No processing, flags only.
pub async fn record_payment(
    pool: &SqlitePool,
    appointment: &AppointmentRow,
    method: PaymentMethod,
    actor: &Actor,
) -> Result<AppointmentRow> {
    let salon = db::fetch_salon(pool, &appointment.salon_id)
        .await?
        .ok_or(Error::NotFound("salon"))?;
    if !actor.manages(&salon) {
        return Err(Error::Unauthorized("only the salon owner or its staff can record payment"));
    }

    sqlx::query("UPDATE appointments SET is_paid = 1, payment_method = ?, updated_at = ? WHERE id = ?")
        .bind(method.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(&appointment.id)
        .execute(pool)
        .await?;

    db::fetch_appointment(pool, &appointment.id)
        .await?
        .ok_or(Error::NotFound("appointment"))
}

/// Records that a reminder or confirmation SMS was sent by the external
/// messaging system. Flags only.
pub async fn record_notification(
    pool: &SqlitePool,
    appointment: &AppointmentRow,
    kind: NotificationKind,
    actor: &Actor,
) -> Result<AppointmentRow> {
    let salon = db::fetch_salon(pool, &appointment.salon_id)
        .await?
        .ok_or(Error::NotFound("salon"))?;
    if !actor.manages(&salon) {
        return Err(Error::Unauthorized("only the salon owner or its staff can record notifications"));
    }

    let column = match kind {
        NotificationKind::Reminder => "reminder_sent",
        NotificationKind::ConfirmationSms => "sms_sent",
    };
    sqlx::query(&format!(
        "UPDATE appointments SET {column} = 1, updated_at = ? WHERE id = ?"
    ))
    .bind(Utc::now().to_rfc3339())
    .bind(&appointment.id)
    .execute(pool)
    .await?;

    db::fetch_appointment(pool, &appointment.id)
        .await?
        .ok_or(Error::NotFound("appointment"))
}

fn validate_slot(salon: &SalonRow, date: NaiveDate, time: NaiveTime, now: NaiveDateTime) -> Result<()> {
    if !calendar::is_open(salon, date) {
        return Err(Error::validation("salon is closed on that day"));
    }

    let (open, close) = calendar::working_window(salon)?;
    if time < open || time > close {
        return Err(Error::validation(format!(
            "appointment time must be between {} and {}",
            salon.opening_time, salon.closing_time
        )));
    }

    if combine(date, time) < now {
        return Err(Error::validation("appointment time is in the past"));
    }

    Ok(())
}

async fn resolve_customer(pool: &SqlitePool, request: &BookingRequest) -> Result<Option<String>> {
    if let Some(ref customer_id) = request.customer_id {
        let exists = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE id = ? LIMIT 1")
            .bind(customer_id)
            .fetch_optional(pool)
            .await?;
        return exists.map(Some).ok_or(Error::NotFound("customer"));
    }

    if let Some(ref guest) = request.guest {
        return Ok(Some(find_or_create_guest(pool, guest).await?));
    }

    Ok(None)
}

/// Walk-in bookings get a placeholder customer keyed by phone number. The
/// insert-or-ignore against the unique phone column keeps concurrent
/// submissions idempotent; whoever inserted first wins and everyone reads
/// that row back.
pub async fn find_or_create_guest(pool: &SqlitePool, guest: &GuestInfo) -> Result<String> {
    let phone = guest.phone.trim();
    if phone.is_empty() {
        return Err(Error::validation("guest phone number is required"));
    }

    sqlx::query(
        r#"INSERT INTO users (id, username, display_name, role, phone, password_hash, created_at)
           VALUES (?, ?, ?, ?, ?, NULL, ?)
           ON CONFLICT(phone) DO NOTHING"#,
    )
    .bind(new_id())
    .bind(format!("guest_{phone}"))
    .bind(guest.name.trim())
    .bind(ROLE_CUSTOMER)
    .bind(phone)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    let id = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE phone = ? LIMIT 1")
        .bind(phone)
        .fetch_optional(pool)
        .await?
        .ok_or(Error::NotFound("customer"))?;
    Ok(id)
}

async fn apply_status(
    pool: &SqlitePool,
    appointment_id: &str,
    status: AppointmentStatus,
) -> Result<AppointmentRow> {
    sqlx::query("UPDATE appointments SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(appointment_id)
        .execute(pool)
        .await?;

    db::fetch_appointment(pool, appointment_id)
        .await?
        .ok_or(Error::NotFound("appointment"))
}
