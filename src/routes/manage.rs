use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::{actor_validator, new_id, Actor},
    db,
    error::{Error, Result},
    models::{AppointmentRow, AppointmentStatus, PaymentMethod, TimeSlotRow},
    scheduling::{
        booking::{self, NotificationKind},
        fmt_date, fmt_time, parse_date, parse_time,
    },
    state::AppState,
};

#[derive(Deserialize)]
struct StatusForm {
    status: String,
}

#[derive(Deserialize)]
struct RescheduleForm {
    date: String,
    time: String,
}

#[derive(Deserialize)]
struct PaymentForm {
    payment_method: String,
}

#[derive(Deserialize)]
struct NotificationForm {
    kind: String,
}

#[derive(Deserialize)]
struct AppointmentFilter {
    status: Option<String>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct TimeSlotForm {
    staff_id: String,
    date: String,
    start_time: String,
    end_time: String,
    is_available: Option<bool>,
}

#[derive(Serialize)]
struct AppointmentView {
    id: String,
    customer_id: Option<String>,
    staff_id: String,
    service_id: String,
    date: String,
    time: String,
    status: String,
    notes: String,
    total_price: i64,
    is_paid: bool,
}

#[derive(Serialize)]
struct TimeSlotView {
    id: String,
    staff_id: String,
    date: String,
    start_time: String,
    end_time: String,
    is_available: bool,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/appointments/{id}")
            .wrap(HttpAuthentication::basic(actor_validator))
            .service(web::resource("/status").route(web::post().to(update_status)))
            .service(web::resource("/cancel").route(web::post().to(cancel)))
            .service(web::resource("/reschedule").route(web::post().to(reschedule)))
            .service(web::resource("/payment").route(web::post().to(record_payment)))
            .service(web::resource("/notifications").route(web::post().to(record_notification))),
    )
    .service(
        web::scope("/manage/salons/{salon_id}")
            .wrap(HttpAuthentication::basic(actor_validator))
            .service(web::resource("/appointments").route(web::get().to(list_appointments)))
            .service(web::resource("/appointments/today").route(web::get().to(today_appointments)))
            .service(
                web::resource("/time-slots")
                    .route(web::get().to(list_time_slots))
                    .route(web::post().to(create_time_slot)),
            ),
    );
}

async fn load_appointment(state: &AppState, appointment_id: &str) -> Result<AppointmentRow> {
    db::fetch_appointment(&state.db, appointment_id)
        .await?
        .ok_or(Error::NotFound("appointment"))
}

async fn update_status(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Json<StatusForm>,
    actor: web::ReqData<Actor>,
) -> Result<HttpResponse> {
    let appointment = load_appointment(&state, &path.into_inner()).await?;
    let new_status = AppointmentStatus::parse(&form.status)?;

    let updated = booking::update_status(&state.db, &appointment, new_status, &actor).await?;

    Ok(HttpResponse::Ok().json(json!({ "status": updated.status })))
}

async fn cancel(
    state: web::Data<AppState>,
    path: web::Path<String>,
    actor: web::ReqData<Actor>,
) -> Result<HttpResponse> {
    let appointment = load_appointment(&state, &path.into_inner()).await?;

    booking::cancel_appointment(&state.db, &appointment, &actor, Utc::now().naive_utc()).await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

async fn reschedule(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Json<RescheduleForm>,
    actor: web::ReqData<Actor>,
) -> Result<HttpResponse> {
    let appointment = load_appointment(&state, &path.into_inner()).await?;

    let updated = booking::reschedule_appointment(
        &state.db,
        &appointment,
        &form.date,
        &form.time,
        &actor,
        Utc::now().naive_utc(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "id": updated.id, "status": updated.status })))
}

async fn record_payment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Json<PaymentForm>,
    actor: web::ReqData<Actor>,
) -> Result<HttpResponse> {
    let appointment = load_appointment(&state, &path.into_inner()).await?;
    let method = PaymentMethod::parse(&form.payment_method)?;

    let updated = booking::record_payment(&state.db, &appointment, method, &actor).await?;

    Ok(HttpResponse::Ok().json(json!({
        "ok": true,
        "is_paid": updated.is_paid == 1,
        "payment_method": updated.payment_method,
    })))
}

async fn record_notification(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Json<NotificationForm>,
    actor: web::ReqData<Actor>,
) -> Result<HttpResponse> {
    let appointment = load_appointment(&state, &path.into_inner()).await?;
    let kind = NotificationKind::parse(&form.kind)?;

    booking::record_notification(&state.db, &appointment, kind, &actor).await?;

    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

async fn list_appointments(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<AppointmentFilter>,
    actor: web::ReqData<Actor>,
) -> Result<HttpResponse> {
    let salon_id = path.into_inner();
    let salon = db::fetch_salon(&state.db, &salon_id)
        .await?
        .ok_or(Error::NotFound("salon"))?;
    if !actor.manages(&salon) {
        return Err(Error::Unauthorized("only the salon owner or its staff can list appointments"));
    }

    let status_filter = match query.status.as_deref().filter(|value| !value.is_empty()) {
        Some(value) => Some(AppointmentStatus::parse(value)?.as_str().to_string()),
        None => None,
    };
    let date_filter = match query.date.as_deref().filter(|value| !value.is_empty()) {
        Some(value) => Some(fmt_date(parse_date(value)?)),
        None => None,
    };

    let appointments = fetch_salon_appointments(&state, &salon.id, status_filter, date_filter).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

async fn today_appointments(
    state: web::Data<AppState>,
    path: web::Path<String>,
    actor: web::ReqData<Actor>,
) -> Result<HttpResponse> {
    let salon_id = path.into_inner();
    let salon = db::fetch_salon(&state.db, &salon_id)
        .await?
        .ok_or(Error::NotFound("salon"))?;
    if !actor.manages(&salon) {
        return Err(Error::Unauthorized("only the salon owner or its staff can list appointments"));
    }

    let today = fmt_date(Utc::now().date_naive());
    let appointments = fetch_salon_appointments(&state, &salon.id, None, Some(today)).await?;
    Ok(HttpResponse::Ok().json(appointments))
}

async fn fetch_salon_appointments(
    state: &AppState,
    salon_id: &str,
    status: Option<String>,
    date: Option<String>,
) -> Result<Vec<AppointmentView>> {
    let rows = sqlx::query_as::<_, AppointmentRow>(
        r#"SELECT id, salon_id, customer_id, staff_id, service_id, appointment_date,
                  appointment_time, status, notes, total_price, is_paid, payment_method,
                  sms_sent, reminder_sent, created_at, updated_at
           FROM appointments
           WHERE salon_id = ?
             AND (? IS NULL OR status = ?)
             AND (? IS NULL OR appointment_date = ?)
           ORDER BY appointment_date, appointment_time"#,
    )
    .bind(salon_id)
    .bind(&status)
    .bind(&status)
    .bind(&date)
    .bind(&date)
    .fetch_all(&state.db)
    .await
    .map_err(Error::from)?;

    Ok(rows
        .into_iter()
        .map(|row| AppointmentView {
            id: row.id,
            customer_id: row.customer_id,
            staff_id: row.staff_id,
            service_id: row.service_id,
            date: row.appointment_date,
            time: row.appointment_time,
            status: row.status,
            notes: row.notes,
            total_price: row.total_price,
            is_paid: row.is_paid == 1,
        })
        .collect())
}

async fn list_time_slots(
    state: web::Data<AppState>,
    path: web::Path<String>,
    actor: web::ReqData<Actor>,
) -> Result<HttpResponse> {
    let salon_id = path.into_inner();
    let salon = db::fetch_salon(&state.db, &salon_id)
        .await?
        .ok_or(Error::NotFound("salon"))?;
    if !actor.manages(&salon) {
        return Err(Error::Unauthorized("only the salon owner or its staff can manage time slots"));
    }

    let rows = sqlx::query_as::<_, TimeSlotRow>(
        r#"SELECT id, salon_id, staff_id, date, start_time, end_time, is_available
           FROM time_slots
           WHERE salon_id = ?
           ORDER BY date, start_time"#,
    )
    .bind(&salon.id)
    .fetch_all(&state.db)
    .await
    .map_err(Error::from)?;

    let slots: Vec<TimeSlotView> = rows
        .into_iter()
        .map(|row| TimeSlotView {
            id: row.id,
            staff_id: row.staff_id,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            is_available: row.is_available == 1,
        })
        .collect();

    Ok(HttpResponse::Ok().json(slots))
}

async fn create_time_slot(
    state: web::Data<AppState>,
    path: web::Path<String>,
    form: web::Json<TimeSlotForm>,
    actor: web::ReqData<Actor>,
) -> Result<HttpResponse> {
    let salon_id = path.into_inner();
    let salon = db::fetch_salon(&state.db, &salon_id)
        .await?
        .ok_or(Error::NotFound("salon"))?;
    if !actor.manages(&salon) {
        return Err(Error::Unauthorized("only the salon owner or its staff can manage time slots"));
    }

    let staff = db::fetch_staff(&state.db, &form.staff_id)
        .await?
        .ok_or(Error::NotFound("staff"))?;
    if staff.salon_id != salon.id {
        return Err(Error::validation("staff member does not belong to this salon"));
    }

    let date = parse_date(&form.date)?;
    let start = parse_time(&form.start_time)?;
    let end = parse_time(&form.end_time)?;
    if start >= end {
        return Err(Error::validation("start time must be before end time"));
    }
    if date < Utc::now().date_naive() {
        return Err(Error::validation("date cannot be in the past"));
    }

    let slot_id = new_id();
    sqlx::query(
        r#"INSERT INTO time_slots (id, salon_id, staff_id, date, start_time, end_time, is_available)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&slot_id)
    .bind(&salon.id)
    .bind(&staff.id)
    .bind(fmt_date(date))
    .bind(fmt_time(start))
    .bind(fmt_time(end))
    .bind(form.is_available.unwrap_or(true) as i64)
    .execute(&state.db)
    .await
    .map_err(Error::from)?;

    Ok(HttpResponse::Created().json(json!({ "id": slot_id })))
}
