use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    db,
    error::{Error, Result},
    models::{SalonRow, ServiceRow, StaffRow},
    scheduling::{
        booking::{self, BookingRequest, GuestInfo},
        conflict, fmt_time, parse_date,
        slots::DEFAULT_GRANULARITY_MINUTES,
    },
    state::AppState,
};

#[derive(Serialize)]
struct SalonView {
    id: String,
    name: String,
    phone: String,
    address: String,
    opening_time: String,
    closing_time: String,
    closed_days: String,
}

#[derive(Serialize)]
struct ServiceView {
    id: String,
    name: String,
    description: String,
    price: i64,
    duration_minutes: i64,
}

#[derive(Serialize)]
struct StaffView {
    id: String,
    display_name: String,
    specialties: String,
    is_available: bool,
}

#[derive(Deserialize)]
struct AvailableTimesQuery {
    staff_id: Option<String>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct GuestBody {
    name: Option<String>,
    phone: String,
}

#[derive(Deserialize)]
struct CreateAppointmentBody {
    salon_id: String,
    service_id: String,
    staff_id: String,
    date: String,
    time: String,
    customer_id: Option<String>,
    guest: Option<GuestBody>,
    notes: Option<String>,
    total_price: Option<i64>,
}

#[derive(Serialize)]
struct AppointmentDetail {
    id: String,
    salon: String,
    staff: String,
    service: String,
    customer_id: Option<String>,
    date: String,
    time: String,
    status: String,
    notes: String,
    total_price: i64,
    is_paid: bool,
    payment_method: Option<String>,
    sms_sent: bool,
    reminder_sent: bool,
    created_at: String,
    updated_at: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/salons").route(web::get().to(list_salons)))
        .service(web::resource("/api/salons/{id}/services").route(web::get().to(salon_services)))
        .service(web::resource("/api/salons/{id}/staff").route(web::get().to(salon_staff)))
        .service(
            web::resource("/api/salons/{id}/available-times").route(web::get().to(available_times)),
        )
        .service(web::resource("/api/appointments").route(web::post().to(create_appointment)))
        .service(web::resource("/api/appointments/{id}").route(web::get().to(appointment_detail)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn list_salons(state: web::Data<AppState>) -> Result<HttpResponse> {
    let rows = sqlx::query_as::<_, SalonRow>(
        r#"SELECT id, name, owner_id, phone, address, opening_time, closing_time,
                  closed_days, is_active, created_at
           FROM salons
           WHERE is_active = 1
           ORDER BY name"#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(Error::from)?;

    let salons: Vec<SalonView> = rows
        .into_iter()
        .map(|salon| SalonView {
            id: salon.id,
            name: salon.name,
            phone: salon.phone,
            address: salon.address,
            opening_time: salon.opening_time,
            closing_time: salon.closing_time,
            closed_days: salon.closed_days,
        })
        .collect();

    Ok(HttpResponse::Ok().json(salons))
}

async fn salon_services(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let salon_id = path.into_inner();
    db::fetch_salon(&state.db, &salon_id)
        .await?
        .ok_or(Error::NotFound("salon"))?;

    let rows = sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, salon_id, name, description, price, duration_minutes, is_active, created_at
           FROM services
           WHERE salon_id = ? AND is_active = 1
           ORDER BY name"#,
    )
    .bind(&salon_id)
    .fetch_all(&state.db)
    .await
    .map_err(Error::from)?;

    let services: Vec<ServiceView> = rows
        .into_iter()
        .map(|service| ServiceView {
            id: service.id,
            name: service.name,
            description: service.description,
            price: service.price,
            duration_minutes: service.duration_minutes,
        })
        .collect();

    Ok(HttpResponse::Ok().json(services))
}

async fn salon_staff(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let salon_id = path.into_inner();
    db::fetch_salon(&state.db, &salon_id)
        .await?
        .ok_or(Error::NotFound("salon"))?;

    let rows = sqlx::query_as::<_, StaffRow>(
        r#"SELECT s.id, s.user_id, s.salon_id, s.specialties, s.is_available,
                  u.display_name
           FROM staff s
           JOIN users u ON s.user_id = u.id
           WHERE s.salon_id = ?
           ORDER BY u.display_name"#,
    )
    .bind(&salon_id)
    .fetch_all(&state.db)
    .await
    .map_err(Error::from)?;

    let staff: Vec<StaffView> = rows
        .into_iter()
        .map(|member| StaffView {
            id: member.id,
            display_name: member.display_name,
            specialties: member.specialties,
            is_available: member.is_available == 1,
        })
        .collect();

    Ok(HttpResponse::Ok().json(staff))
}

async fn available_times(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<AvailableTimesQuery>,
) -> Result<HttpResponse> {
    let salon_id = path.into_inner();
    let staff_id = query
        .staff_id
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| Error::validation("staff_id is required"))?;
    let date_str = query
        .date
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| Error::validation("date is required"))?;

    let salon = db::fetch_salon(&state.db, &salon_id)
        .await?
        .ok_or(Error::NotFound("salon"))?;
    let staff = db::fetch_staff(&state.db, staff_id)
        .await?
        .ok_or(Error::NotFound("staff"))?;
    if staff.salon_id != salon.id {
        return Err(Error::validation("staff member does not belong to this salon"));
    }

    let date = parse_date(date_str)?;
    let times =
        conflict::available_times(&state.db, &salon, &staff.id, date, DEFAULT_GRANULARITY_MINUTES)
            .await?;
    let times: Vec<String> = times.into_iter().map(fmt_time).collect();

    Ok(HttpResponse::Ok().json(json!({ "times": times })))
}

async fn create_appointment(
    state: web::Data<AppState>,
    body: web::Json<CreateAppointmentBody>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let request = BookingRequest {
        salon_id: body.salon_id,
        service_id: body.service_id,
        staff_id: body.staff_id,
        date: body.date,
        time: body.time,
        customer_id: body.customer_id,
        guest: body.guest.map(|guest| GuestInfo {
            name: guest.name.unwrap_or_default(),
            phone: guest.phone,
        }),
        notes: body.notes.unwrap_or_default(),
        total_price: body.total_price,
    };

    let appointment =
        booking::book_appointment(&state.db, &request, Utc::now().naive_utc()).await?;

    Ok(HttpResponse::Created().json(json!({
        "id": appointment.id,
        "status": appointment.status,
    })))
}

async fn appointment_detail(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let appointment_id = path.into_inner();
    let appointment = db::fetch_appointment(&state.db, &appointment_id)
        .await?
        .ok_or(Error::NotFound("appointment"))?;

    let salon = db::fetch_salon(&state.db, &appointment.salon_id).await?;
    let staff = db::fetch_staff(&state.db, &appointment.staff_id).await?;
    let service = db::fetch_service(&state.db, &appointment.service_id).await?;

    let detail = AppointmentDetail {
        id: appointment.id,
        salon: salon.map(|row| row.name).unwrap_or_default(),
        staff: staff.map(|row| row.display_name).unwrap_or_default(),
        service: service.map(|row| row.name).unwrap_or_default(),
        customer_id: appointment.customer_id,
        date: appointment.appointment_date,
        time: appointment.appointment_time,
        status: appointment.status,
        notes: appointment.notes,
        total_price: appointment.total_price,
        is_paid: appointment.is_paid == 1,
        payment_method: appointment.payment_method,
        sms_sent: appointment.sms_sent == 1,
        reminder_sent: appointment.reminder_sent == 1,
        created_at: appointment.created_at,
        updated_at: appointment.updated_at,
    };

    Ok(HttpResponse::Ok().json(detail))
}
