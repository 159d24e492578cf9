//! JSON API tests over an actix test service.

use actix_web::{http::StatusCode, test, web, App};
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use nailbook::auth::hash_password;
use nailbook::models::{ROLE_CUSTOMER, ROLE_SALON_OWNER, ROLE_STAFF};
use nailbook::routes;
use nailbook::state::AppState;

const SALON: &str = "salon-1";
const STAFF: &str = "staff-1";
const SERVICE: &str = "svc-1";

// "owner:secret" / "cust1:pass123"
const OWNER_AUTH: &str = "Basic b3duZXI6c2VjcmV0";
const CUSTOMER_AUTH: &str = "Basic Y3VzdDE6cGFzczEyMw==";

async fn setup() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    nailbook::db::run_migrations(&pool).await.unwrap();

    let owner_hash = hash_password("secret").unwrap();
    let customer_hash = hash_password("pass123").unwrap();

    for (id, username, display_name, role, hash) in [
        ("owner-1", "owner", "Owner", ROLE_SALON_OWNER, Some(owner_hash)),
        ("staff-user-1", "staff1", "Sara", ROLE_STAFF, None),
        ("cust-1", "cust1", "Mina", ROLE_CUSTOMER, Some(customer_hash)),
    ] {
        sqlx::query(
            r#"INSERT INTO users (id, username, display_name, role, phone, password_hash, created_at)
               VALUES (?, ?, ?, ?, NULL, ?, '')"#,
        )
        .bind(id)
        .bind(username)
        .bind(display_name)
        .bind(role)
        .bind(hash)
        .execute(&pool)
        .await
        .unwrap();
    }

    sqlx::query(
        r#"INSERT INTO salons (id, name, owner_id, phone, address, opening_time, closing_time,
                               closed_days, is_active, created_at)
           VALUES (?, 'Test Salon', 'owner-1', '', '', '09:00', '18:00', 'friday', 1, '')"#,
    )
    .bind(SALON)
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO staff (id, user_id, salon_id, specialties, is_available) VALUES (?, 'staff-user-1', ?, '', 1)",
    )
    .bind(STAFF)
    .bind(SALON)
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        r#"INSERT INTO services (id, salon_id, name, description, price, duration_minutes,
                                 is_active, created_at)
           VALUES (?, ?, 'Gel Polish', '', 4000000, 60, 1, '')"#,
    )
    .bind(SERVICE)
    .bind(SALON)
    .execute(&pool)
    .await
    .unwrap();

    pool
}

macro_rules! service {
    ($pool:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState { db: $pool.clone() }))
                .configure(routes::api::configure)
                .configure(routes::manage::configure),
        )
        .await
    };
}

/// A date a month out that is not one of the salon's closed Fridays, so
/// bookings against the real clock always pass the past-date gate.
fn future_open_date() -> String {
    let mut date: NaiveDate = Utc::now().date_naive() + Duration::days(30);
    while date.weekday() == Weekday::Fri {
        date += Duration::days(1);
    }
    date.format("%Y-%m-%d").to_string()
}

fn booking_body(date: &str, time: &str) -> Value {
    json!({
        "salon_id": SALON,
        "service_id": SERVICE,
        "staff_id": STAFF,
        "date": date,
        "time": time,
        "customer_id": "cust-1",
    })
}

#[actix_web::test]
async fn lists_the_full_half_hour_grid() {
    let pool = setup().await;
    let app = service!(pool);
    let date = future_open_date();

    let req = test::TestRequest::get()
        .uri(&format!("/api/salons/{SALON}/available-times?staff_id={STAFF}&date={date}"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let times = body["times"].as_array().unwrap();
    assert_eq!(times.len(), 18);
    assert_eq!(times[0], "09:00");
    assert_eq!(times[17], "17:30");
}

#[actix_web::test]
async fn missing_query_params_are_a_validation_error() {
    let pool = setup().await;
    let app = service!(pool);

    let req = test::TestRequest::get()
        .uri(&format!("/api/salons/{SALON}/available-times?staff_id={STAFF}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "validation_error");
}

#[actix_web::test]
async fn unknown_salon_is_not_found() {
    let pool = setup().await;
    let app = service!(pool);

    let req = test::TestRequest::get()
        .uri("/api/salons/nope/available-times?staff_id=staff-1&date=2030-01-07")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn booking_then_relisting_drops_the_taken_slot() {
    let pool = setup().await;
    let app = service!(pool);
    let date = future_open_date();

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .set_json(booking_body(&date, "09:00"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "pending");
    assert!(body["id"].as_str().is_some());

    let req = test::TestRequest::get()
        .uri(&format!("/api/salons/{SALON}/available-times?staff_id={STAFF}&date={date}"))
        .to_request();
    let listing: Value = test::call_and_read_body_json(&app, req).await;
    let times = listing["times"].as_array().unwrap();
    assert_eq!(times.len(), 17);
    assert!(!times.iter().any(|time| time == "09:00"));
}

#[actix_web::test]
async fn double_booking_is_a_slot_conflict() {
    let pool = setup().await;
    let app = service!(pool);
    let date = future_open_date();

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .set_json(booking_body(&date, "10:00"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .set_json(booking_body(&date, "10:00"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "slot_conflict");
}

#[actix_web::test]
async fn booking_before_opening_is_rejected() {
    let pool = setup().await;
    let app = service!(pool);
    let date = future_open_date();

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .set_json(booking_body(&date, "08:30"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "validation_error");
}

#[actix_web::test]
async fn guest_booking_creates_a_placeholder_customer() {
    let pool = setup().await;
    let app = service!(pool);
    let date = future_open_date();

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .set_json(json!({
            "salon_id": SALON,
            "service_id": SERVICE,
            "staff_id": STAFF,
            "date": date,
            "time": "11:00",
            "guest": { "name": "Walk In", "phone": "09125550000" },
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let role = sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE phone = '09125550000'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(role, "customer");
}

#[actix_web::test]
async fn detail_exposes_payment_and_notification_flags() {
    let pool = setup().await;
    let app = service!(pool);
    let date = future_open_date();

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .set_json(booking_body(&date, "12:00"))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri(&format!("/api/appointments/{id}"))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(detail["salon"], "Test Salon");
    assert_eq!(detail["service"], "Gel Polish");
    assert_eq!(detail["status"], "pending");
    assert_eq!(detail["is_paid"], false);
    assert_eq!(detail["sms_sent"], false);
    assert_eq!(detail["reminder_sent"], false);
    assert_eq!(detail["total_price"], 4000000);
}

#[actix_web::test]
async fn mutations_require_credentials() {
    let pool = setup().await;
    let app = service!(pool);
    let date = future_open_date();

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .set_json(booking_body(&date, "13:00"))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/appointments/{id}/status"))
        .set_json(json!({ "status": "confirmed" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn owner_confirms_and_customer_cannot() {
    let pool = setup().await;
    let app = service!(pool);
    let date = future_open_date();

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .set_json(booking_body(&date, "13:00"))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/appointments/{id}/status"))
        .insert_header(("Authorization", CUSTOMER_AUTH))
        .set_json(json!({ "status": "confirmed" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri(&format!("/api/appointments/{id}/status"))
        .insert_header(("Authorization", OWNER_AUTH))
        .set_json(json!({ "status": "confirmed" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "confirmed");
}

#[actix_web::test]
async fn customer_reschedules_through_the_api() {
    let pool = setup().await;
    let app = service!(pool);
    let date = future_open_date();

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .set_json(booking_body(&date, "14:00"))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/appointments/{id}/reschedule"))
        .insert_header(("Authorization", CUSTOMER_AUTH))
        .set_json(json!({ "date": date, "time": "15:00" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "pending");

    let req = test::TestRequest::get()
        .uri(&format!("/api/salons/{SALON}/available-times?staff_id={STAFF}&date={date}"))
        .to_request();
    let listing: Value = test::call_and_read_body_json(&app, req).await;
    let times = listing["times"].as_array().unwrap();
    assert!(times.iter().any(|time| time == "14:00"));
    assert!(!times.iter().any(|time| time == "15:00"));
}

#[actix_web::test]
async fn owner_records_payment_flags() {
    let pool = setup().await;
    let app = service!(pool);
    let date = future_open_date();

    let req = test::TestRequest::post()
        .uri("/api/appointments")
        .set_json(booking_body(&date, "16:00"))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let id = created["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/appointments/{id}/payment"))
        .insert_header(("Authorization", OWNER_AUTH))
        .set_json(json!({ "payment_method": "card" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["is_paid"], true);
    assert_eq!(body["payment_method"], "card");
}

#[actix_web::test]
async fn owner_manages_time_slots() {
    let pool = setup().await;
    let app = service!(pool);
    let date = future_open_date();

    let body = json!({
        "staff_id": STAFF,
        "date": date,
        "start_time": "09:00",
        "end_time": "12:00",
    });

    let req = test::TestRequest::post()
        .uri(&format!("/manage/salons/{SALON}/time-slots"))
        .insert_header(("Authorization", OWNER_AUTH))
        .set_json(&body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    // Same (staff, date, start) again violates the uniqueness invariant.
    let req = test::TestRequest::post()
        .uri(&format!("/manage/salons/{SALON}/time-slots"))
        .insert_header(("Authorization", OWNER_AUTH))
        .set_json(&body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get()
        .uri(&format!("/manage/salons/{SALON}/time-slots"))
        .insert_header(("Authorization", OWNER_AUTH))
        .to_request();
    let listing: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listing.as_array().unwrap().len(), 1);
}
