use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    error::Result,
    models::{AppointmentRow, SalonRow, ServiceRow, StaffRow, ROLE_SALON_OWNER, ROLE_STAFF},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn log_activity(
    pool: &SqlitePool,
    kind: &str,
    message: &str,
    user_id: Option<&str>,
    appointment_id: Option<&str>,
) {
    let result = sqlx::query(
        r#"INSERT INTO activities (id, kind, message, created_at, user_id, appointment_id)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(new_id())
    .bind(kind)
    .bind(message)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .bind(appointment_id)
    .execute(pool)
    .await;

    if let Err(err) = result {
        log::warn!("failed to record activity '{kind}': {err}");
    }
}

pub async fn fetch_salon(pool: &SqlitePool, salon_id: &str) -> Result<Option<SalonRow>> {
    let row = sqlx::query_as::<_, SalonRow>(
        r#"SELECT id, name, owner_id, phone, address, opening_time, closing_time,
                  closed_days, is_active, created_at
           FROM salons
           WHERE id = ?
           LIMIT 1"#,
    )
    .bind(salon_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn fetch_staff(pool: &SqlitePool, staff_id: &str) -> Result<Option<StaffRow>> {
    let row = sqlx::query_as::<_, StaffRow>(
        r#"SELECT s.id, s.user_id, s.salon_id, s.specialties, s.is_available,
                  u.display_name
           FROM staff s
           JOIN users u ON s.user_id = u.id
           WHERE s.id = ?
           LIMIT 1"#,
    )
    .bind(staff_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn fetch_service(pool: &SqlitePool, service_id: &str) -> Result<Option<ServiceRow>> {
    let row = sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, salon_id, name, description, price, duration_minutes, is_active, created_at
           FROM services
           WHERE id = ?
           LIMIT 1"#,
    )
    .bind(service_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn fetch_appointment(pool: &SqlitePool, appointment_id: &str) -> Result<Option<AppointmentRow>> {
    let row = sqlx::query_as::<_, AppointmentRow>(
        r#"SELECT id, salon_id, customer_id, staff_id, service_id, appointment_date,
                  appointment_time, status, notes, total_price, is_paid, payment_method,
                  sms_sent, reminder_sent, created_at, updated_at
           FROM appointments
           WHERE id = ?
           LIMIT 1"#,
    )
    .bind(appointment_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Demo fixtures for local runs, gated behind SEED_DEMO=true.
pub async fn seed_demo(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let seed = env::var("SEED_DEMO").unwrap_or_else(|_| "false".to_string());
    if seed != "true" {
        return Ok(());
    }

    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM salons LIMIT 1")
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let owner_user = env::var("OWNER_USER").unwrap_or_else(|_| "owner".to_string());
    let owner_password = env::var("OWNER_PASSWORD").unwrap_or_else(|_| "change-me".to_string());
    if owner_password == "change-me" {
        log::warn!("OWNER_PASSWORD not set. Using default password 'change-me'. Set OWNER_PASSWORD in production.");
    }

    let now = Utc::now().to_rfc3339();
    let owner_id = new_id();
    let owner_hash = hash_password(&owner_password)
        .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    sqlx::query(
        r#"INSERT INTO users (id, username, display_name, role, phone, password_hash, created_at)
           VALUES (?, ?, ?, ?, NULL, ?, ?)"#,
    )
    .bind(&owner_id)
    .bind(&owner_user)
    .bind("Studio Owner")
    .bind(ROLE_SALON_OWNER)
    .bind(owner_hash)
    .bind(&now)
    .execute(pool)
    .await?;

    let salon_id = new_id();
    sqlx::query(
        r#"INSERT INTO salons (id, name, owner_id, phone, address, opening_time, closing_time,
                               closed_days, is_active, created_at)
           VALUES (?, ?, ?, ?, ?, '09:00', '21:00', 'friday', 1, ?)"#,
    )
    .bind(&salon_id)
    .bind("Nailbook Studio")
    .bind(&owner_id)
    .bind("021-555-0100")
    .bind("12 Valiasr Ave")
    .bind(&now)
    .execute(pool)
    .await?;

    let staff_password = env::var("STAFF_PASSWORD").unwrap_or_else(|_| "change-me".to_string());
    let staff_user_id = new_id();
    let staff_hash = hash_password(&staff_password)
        .map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;
    sqlx::query(
        r#"INSERT INTO users (id, username, display_name, role, phone, password_hash, created_at)
           VALUES (?, 'staff1', 'Sara Ahmadi', ?, NULL, ?, ?)"#,
    )
    .bind(&staff_user_id)
    .bind(ROLE_STAFF)
    .bind(staff_hash)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query(
        r#"INSERT INTO staff (id, user_id, salon_id, specialties, is_available)
           VALUES (?, ?, ?, 'gel polish, extensions', 1)"#,
    )
    .bind(new_id())
    .bind(&staff_user_id)
    .bind(&salon_id)
    .execute(pool)
    .await?;

    let services = [
        ("Classic Manicure", 2_500_000_i64, 45_i64),
        ("Gel Polish", 4_000_000, 60),
        ("Nail Extensions", 7_500_000, 90),
    ];
    for (name, price, duration) in services {
        sqlx::query(
            r#"INSERT INTO services (id, salon_id, name, description, price, duration_minutes,
                                     is_active, created_at)
               VALUES (?, ?, ?, '', ?, ?, 1, ?)"#,
        )
        .bind(new_id())
        .bind(&salon_id)
        .bind(name)
        .bind(price)
        .bind(duration)
        .bind(&now)
        .execute(pool)
        .await?;
    }

    log::info!("Seeded demo salon '{salon_id}'");
    Ok(())
}
