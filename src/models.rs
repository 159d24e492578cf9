use crate::error::Error;

pub const ROLE_SALON_OWNER: &str = "salon_owner";
pub const ROLE_STAFF: &str = "staff";
pub const ROLE_CUSTOMER: &str = "customer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

/// Statuses that keep a slot blocked, as stored. Must stay in sync with the
/// partial unique index in the migrations.
pub const OCCUPYING_STATUSES: [&str; 3] = ["pending", "confirmed", "in_progress"];

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    pub fn parse(value: &str) -> Result<Self, Error> {
        match value {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "in_progress" => Ok(AppointmentStatus::InProgress),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" => Ok(AppointmentStatus::NoShow),
            other => Err(Error::validation(format!("invalid status: '{other}'"))),
        }
    }

    pub fn is_occupying(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed | AppointmentStatus::InProgress
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Cash,
    Card,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Online => "online",
        }
    }

    pub fn parse(value: &str) -> Result<Self, Error> {
        match value {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "online" => Ok(PaymentMethod::Online),
            other => Err(Error::validation(format!("invalid payment method: '{other}'"))),
        }
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub created_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SalonRow {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub phone: String,
    pub address: String,
    pub opening_time: String,
    pub closing_time: String,
    pub closed_days: String,
    pub is_active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StaffRow {
    pub id: String,
    pub user_id: String,
    pub salon_id: String,
    pub specialties: String,
    pub is_available: i64,
    pub display_name: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ServiceRow {
    pub id: String,
    pub salon_id: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub duration_minutes: i64,
    pub is_active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: String,
    pub salon_id: String,
    pub customer_id: Option<String>,
    pub staff_id: String,
    pub service_id: String,
    pub appointment_date: String,
    pub appointment_time: String,
    pub status: String,
    pub notes: String,
    pub total_price: i64,
    pub is_paid: i64,
    pub payment_method: Option<String>,
    pub sms_sent: i64,
    pub reminder_sent: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl AppointmentRow {
    pub fn status(&self) -> Result<AppointmentStatus, Error> {
        AppointmentStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TimeSlotRow {
    pub id: String,
    pub salon_id: String,
    pub staff_id: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub is_available: i64,
}

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub message: String,
    pub created_at: String,
}
