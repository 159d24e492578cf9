use actix_web::{dev::ServiceRequest, error::ErrorUnauthorized, web, Error, HttpMessage};
use actix_web_httpauth::extractors::basic::BasicAuth;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use uuid::Uuid;

use crate::{
    models::{SalonRow, UserRow, ROLE_SALON_OWNER},
    state::AppState,
};

/// Request-scoped identity. Role and staff membership are resolved once per
/// request; every authorization decision downstream reads these tags only.
#[derive(Clone, Debug)]
pub struct Actor {
    pub user_id: String,
    pub display_name: String,
    pub role: String,
    pub staff_salon_id: Option<String>,
}

impl Actor {
    /// True when the actor runs the salon: its owner or one of its staff.
    pub fn manages(&self, salon: &SalonRow) -> bool {
        (self.role == ROLE_SALON_OWNER && self.user_id == salon.owner_id)
            || self.staff_salon_id.as_deref() == Some(salon.id.as_str())
    }
}

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    let parsed_hash = PasswordHash::new(password_hash);
    match parsed_hash {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(_) => false,
    }
}

pub async fn resolve_actor(state: &AppState, username: &str, password: &str) -> Option<Actor> {
    let user = sqlx::query_as::<_, UserRow>(
        r#"SELECT id, username, display_name, role, phone, password_hash, created_at
           FROM users
           WHERE username = ?
           LIMIT 1"#,
    )
    .bind(username)
    .fetch_optional(&state.db)
    .await
    .ok()??;

    // Guest-created customers have no password hash and cannot log in.
    let stored_hash = user.password_hash.as_deref()?;
    if !verify_password(password, stored_hash) {
        return None;
    }

    let staff_salon_id = sqlx::query_scalar::<_, String>(
        "SELECT salon_id FROM staff WHERE user_id = ? LIMIT 1",
    )
    .bind(&user.id)
    .fetch_optional(&state.db)
    .await
    .ok()
    .flatten();

    Some(Actor {
        user_id: user.id,
        display_name: user.display_name,
        role: user.role,
        staff_salon_id,
    })
}

pub async fn actor_validator(
    req: ServiceRequest,
    credentials: BasicAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let Some(state) = req.app_data::<web::Data<AppState>>() else {
        return Err((ErrorUnauthorized("Unauthorized"), req));
    };
    let username = credentials.user_id().to_string();
    let password = credentials.password().unwrap_or_default().to_string();

    match resolve_actor(state, &username, &password).await {
        Some(actor) => {
            req.extensions_mut().insert(actor);
            Ok(req)
        }
        None => Err((ErrorUnauthorized("Unauthorized"), req)),
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
