use axum::{
    extract::{ConnectInfo, Json, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResponse, FieldError};
use crate::extract::ApiJson;
use crate::models::{Role, User, UserResponse};
use crate::state::AppState;
use crate::token::Claims;

// Window sizes for the credential endpoints. Registration is tighter
// than login since legitimate clients register once.
const LOGIN_LIMIT: (u32, Duration) = (10, Duration::from_secs(15 * 60));
const REGISTER_LIMIT: (u32, Duration) = (5, Duration::from_secs(60 * 60));

#[derive(Deserialize)]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthData {
    pub user: UserResponse,
    pub token: String,
}

/// Per-client counter applied to `/auth/*` before any handler runs.
pub async fn limit_credential_requests(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // This middleware sits inside the nested /auth router, so the
    // prefix is already stripped from the path it sees.
    let (action, (max_requests, window)) = if req.uri().path().ends_with("/register") {
        ("register", REGISTER_LIMIT)
    } else {
        ("login", LOGIN_LIMIT)
    };

    let key = format!("{}:{}", action, addr.ip());
    let decision = state.limiter.check(&key, max_requests, window);

    if !decision.allowed {
        let retry_after_secs = decision
            .reset_at
            .saturating_duration_since(Instant::now())
            .as_secs()
            .max(1);
        warn!(key = %key, "credential endpoint rate limited");
        return Err(ApiError::RateLimited { retry_after_secs });
    }

    Ok(next.run(req).await)
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegistrationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.trim().to_string();
    let email = normalize_email(&payload.email);
    validate_registration(&name, &email, &payload.password)?;

    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Email already registered"));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("password hashing failed: {}", e);
            ApiError::Internal
        })?
        .to_string();

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        password_hash,
        role: Role::User,
        created_at: now,
        updated_at: now,
    };

    let inserted = sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&state.db)
    .await;

    if let Err(err) = inserted {
        // Lost a race with a concurrent registration for the same email.
        if err
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation())
        {
            return Err(ApiError::Conflict("Email already registered"));
        }
        return Err(err.into());
    }

    let token = state.tokens.issue(&user).map_err(|_| ApiError::Internal)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(AuthData {
            user: UserResponse::from_user(&user),
            token,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&payload.email);

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(&state.db)
        .await?;

    // Unknown email and wrong password must be indistinguishable.
    let user = match user {
        Some(u) => u,
        None => {
            warn!(email = %email, "login attempt for unknown email");
            return Err(ApiError::InvalidCredentials);
        }
    };

    let parsed_hash = PasswordHash::new(&user.password_hash).map_err(|e| {
        error!("stored password hash unparseable: {}", e);
        ApiError::Internal
    })?;

    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        warn!(email = %email, "login attempt with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.tokens.issue(&user).map_err(|_| ApiError::Internal)?;

    Ok(Json(ApiResponse::new(AuthData {
        user: UserResponse::from_user(&user),
        token,
    })))
}

#[derive(Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Identity straight from the verified claims, no store lookup.
pub async fn me(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    Json(ApiResponse::new(CurrentUser {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
    }))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    let name_len = name.chars().count();
    if name_len < 2 || name_len > 50 {
        errors.push(FieldError::new(
            "name",
            "Name must be between 2 and 50 characters",
        ));
    }

    if !is_valid_email(email) {
        errors.push(FieldError::new("email", "Email address is invalid"));
    }

    if password.len() < 8 {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 8 characters",
        ));
    } else if !password.chars().any(|c| c.is_ascii_alphabetic())
        || !password.chars().any(|c| c.is_ascii_digit())
    {
        errors.push(FieldError::new(
            "password",
            "Password must contain at least one letter and one digit",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization_trims_and_lowercases() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
    }

    #[test]
    fn email_shape_checked() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("missing-at.com"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("a@nodot"));
        assert!(!is_valid_email("a b@x.com"));
    }

    #[test]
    fn registration_validation_collects_all_fields() {
        let err = validate_registration("x", "bad", "short").unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["name", "email", "password"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn password_needs_letter_and_digit() {
        assert!(validate_registration("Alice", "a@x.com", "12345678").is_err());
        assert!(validate_registration("Alice", "a@x.com", "abcdefgh").is_err());
        assert!(validate_registration("Alice", "a@x.com", "Abcdef12").is_ok());
    }
}
