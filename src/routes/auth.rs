use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::password,
    error::{AppError, AppResult},
    models::{NewEmployee, NewRefreshToken},
    state::AppState,
};

pub const MIN_PASSWORD_LEN: usize = 6;

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub designation: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub designation: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let (name, email, password, designation) = match (
        non_empty(payload.name),
        non_empty(payload.email),
        non_empty(payload.password),
        non_empty(payload.designation),
    ) {
        (Some(name), Some(email), Some(password), Some(designation)) => {
            (name, email, password, designation)
        }
        _ => return Err(AppError::bad_request("All fields required")),
    };

    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "Password must be at least 6 characters",
        ));
    }

    if state.store.employee_by_email(&email).await?.is_some() {
        return Err(AppError::conflict("Email already registered"));
    }

    let password_hash = password::hash_password(&password)?;
    let employee = state
        .store
        .insert_employee(NewEmployee {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            designation,
            status: "active".to_string(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: employee.id,
            name: employee.name,
            email: employee.email,
            designation: employee.designation,
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (email, password) = match (non_empty(payload.email), non_empty(payload.password)) {
        (Some(email), Some(password)) => (email, password),
        _ => return Err(AppError::bad_request("Email and password required")),
    };

    // Unknown email and wrong password take the same exit so the response
    // never reveals which one it was.
    let employee = state
        .store
        .employee_by_email(&email)
        .await?
        .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

    let valid = password::verify_password(&password, &employee.password_hash)
        .map_err(|_| AppError::unauthorized(INVALID_CREDENTIALS))?;
    if !valid {
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    let access_token = state
        .tokens
        .issue_access_token(employee.id, &employee.email)?;
    let refresh_token = state.tokens.issue_refresh_token(employee.id)?;

    let expires_at = (Utc::now() + state.tokens.refresh_expiry()).naive_utc();
    state
        .store
        .insert_refresh_token(NewRefreshToken {
            token: refresh_token.clone(),
            employee_id: employee.id,
            expires_at,
        })
        .await?;

    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
    }))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<RefreshResponse>> {
    let refresh_token = non_empty(payload.refresh_token)
        .ok_or_else(|| AppError::bad_request("Refresh token required"))?;

    // A token must be both still stored (not revoked) and cryptographically
    // valid before a new access token is issued.
    state
        .store
        .refresh_token(&refresh_token)
        .await?
        .ok_or_else(|| AppError::unauthorized(INVALID_REFRESH_TOKEN))?;

    let claims = state
        .tokens
        .verify_refresh(&refresh_token)
        .map_err(|_| AppError::unauthorized(INVALID_REFRESH_TOKEN))?;

    let employee = state
        .store
        .employee_by_id(claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    let access_token = state
        .tokens
        .issue_access_token(employee.id, &employee.email)?;

    Ok(Json(RefreshResponse { access_token }))
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> AppResult<Json<LogoutResponse>> {
    let refresh_token = non_empty(payload.refresh_token)
        .ok_or_else(|| AppError::bad_request("Refresh token required"))?;

    // Idempotent: deleting an already-revoked token is a no-op.
    state.store.delete_refresh_tokens(&refresh_token).await?;

    Ok(Json(LogoutResponse {
        message: "Logged out".to_string(),
    }))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
