use axum::extract::{Host, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::files::AVATARS_DIR;
use crate::models::{Employee, NewEmployee};
use crate::routes::{request_base_url, to_iso, Page, PageQuery};
use crate::state::AppState;
use crate::store::EmployeeChanges;
use crate::upload::{read_image_field, store_image, MAX_AVATAR_BYTES};
use crate::utils::json::required_string;
use crate::{auth::password, routes::auth::MIN_PASSWORD_LEN};

const EMPLOYEE_NOT_FOUND: &str = "Employee not found";

/// Full employee projection. Constructed field by field so the password
/// hash can never leak into a response.
#[derive(Serialize)]
pub struct EmployeeResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub designation: String,
    pub status: String,
    pub avatar: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Employee> for EmployeeResponse {
    fn from(employee: Employee) -> Self {
        Self {
            id: employee.id,
            name: employee.name,
            email: employee.email,
            designation: employee.designation,
            status: employee.status,
            avatar: employee.avatar,
            created_at: to_iso(employee.created_at),
            updated_at: to_iso(employee.updated_at),
        }
    }
}

/// Reduced projection used by the listing endpoint.
#[derive(Serialize)]
pub struct EmployeeSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub designation: String,
    pub status: String,
}

impl From<Employee> for EmployeeSummary {
    fn from(employee: Employee) -> Self {
        Self {
            id: employee.id,
            name: employee.name,
            email: employee.email,
            designation: employee.designation,
            status: employee.status,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateEmployeeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub designation: Option<String>,
    pub password: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateEmployeeRequest>,
) -> AppResult<(StatusCode, Json<EmployeeResponse>)> {
    let name = require_field(payload.name, "Name is required")?;
    let email = require_field(payload.email, "Email is required")?;
    let designation = require_field(payload.designation, "Designation is required")?;
    let password = require_field(payload.password, "Password is required")?;

    let password_hash = hash_checked_password(&password)?;

    if state.store.employee_by_email(&email).await?.is_some() {
        return Err(AppError::conflict("Email already registered"));
    }

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

    Ok((StatusCode::CREATED, Json(employee.into())))
}

pub async fn index(
    State(state): State<AppState>,
    Query(params): Query<PageQuery>,
) -> AppResult<Json<Page<EmployeeSummary>>> {
    let (page, page_size, offset) = params.normalized();

    let (items, total) = tokio::join!(
        state.store.list_employees(offset, page_size),
        state.store.count_employees(),
    );

    Ok(Json(Page {
        page,
        page_size,
        total: total?,
        items: items?.into_iter().map(EmployeeSummary::from).collect(),
    }))
}

pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EmployeeResponse>> {
    let employee = state
        .store
        .employee_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(EMPLOYEE_NOT_FOUND))?;
    Ok(Json(employee.into()))
}

#[derive(Deserialize)]
pub struct UpdateEmployeeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub designation: Option<String>,
    pub status: Option<String>,
    pub password: Option<String>,
}

/// PUT: partial merge. Fields left out of the body keep their stored value.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEmployeeRequest>,
) -> AppResult<Json<EmployeeResponse>> {
    let changes = EmployeeChanges {
        name: payload.name,
        email: payload.email,
        designation: payload.designation,
        status: payload.status,
        password_hash: payload
            .password
            .map(|password| hash_checked_password(&password))
            .transpose()?,
    };
    apply_changes(&state, id, changes).await
}

/// PATCH: allow-list only, and an empty update set is an error.
pub async fn patch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> AppResult<Json<EmployeeResponse>> {
    let changes = EmployeeChanges {
        name: required_string(body.get("name")).map_err(AppError::bad_request)?,
        email: required_string(body.get("email")).map_err(AppError::bad_request)?,
        designation: required_string(body.get("designation")).map_err(AppError::bad_request)?,
        status: required_string(body.get("status")).map_err(AppError::bad_request)?,
        password_hash: required_string(body.get("password"))
            .map_err(AppError::bad_request)?
            .map(|password| hash_checked_password(&password))
            .transpose()?,
    };

    if changes.is_empty() {
        return Err(AppError::bad_request("No valid fields to update"));
    }

    apply_changes(&state, id, changes).await
}

async fn apply_changes(
    state: &AppState,
    id: Uuid,
    changes: EmployeeChanges,
) -> AppResult<Json<EmployeeResponse>> {
    if let Some(email) = &changes.email {
        if let Some(other) = state.store.employee_by_email(email).await? {
            if other.id != id {
                return Err(AppError::conflict("Email already registered"));
            }
        }
    }

    let employee = state
        .store
        .update_employee(id, changes)
        .await?
        .ok_or_else(|| AppError::not_found(EMPLOYEE_NOT_FOUND))?;
    Ok(Json(employee.into()))
}

pub async fn destroy(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    if !state.store.delete_employee(id).await? {
        return Err(AppError::not_found(EMPLOYEE_NOT_FOUND));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarUploadResponse {
    pub message: String,
    pub file_name: String,
    pub file_path: String,
}

pub async fn upload_avatar(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Host(host): Host,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> AppResult<Json<AvatarUploadResponse>> {
    let employee = state
        .store
        .employee_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(EMPLOYEE_NOT_FOUND))?;

    let mut accepted = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart data: {err}")))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("avatar") => {
                accepted = Some(read_image_field(field, MAX_AVATAR_BYTES).await?);
            }
            _ => continue,
        }
    }

    let pending = accepted.ok_or_else(|| {
        AppError::bad_request("No file uploaded or invalid file type/size")
    })?;

    let stored = store_image(&state.files, AVATARS_DIR, pending).await?;
    state.store.set_employee_avatar(id, &stored.filename).await?;

    info!(employee_id = %employee.id, file = %stored.filename, "avatar uploaded");

    // Only the filename is persisted; the public URL is rebuilt from the
    // request host every time.
    let file_path = format!(
        "{}/{}/{}",
        request_base_url(&headers, &host),
        AVATARS_DIR,
        stored.filename
    );

    Ok(Json(AvatarUploadResponse {
        message: "Avatar uploaded".to_string(),
        file_name: stored.filename,
        file_path,
    }))
}

fn require_field(value: Option<String>, message: &'static str) -> AppResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::bad_request(message))
}

fn hash_checked_password(password: &str) -> AppResult<String> {
    let password = password.trim();
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "Password must be at least 6 characters",
        ));
    }
    Ok(password::hash_password(password)?)
}
