// Not every test binary exercises every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, NaiveDateTime};
use http_body_util::BodyExt;
use serde::Serialize;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

use atelier_backend::auth::password::hash_password;
use atelier_backend::auth::tokens::TokenService;
use atelier_backend::config::AppConfig;
use atelier_backend::files::{FileStore, LocalFiles};
use atelier_backend::imagegen::{assemble_prompt, GenerationRequest, ImageGenerator};
use atelier_backend::models::{
    Employee, NewEmployee, NewRefreshToken, NewTodo, Print, RefreshToken, Todo,
};
use atelier_backend::routes;
use atelier_backend::state::AppState;
use atelier_backend::store::{EmployeeChanges, Store, TodoChanges};

#[derive(Default)]
struct MemoryState {
    employees: Vec<Employee>,
    todos: Vec<Todo>,
    refresh_tokens: Vec<RefreshToken>,
    prints: HashMap<String, Print>,
    sequence: i64,
}

/// In-memory stand-in for the Postgres store, mirroring its contracts:
/// creation-time-descending listings, keep-on-`None` updates, idempotent
/// token deletion.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

fn sequence_timestamp(sequence: i64) -> NaiveDateTime {
    DateTime::from_timestamp(sequence, 0)
        .expect("valid timestamp")
        .naive_utc()
}

impl MemoryStore {
    pub async fn add_print(&self, code: &str, image: &str) {
        let mut state = self.state.lock().await;
        state.sequence += 1;
        let created_at = sequence_timestamp(state.sequence);
        state.prints.insert(
            code.to_string(),
            Print {
                code: code.to_string(),
                image: image.to_string(),
                created_at,
            },
        );
    }

    pub async fn refresh_token_count(&self) -> usize {
        self.state.lock().await.refresh_tokens.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_employee(&self, employee: NewEmployee) -> Result<Employee> {
        let mut state = self.state.lock().await;
        ensure!(
            !state.employees.iter().any(|e| e.email == employee.email),
            "duplicate email"
        );
        state.sequence += 1;
        let now = sequence_timestamp(state.sequence);
        let row = Employee {
            id: employee.id,
            name: employee.name,
            email: employee.email,
            password_hash: employee.password_hash,
            designation: employee.designation,
            status: employee.status,
            avatar: None,
            created_at: now,
            updated_at: now,
        };
        state.employees.push(row.clone());
        Ok(row)
    }

    async fn employee_by_id(&self, id: Uuid) -> Result<Option<Employee>> {
        let state = self.state.lock().await;
        Ok(state.employees.iter().find(|e| e.id == id).cloned())
    }

    async fn employee_by_email(&self, email: &str) -> Result<Option<Employee>> {
        let state = self.state.lock().await;
        Ok(state.employees.iter().find(|e| e.email == email).cloned())
    }

    async fn list_employees(&self, offset: i64, limit: i64) -> Result<Vec<Employee>> {
        let state = self.state.lock().await;
        let mut rows = state.employees.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_employees(&self) -> Result<i64> {
        Ok(self.state.lock().await.employees.len() as i64)
    }

    async fn update_employee(
        &self,
        id: Uuid,
        changes: EmployeeChanges,
    ) -> Result<Option<Employee>> {
        let mut state = self.state.lock().await;
        state.sequence += 1;
        let updated_at = sequence_timestamp(state.sequence);
        let Some(row) = state.employees.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(email) = changes.email {
            row.email = email;
        }
        if let Some(designation) = changes.designation {
            row.designation = designation;
        }
        if let Some(status) = changes.status {
            row.status = status;
        }
        if let Some(password_hash) = changes.password_hash {
            row.password_hash = password_hash;
        }
        row.updated_at = updated_at;
        Ok(Some(row.clone()))
    }

    async fn set_employee_avatar(&self, id: Uuid, filename: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(row) = state.employees.iter_mut().find(|e| e.id == id) {
            row.avatar = Some(filename.to_string());
        }
        Ok(())
    }

    async fn delete_employee(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.employees.len();
        state.employees.retain(|e| e.id != id);
        Ok(state.employees.len() < before)
    }

    async fn insert_todo(&self, todo: NewTodo) -> Result<Todo> {
        let mut state = self.state.lock().await;
        state.sequence += 1;
        let now = sequence_timestamp(state.sequence);
        let row = Todo {
            id: todo.id,
            title: todo.title,
            description: todo.description,
            completed: todo.completed,
            created_at: now,
            updated_at: now,
        };
        state.todos.push(row.clone());
        Ok(row)
    }

    async fn todo_by_id(&self, id: Uuid) -> Result<Option<Todo>> {
        let state = self.state.lock().await;
        Ok(state.todos.iter().find(|t| t.id == id).cloned())
    }

    async fn list_todos(&self, offset: i64, limit: i64) -> Result<Vec<Todo>> {
        let state = self.state.lock().await;
        let mut rows = state.todos.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_todos(&self) -> Result<i64> {
        Ok(self.state.lock().await.todos.len() as i64)
    }

    async fn update_todo(&self, id: Uuid, changes: TodoChanges) -> Result<Option<Todo>> {
        let mut state = self.state.lock().await;
        state.sequence += 1;
        let updated_at = sequence_timestamp(state.sequence);
        let Some(row) = state.todos.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            row.title = title;
        }
        if let Some(description) = changes.description {
            row.description = description;
        }
        if let Some(completed) = changes.completed {
            row.completed = completed;
        }
        row.updated_at = updated_at;
        Ok(Some(row.clone()))
    }

    async fn delete_todo(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock().await;
        let before = state.todos.len();
        state.todos.retain(|t| t.id != id);
        Ok(state.todos.len() < before)
    }

    async fn insert_refresh_token(&self, token: NewRefreshToken) -> Result<()> {
        let mut state = self.state.lock().await;
        state.sequence += 1;
        let created_at = sequence_timestamp(state.sequence);
        let row = RefreshToken {
            token: token.token,
            employee_id: token.employee_id,
            expires_at: token.expires_at,
            created_at,
        };
        state.refresh_tokens.push(row);
        Ok(())
    }

    async fn refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let state = self.state.lock().await;
        Ok(state
            .refresh_tokens
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn delete_refresh_tokens(&self, token: &str) -> Result<usize> {
        let mut state = self.state.lock().await;
        let before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|t| t.token != token);
        Ok(before - state.refresh_tokens.len())
    }

    async fn print_by_code(&self, code: &str) -> Result<Option<Print>> {
        let state = self.state.lock().await;
        Ok(state.prints.get(code).cloned())
    }
}

#[derive(Clone)]
pub struct RecordedGeneration {
    pub prompt: String,
    pub image_count: usize,
}

/// Fake remote provider: records what it was asked for and returns canned
/// bytes, or fails when constructed with `failing()`.
pub struct FakeImages {
    result: std::result::Result<Vec<u8>, String>,
    last: Mutex<Option<RecordedGeneration>>,
}

impl Default for FakeImages {
    fn default() -> Self {
        Self {
            result: Ok(b"generated-image-bytes".to_vec()),
            last: Mutex::new(None),
        }
    }
}

impl FakeImages {
    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            last: Mutex::new(None),
        }
    }

    pub async fn last_generation(&self) -> Option<RecordedGeneration> {
        self.last.lock().await.clone()
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>> {
        let image_count = 1
            + usize::from(request.print_image.is_some())
            + usize::from(request.logo_image.is_some());
        *self.last.lock().await = Some(RecordedGeneration {
            prompt: assemble_prompt(request),
            image_count,
        });
        self.result.clone().map_err(|message| anyhow!(message))
    }
}

pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryStore>,
    pub images: Arc<FakeImages>,
    pub storage_root: PathBuf,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_images(FakeImages::default()).await
    }

    pub async fn with_images(images: FakeImages) -> Result<Self> {
        let tmp = tempfile::tempdir()?;
        let storage_root = tmp.path().to_path_buf();

        let config = AppConfig {
            database_url: "postgres://localhost/atelier-test".to_string(),
            database_max_pool_size: 1,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            app_url: "http://api.test".to_string(),
            environment: "test".to_string(),
            access_token_secret: "test-access-secret".to_string(),
            refresh_token_secret: "test-refresh-secret".to_string(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_image_model: "gpt-4.1".to_string(),
            storage_root: storage_root.to_string_lossy().into_owned(),
            cors_allowed_origin: None,
        };

        let files = LocalFiles::new(&storage_root);
        files.ensure_layout().await?;

        let store = Arc::new(MemoryStore::default());
        let images = Arc::new(images);
        let tokens = TokenService::from_config(&config);

        let state = AppState::new(
            config,
            store.clone(),
            Arc::new(files),
            images.clone(),
            tokens,
        );
        let router = routes::create_router(state);

        Ok(Self {
            router,
            store,
            images,
            storage_root,
            _tmp: tmp,
        })
    }

    /// Insert an employee directly with an already-hashed password.
    pub async fn seed_employee(&self, name: &str, email: &str, password: &str) -> Result<Uuid> {
        let employee = self
            .store
            .insert_employee(NewEmployee {
                id: Uuid::new_v4(),
                name: name.to_string(),
                email: email.to_string(),
                password_hash: hash_password(password)?,
                designation: "Engineer".to_string(),
                status: "active".to_string(),
            })
            .await?;
        Ok(employee.id)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(String, String)> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            email: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json("/login", &LoginPayload { email, password }, None)
            .await?;
        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_vec(response.into_body()).await?;
        #[derive(serde::Deserialize)]
        struct LoginResponse {
            access_token: String,
            refresh_token: String,
        }
        let parsed: LoginResponse = serde_json::from_slice(&body)?;
        Ok((parsed.access_token, parsed.refresh_token))
    }

    /// Write a print design file and register its lookup code.
    pub async fn seed_print(&self, code: &str, image: &str, bytes: &[u8]) -> Result<()> {
        let files = LocalFiles::new(&self.storage_root);
        files
            .save(&format!("contents/prints/{image}"), bytes)
            .await?;
        self.store.add_print(code, image).await;
        Ok(())
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token).await
    }

    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "api.test")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header("host", "api.test");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder()
            .method(Method::DELETE)
            .uri(path)
            .header("host", "api.test");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    /// Multipart POST with any mix of file parts and plain text fields.
    pub async fn post_multipart(
        &self,
        path: &str,
        files: &[MultipartFile<'_>],
        fields: &[(&str, &str)],
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();

        for file in files {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    file.field, file.filename
                )
                .as_bytes(),
            );
            body.extend(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
            body.extend(file.bytes);
            body.extend(b"\r\n");
        }

        for (name, value) in fields {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend(value.as_bytes());
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("host", "api.test")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            );
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }

        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    /// Filenames currently stored under a storage subdirectory.
    pub fn stored_files(&self, dir: &str) -> Vec<String> {
        let path = self.storage_root.join(dir);
        let Ok(entries) = std::fs::read_dir(path) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect()
    }
}

pub struct MultipartFile<'a> {
    pub field: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn body_to_json(body: Body) -> Result<serde_json::Value> {
    let bytes = body_to_vec(body).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
