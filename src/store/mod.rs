pub mod pg;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Employee, NewEmployee, NewRefreshToken, NewTodo, Print, RefreshToken, Todo};

pub use pg::PgStore;

/// Field set for an employee update. `None` leaves the stored value
/// untouched.
#[derive(Debug, Default)]
pub struct EmployeeChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub designation: Option<String>,
    pub status: Option<String>,
    pub password_hash: Option<String>,
}

impl EmployeeChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.designation.is_none()
            && self.status.is_none()
            && self.password_hash.is_none()
    }
}

/// Field set for a todo update. The nested option on `description`
/// distinguishes "leave unchanged" from "clear".
#[derive(Debug, Default)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
}

impl TodoChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }
}

/// Persistence boundary. Handlers only see this trait; the production
/// implementation is Postgres-backed, tests substitute an in-memory one.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn insert_employee(&self, employee: NewEmployee) -> Result<Employee>;
    async fn employee_by_id(&self, id: Uuid) -> Result<Option<Employee>>;
    async fn employee_by_email(&self, email: &str) -> Result<Option<Employee>>;
    /// Page of employees ordered by creation time descending.
    async fn list_employees(&self, offset: i64, limit: i64) -> Result<Vec<Employee>>;
    async fn count_employees(&self) -> Result<i64>;
    /// Returns `None` when no employee with that id exists.
    async fn update_employee(&self, id: Uuid, changes: EmployeeChanges)
        -> Result<Option<Employee>>;
    async fn set_employee_avatar(&self, id: Uuid, filename: &str) -> Result<()>;
    /// Returns whether a row was deleted.
    async fn delete_employee(&self, id: Uuid) -> Result<bool>;

    async fn insert_todo(&self, todo: NewTodo) -> Result<Todo>;
    async fn todo_by_id(&self, id: Uuid) -> Result<Option<Todo>>;
    async fn list_todos(&self, offset: i64, limit: i64) -> Result<Vec<Todo>>;
    async fn count_todos(&self) -> Result<i64>;
    async fn update_todo(&self, id: Uuid, changes: TodoChanges) -> Result<Option<Todo>>;
    async fn delete_todo(&self, id: Uuid) -> Result<bool>;

    async fn insert_refresh_token(&self, token: NewRefreshToken) -> Result<()>;
    async fn refresh_token(&self, token: &str) -> Result<Option<RefreshToken>>;
    /// Deletes every row holding this token value; returns the count.
    async fn delete_refresh_tokens(&self, token: &str) -> Result<usize>;

    async fn print_by_code(&self, code: &str) -> Result<Option<Print>>;
}
