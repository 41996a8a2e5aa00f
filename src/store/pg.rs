use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::PgConnection;
use uuid::Uuid;

use crate::db::PgPool;
use crate::models::{Employee, NewEmployee, NewRefreshToken, NewTodo, Print, RefreshToken, Todo};
use crate::schema::{employees, prints, refresh_tokens, todos};

use super::{EmployeeChanges, Store, TodoChanges};

/// Postgres-backed store. Diesel is synchronous, so every call hops onto
/// the blocking pool with a pooled connection.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("database task panicked")?
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = employees)]
struct EmployeeChangeset {
    name: Option<String>,
    email: Option<String>,
    designation: Option<String>,
    status: Option<String>,
    password_hash: Option<String>,
    updated_at: chrono::NaiveDateTime,
}

#[derive(AsChangeset)]
#[diesel(table_name = todos)]
struct TodoChangeset {
    title: Option<String>,
    description: Option<Option<String>>,
    completed: Option<bool>,
    updated_at: chrono::NaiveDateTime,
}

#[async_trait]
impl Store for PgStore {
    async fn insert_employee(&self, employee: NewEmployee) -> Result<Employee> {
        self.with_conn(move |conn| {
            diesel::insert_into(employees::table)
                .values(&employee)
                .get_result(conn)
                .context("failed to insert employee")
        })
        .await
    }

    async fn employee_by_id(&self, id: Uuid) -> Result<Option<Employee>> {
        self.with_conn(move |conn| {
            employees::table
                .find(id)
                .first(conn)
                .optional()
                .context("failed to load employee")
        })
        .await
    }

    async fn employee_by_email(&self, email: &str) -> Result<Option<Employee>> {
        let email = email.to_string();
        self.with_conn(move |conn| {
            employees::table
                .filter(employees::email.eq(&email))
                .first(conn)
                .optional()
                .context("failed to load employee by email")
        })
        .await
    }

    async fn list_employees(&self, offset: i64, limit: i64) -> Result<Vec<Employee>> {
        self.with_conn(move |conn| {
            employees::table
                .order(employees::created_at.desc())
                .offset(offset)
                .limit(limit)
                .load(conn)
                .context("failed to list employees")
        })
        .await
    }

    async fn count_employees(&self) -> Result<i64> {
        self.with_conn(move |conn| {
            employees::table
                .count()
                .get_result(conn)
                .context("failed to count employees")
        })
        .await
    }

    async fn update_employee(
        &self,
        id: Uuid,
        changes: EmployeeChanges,
    ) -> Result<Option<Employee>> {
        self.with_conn(move |conn| {
            let changeset = EmployeeChangeset {
                name: changes.name,
                email: changes.email,
                designation: changes.designation,
                status: changes.status,
                password_hash: changes.password_hash,
                updated_at: Utc::now().naive_utc(),
            };
            diesel::update(employees::table.find(id))
                .set(&changeset)
                .get_result(conn)
                .optional()
                .context("failed to update employee")
        })
        .await
    }

    async fn set_employee_avatar(&self, id: Uuid, filename: &str) -> Result<()> {
        let filename = filename.to_string();
        self.with_conn(move |conn| {
            diesel::update(employees::table.find(id))
                .set((
                    employees::avatar.eq(Some(filename)),
                    employees::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)
                .context("failed to store avatar filename")?;
            Ok(())
        })
        .await
    }

    async fn delete_employee(&self, id: Uuid) -> Result<bool> {
        self.with_conn(move |conn| {
            let deleted = diesel::delete(employees::table.find(id))
                .execute(conn)
                .context("failed to delete employee")?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn insert_todo(&self, todo: NewTodo) -> Result<Todo> {
        self.with_conn(move |conn| {
            diesel::insert_into(todos::table)
                .values(&todo)
                .get_result(conn)
                .context("failed to insert todo")
        })
        .await
    }

    async fn todo_by_id(&self, id: Uuid) -> Result<Option<Todo>> {
        self.with_conn(move |conn| {
            todos::table
                .find(id)
                .first(conn)
                .optional()
                .context("failed to load todo")
        })
        .await
    }

    async fn list_todos(&self, offset: i64, limit: i64) -> Result<Vec<Todo>> {
        self.with_conn(move |conn| {
            todos::table
                .order(todos::created_at.desc())
                .offset(offset)
                .limit(limit)
                .load(conn)
                .context("failed to list todos")
        })
        .await
    }

    async fn count_todos(&self) -> Result<i64> {
        self.with_conn(move |conn| {
            todos::table
                .count()
                .get_result(conn)
                .context("failed to count todos")
        })
        .await
    }

    async fn update_todo(&self, id: Uuid, changes: TodoChanges) -> Result<Option<Todo>> {
        self.with_conn(move |conn| {
            let changeset = TodoChangeset {
                title: changes.title,
                description: changes.description,
                completed: changes.completed,
                updated_at: Utc::now().naive_utc(),
            };
            diesel::update(todos::table.find(id))
                .set(&changeset)
                .get_result(conn)
                .optional()
                .context("failed to update todo")
        })
        .await
    }

    async fn delete_todo(&self, id: Uuid) -> Result<bool> {
        self.with_conn(move |conn| {
            let deleted = diesel::delete(todos::table.find(id))
                .execute(conn)
                .context("failed to delete todo")?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn insert_refresh_token(&self, token: NewRefreshToken) -> Result<()> {
        self.with_conn(move |conn| {
            diesel::insert_into(refresh_tokens::table)
                .values(&token)
                .execute(conn)
                .context("failed to persist refresh token")?;
            Ok(())
        })
        .await
    }

    async fn refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let token = token.to_string();
        self.with_conn(move |conn| {
            refresh_tokens::table
                .find(&token)
                .first(conn)
                .optional()
                .context("failed to load refresh token")
        })
        .await
    }

    async fn delete_refresh_tokens(&self, token: &str) -> Result<usize> {
        let token = token.to_string();
        self.with_conn(move |conn| {
            diesel::delete(refresh_tokens::table.filter(refresh_tokens::token.eq(&token)))
                .execute(conn)
                .context("failed to delete refresh tokens")
        })
        .await
    }

    async fn print_by_code(&self, code: &str) -> Result<Option<Print>> {
        let code = code.to_string();
        self.with_conn(move |conn| {
            prints::table
                .find(&code)
                .first(conn)
                .optional()
                .context("failed to load print")
        })
        .await
    }
}
