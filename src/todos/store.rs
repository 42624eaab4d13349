use libsql::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub task: String,
    pub done: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TodoStats {
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTodo {
    pub task: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTodo {
    pub task: String,
}

pub struct TodoApp<'a> {
    conn: &'a Connection,
}

impl<'a> TodoApp<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn add(&self, task: &str) -> AppResult<Todo> {
        let task = task.trim();
        if task.is_empty() {
            return Err(AppError::Validation("Please provide a valid task text".into()));
        }

        let query = r#"
            INSERT INTO todos (task, done, created_at)
            VALUES (?, 0, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            RETURNING id, task, done, created_at
        "#;
        let mut rows = self.conn.query(query, libsql::params![task]).await?;

        match rows.next().await? {
            Some(row) => {
                let todo = row_to_todo(&row)?;
                tracing::info!(todo_id = todo.id, "todo added");
                Ok(todo)
            }
            None => Err(anyhow::anyhow!("failed to create todo").into()),
        }
    }

    pub async fn get(&self, id: i64) -> AppResult<Option<Todo>> {
        let mut todos = self
            .query_todos(
                "SELECT id, task, done, created_at FROM todos WHERE id = ?",
                libsql::params![id],
            )
            .await?;
        Ok(todos.pop())
    }

    pub async fn all(&self) -> AppResult<Vec<Todo>> {
        self.query_todos("SELECT id, task, done, created_at FROM todos ORDER BY id", ())
            .await
    }

    pub async fn pending(&self) -> AppResult<Vec<Todo>> {
        self.query_todos(
            "SELECT id, task, done, created_at FROM todos WHERE done = 0 ORDER BY id",
            (),
        )
        .await
    }

    pub async fn completed(&self) -> AppResult<Vec<Todo>> {
        self.query_todos(
            "SELECT id, task, done, created_at FROM todos WHERE done = 1 ORDER BY id",
            (),
        )
        .await
    }

    /// Newest first.
    pub async fn by_date(&self) -> AppResult<Vec<Todo>> {
        self.query_todos(
            "SELECT id, task, done, created_at FROM todos ORDER BY created_at DESC, id DESC",
            (),
        )
        .await
    }

    pub async fn search(&self, keyword: &str) -> AppResult<Vec<Todo>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(AppError::Validation("Please provide a valid keyword to search".into()));
        }

        self.query_todos(
            "SELECT id, task, done, created_at FROM todos WHERE task LIKE ? ORDER BY id",
            libsql::params![format!("%{keyword}%")],
        )
        .await
    }

    /// Returns false when no todo has this id.
    pub async fn mark_done(&self, id: i64) -> AppResult<bool> {
        let changed = self
            .conn
            .execute("UPDATE todos SET done = 1 WHERE id = ?", libsql::params![id])
            .await?;
        Ok(changed > 0)
    }

    pub async fn update_task(&self, id: i64, task: &str) -> AppResult<bool> {
        if id <= 0 {
            return Err(AppError::Validation("Please provide a valid numeric id".into()));
        }
        let task = task.trim();
        if task.is_empty() {
            return Err(AppError::Validation("Please provide a valid task text".into()));
        }

        let changed = self
            .conn
            .execute("UPDATE todos SET task = ? WHERE id = ?", libsql::params![task, id])
            .await?;
        Ok(changed > 0)
    }

    pub async fn delete(&self, id: i64) -> AppResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM todos WHERE id = ?", libsql::params![id])
            .await?;
        Ok(changed > 0)
    }

    /// Deletes every finished todo and returns how many were removed.
    pub async fn clear_completed(&self) -> AppResult<u64> {
        let changed = self.conn.execute("DELETE FROM todos WHERE done = 1", ()).await?;
        tracing::info!(cleared = changed, "cleared completed todos");
        Ok(changed)
    }

    pub async fn stats(&self) -> AppResult<TodoStats> {
        let query = r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN done = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN done = 0 THEN 1 ELSE 0 END), 0)
            FROM todos
        "#;
        let mut rows = self.conn.query(query, ()).await?;

        match rows.next().await? {
            Some(row) => Ok(TodoStats {
                total: row.get(0)?,
                completed: row.get(1)?,
                pending: row.get(2)?,
            }),
            None => Ok(TodoStats {
                total: 0,
                completed: 0,
                pending: 0,
            }),
        }
    }

    async fn query_todos(&self, sql: &str, params: impl libsql::params::IntoParams) -> AppResult<Vec<Todo>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut todos = Vec::new();
        while let Some(row) = rows.next().await? {
            todos.push(row_to_todo(&row)?);
        }
        Ok(todos)
    }
}

fn row_to_todo(row: &libsql::Row) -> AppResult<Todo> {
    Ok(Todo {
        id: row.get(0)?,
        task: row.get(1)?,
        done: row.get::<i64>(2)? != 0,
        created_at: row.get(3)?,
    })
}
