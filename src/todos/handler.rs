use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{CreateTodo, TodoApp, UpdateTodo};
use crate::api::{created, list, parse_body, parse_id, success, success_with_message};
use crate::error::AppError;
use crate::handler::AppState;

#[derive(Debug, Deserialize)]
pub struct TodoFilter {
    pub status: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

fn todo_not_found(id: impl std::fmt::Display) -> Response {
    AppError::NotFound(format!("Todo #{id} not found")).into_response()
}

pub async fn list_todos(State(state): State<AppState>, Query(filter): Query<TodoFilter>) -> Response {
    let app = TodoApp::new(state.db.connection());
    let status = filter.status.as_deref().map(str::to_lowercase);
    let by_date = filter.sort.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("date"));

    let result = match status.as_deref() {
        Some("pending") => app.pending().await,
        Some("completed") => app.completed().await,
        Some("all") | None if by_date => app.by_date().await,
        Some("all") | None => app.all().await,
        Some(other) => {
            return AppError::Validation(format!("Unknown status filter: {other}")).into_response();
        }
    };

    match result {
        Ok(todos) => list(todos),
        Err(e) => e.into_response(),
    }
}

pub async fn create_todo(
    State(state): State<AppState>,
    payload: Result<Json<CreateTodo>, JsonRejection>,
) -> Response {
    let input = match parse_body(payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    match TodoApp::new(state.db.connection()).add(&input.task).await {
        Ok(todo) => created(Some("Todo added"), todo),
        Err(e) => e.into_response(),
    }
}

pub async fn stats(State(state): State<AppState>) -> Response {
    match TodoApp::new(state.db.connection()).stats().await {
        Ok(stats) => success(stats),
        Err(e) => e.into_response(),
    }
}

pub async fn search_todos(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let keyword = params.q.unwrap_or_default();

    match TodoApp::new(state.db.connection()).search(&keyword).await {
        Ok(todos) => list(todos),
        Err(e) => e.into_response(),
    }
}

pub async fn update_todo(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    payload: Result<Json<UpdateTodo>, JsonRejection>,
) -> Response {
    let Some(id) = parse_id::<i64>(&raw) else {
        return todo_not_found(raw);
    };
    let input = match parse_body(payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };
    let app = TodoApp::new(state.db.connection());

    match app.update_task(id, &input.task).await {
        Ok(true) => match app.get(id).await {
            Ok(Some(todo)) => success_with_message("Todo updated", todo),
            Ok(None) => todo_not_found(id),
            Err(e) => e.into_response(),
        },
        Ok(false) => todo_not_found(id),
        Err(e) => e.into_response(),
    }
}

pub async fn mark_done(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let Some(id) = parse_id::<i64>(&raw) else {
        return todo_not_found(raw);
    };
    let app = TodoApp::new(state.db.connection());

    match app.mark_done(id).await {
        Ok(true) => match app.get(id).await {
            Ok(Some(todo)) => success_with_message("Todo marked as done", todo),
            Ok(None) => todo_not_found(id),
            Err(e) => e.into_response(),
        },
        Ok(false) => todo_not_found(id),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_todo(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let Some(id) = parse_id::<i64>(&raw) else {
        return todo_not_found(raw);
    };
    match TodoApp::new(state.db.connection()).delete(id).await {
        Ok(true) => success_with_message("Todo deleted", serde_json::json!({ "id": id })),
        Ok(false) => todo_not_found(id),
        Err(e) => e.into_response(),
    }
}

pub async fn clear_completed(State(state): State<AppState>) -> Response {
    match TodoApp::new(state.db.connection()).clear_completed().await {
        Ok(cleared) => success(serde_json::json!({ "cleared": cleared })),
        Err(e) => e.into_response(),
    }
}
