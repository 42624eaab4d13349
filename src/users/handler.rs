use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;

use super::{NewUser, Role, UserChanges, user_not_found};
use crate::api::{PageParams, created, list, parse_body, parse_id, success, success_with_message};
use crate::error::{AppError, AppResult};
use crate::handler::AppState;

#[derive(Debug, Deserialize)]
pub struct UserListParams {
    pub role: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// Checks a create body: name is a non-empty string, email contains `@`,
/// role (if given) is admin or user.
pub fn validate_user(body: &Value) -> AppResult<NewUser> {
    let name = match body.get("name") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(AppError::Validation("Name is required and must be a string".into())),
    };

    let email = match body.get("email") {
        Some(Value::String(s)) if s.contains('@') => s.clone(),
        _ => return Err(AppError::Validation("Valid email is required".into())),
    };

    let role = parse_role(body.get("role"))?;

    Ok(NewUser { name, email, role })
}

/// Partial update: empty or absent fields are left untouched, present ones
/// are held to the same rules as on create.
pub fn validate_changes(body: &Value) -> AppResult<UserChanges> {
    let name = match body.get("name") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(AppError::Validation("Name must be a string".into())),
    };

    let email = match body.get("email") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) if s.contains('@') => Some(s.clone()),
        Some(_) => return Err(AppError::Validation("Valid email is required".into())),
    };

    let role = parse_role(body.get("role"))?;

    Ok(UserChanges { name, email, role })
}

fn parse_role(raw: Option<&Value>) -> AppResult<Option<Role>> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Role::parse(s)
            .map(Some)
            .ok_or_else(|| AppError::Validation("Role must be admin or user".into())),
        Some(_) => Err(AppError::Validation("Role must be admin or user".into())),
    }
}

pub async fn list_users(State(state): State<AppState>, Query(params): Query<UserListParams>) -> Response {
    let role = match params.role.as_deref().filter(|r| !r.is_empty()) {
        None => None,
        // An unknown role matches nobody rather than everybody.
        Some(r) => match Role::parse(r) {
            Some(role) => Some(role),
            None => {
                let empty: Vec<super::User> = Vec::new();
                return (StatusCode::OK, Json(params.page.into_handler_params().paginate(&empty)))
                    .into_response();
            }
        },
    };

    let users = state.users.list(role).await;
    let page = params.page.into_handler_params().paginate(&users);

    (StatusCode::OK, Json(page)).into_response()
}

pub async fn search_users(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let q = match params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => q.to_string(),
        None => {
            return AppError::Validation("Query parameter q is required".into()).into_response();
        }
    };

    list(state.users.search(&q).await)
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_id(&id) else {
        return user_not_found(id).into_response();
    };

    match state.users.get(id).await {
        Some(user) => success(user),
        None => user_not_found(id).into_response(),
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let input = match parse_body(payload).and_then(|body| validate_user(&body)) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    let user = state.users.create(input).await;
    tracing::info!(user_id = user.id, "user created");
    created(Some("User created successfully"), user)
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Some(id) = parse_id(&id) else {
        return user_not_found(id).into_response();
    };
    let changes = match parse_body(payload).and_then(|body| validate_changes(&body)) {
        Ok(changes) => changes,
        Err(e) => return e.into_response(),
    };

    match state.users.update(id, changes).await {
        Ok(user) => success_with_message("User updated successfully", user),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_id(&id) else {
        return user_not_found(id).into_response();
    };

    match state.users.delete(id).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, "user deleted");
            success_with_message("User deleted successfully", user)
        }
        Err(e) => e.into_response(),
    }
}
