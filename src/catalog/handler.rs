use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use super::{AuthorInput, BookInput, author_not_found, book_not_found};
use crate::api::{PageParams, created, list, parse_body, parse_id, success};
use crate::error::{AppError, AppResult};
use crate::handler::AppState;
use crate::validate::{AUTHOR_SCHEMA, BOOK_SCHEMA, Schema};

#[derive(Debug, Deserialize)]
pub struct AuthorFilter {
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookFilter {
    pub genre: Option<String>,
    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

fn validated<T: DeserializeOwned>(schema: &Schema, payload: Result<Json<Value>, JsonRejection>) -> AppResult<T> {
    let body = parse_body(payload)?;
    let normalized = schema.validate(&body)?;
    serde_json::from_value(Value::Object(normalized)).map_err(|e| AppError::Validation(e.to_string()))
}

// ============================================================================
// Author Handlers
// ============================================================================

pub async fn list_authors(State(state): State<AppState>, Query(filter): Query<AuthorFilter>) -> Response {
    let country = filter.country.as_deref().filter(|c| !c.is_empty());
    list(state.catalog.list_authors(country).await)
}

pub async fn search_authors(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    list(state.catalog.search_authors(params.q.as_deref().unwrap_or_default()).await)
}

pub async fn get_author(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let found = match parse_id(&id) {
        Some(id) => state.catalog.author_with_books(id).await,
        None => None,
    };

    match found {
        Some(author) => success(author),
        None => author_not_found().into_response(),
    }
}

pub async fn create_author(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let input: AuthorInput = match validated(&AUTHOR_SCHEMA, payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    let author = state.catalog.create_author(input).await;
    tracing::info!(author_id = author.id, "author created");
    created(None, author)
}

pub async fn update_author(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let input: AuthorInput = match validated(&AUTHOR_SCHEMA, payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };
    let Some(id) = parse_id(&id) else {
        return author_not_found().into_response();
    };

    match state.catalog.update_author(id, input).await {
        Ok(author) => success(author),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_author(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_id(&id) else {
        return author_not_found().into_response();
    };

    match state.catalog.delete_author(id).await {
        Ok(author) => {
            tracing::info!(author_id = author.id, "author deleted");
            success(author)
        }
        Err(e) => e.into_response(),
    }
}

// ============================================================================
// Book Handlers
// ============================================================================

pub async fn list_books(State(state): State<AppState>, Query(filter): Query<BookFilter>) -> Response {
    let genre = filter.genre.as_deref().filter(|g| !g.is_empty());
    let books = state.catalog.list_books(genre).await;
    let page = filter.page.into_handler_params().paginate(&books);

    (StatusCode::OK, Json(page)).into_response()
}

pub async fn search_books(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    list(state.catalog.search_books(params.q.as_deref().unwrap_or_default()).await)
}

pub async fn get_book(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let found = match parse_id(&id) {
        Some(id) => state.catalog.get_book(id).await,
        None => None,
    };

    match found {
        Some(book) => success(book),
        None => book_not_found().into_response(),
    }
}

pub async fn create_book(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let input: BookInput = match validated(&BOOK_SCHEMA, payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    match state.catalog.create_book(input).await {
        Ok(book) => {
            tracing::info!(book_id = book.book.id, "book created");
            created(None, book)
        }
        Err(e) => e.into_response(),
    }
}

pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let input: BookInput = match validated(&BOOK_SCHEMA, payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };
    let Some(id) = parse_id(&id) else {
        return book_not_found().into_response();
    };

    match state.catalog.update_book(id, input).await {
        Ok(book) => success(book),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_book(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(id) = parse_id(&id) else {
        return book_not_found().into_response();
    };

    match state.catalog.delete_book(id).await {
        Ok(book) => success(book),
        Err(e) => e.into_response(),
    }
}
