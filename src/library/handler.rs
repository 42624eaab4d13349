use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{BorrowRequest, CreateBook, CreateMember, Library};
use crate::api::{created, list, parse_body, parse_id, success_with_message};
use crate::error::AppError;
use crate::handler::AppState;

#[derive(Debug, Deserialize)]
pub struct BookFilter {
    pub available: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct BorrowingFilter {
    pub open: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

pub async fn list_books(State(state): State<AppState>, Query(filter): Query<BookFilter>) -> Response {
    let lib = Library::new(&state.db);
    let result = if filter.available.unwrap_or(false) {
        lib.available_books().await
    } else {
        lib.all_books().await
    };

    match result {
        Ok(books) => list(books),
        Err(e) => e.into_response(),
    }
}

pub async fn search_books(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let lib = Library::new(&state.db);
    let keyword = params.q.unwrap_or_default();

    match lib.search_books(&keyword).await {
        Ok(books) => list(books),
        Err(e) => e.into_response(),
    }
}

pub async fn create_book(
    State(state): State<AppState>,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> Response {
    let input = match parse_body(payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    match Library::new(&state.db).add_book(input).await {
        Ok(book) => {
            tracing::info!(book_id = book.id, "book added");
            created(Some("Book added successfully"), book)
        }
        Err(e) => e.into_response(),
    }
}

pub async fn list_members(State(state): State<AppState>) -> Response {
    match Library::new(&state.db).all_members().await {
        Ok(members) => list(members),
        Err(e) => e.into_response(),
    }
}

pub async fn create_member(
    State(state): State<AppState>,
    payload: Result<Json<CreateMember>, JsonRejection>,
) -> Response {
    let input = match parse_body(payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    match Library::new(&state.db).add_member(input).await {
        Ok(member) => {
            tracing::info!(member_id = member.id, "member added");
            created(Some("Member added successfully"), member)
        }
        Err(e) => e.into_response(),
    }
}

fn member_not_found(id: impl std::fmt::Display) -> Response {
    AppError::NotFound(format!("Member #{id} not found")).into_response()
}

pub async fn list_borrowed_books(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let Some(id) = parse_id::<i64>(&raw) else {
        return member_not_found(raw);
    };
    let lib = Library::new(&state.db);

    match lib.get_member(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return member_not_found(id),
        Err(e) => return e.into_response(),
    }

    match lib.borrowed_books(id).await {
        Ok(books) => list(books),
        Err(e) => e.into_response(),
    }
}

pub async fn list_borrowings(
    State(state): State<AppState>,
    Query(filter): Query<BorrowingFilter>,
) -> Response {
    let lib = Library::new(&state.db);
    let result = if filter.open.unwrap_or(false) {
        lib.unreturned().await
    } else {
        lib.all_borrowings().await
    };

    match result {
        Ok(borrowings) => list(borrowings),
        Err(e) => e.into_response(),
    }
}

pub async fn borrow(
    State(state): State<AppState>,
    payload: Result<Json<BorrowRequest>, JsonRejection>,
) -> Response {
    let input = match parse_body(payload) {
        Ok(input) => input,
        Err(e) => return e.into_response(),
    };

    match Library::new(&state.db).borrow(input.book_id, input.member_id).await {
        Ok(borrowing) => created(Some("Book borrowed successfully"), borrowing),
        Err(e) => e.into_response(),
    }
}

pub async fn return_book(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let Some(id) = parse_id::<i64>(&raw) else {
        return AppError::NotFound(format!("Borrowing #{raw} not found")).into_response();
    };
    match Library::new(&state.db).return_book(id).await {
        Ok(borrowing) => success_with_message("Book returned successfully", borrowing),
        Err(e) => e.into_response(),
    }
}
