use axum::{
    Router,
    routing::{get, post},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(handler::list_books).post(handler::create_book))
        .route("/books/search", get(handler::search_books))
        .route("/members", get(handler::list_members).post(handler::create_member))
        .route("/members/:id/borrowed", get(handler::list_borrowed_books))
        .route("/borrowings", get(handler::list_borrowings).post(handler::borrow))
        .route("/borrowings/:id/return", post(handler::return_book))
}
