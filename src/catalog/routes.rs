use axum::{Router, routing::get};

use super::handler;
use crate::handler::AppState;

pub fn author_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list_authors).post(handler::create_author))
        .route("/search", get(handler::search_authors))
        .route(
            "/:id",
            get(handler::get_author)
                .put(handler::update_author)
                .delete(handler::delete_author),
        )
}

pub fn book_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list_books).post(handler::create_book))
        .route("/search", get(handler::search_books))
        .route(
            "/:id",
            get(handler::get_book)
                .put(handler::update_book)
                .delete(handler::delete_book),
        )
}
