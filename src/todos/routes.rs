use axum::{
    Router,
    routing::{delete, get, post, put},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handler::list_todos).post(handler::create_todo))
        .route("/stats", get(handler::stats))
        .route("/search", get(handler::search_todos))
        .route("/completed", delete(handler::clear_completed))
        .route("/:id", put(handler::update_todo).delete(handler::delete_todo))
        .route("/:id/done", post(handler::mark_done))
}
