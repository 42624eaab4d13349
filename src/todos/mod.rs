//! SQLite-backed todo list: one `todos` table wrapped 1:1 by `TodoApp`.

mod handler;
mod routes;
mod store;

pub use routes::routes;
pub use store::*;
