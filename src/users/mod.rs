//! User directory: an in-memory repository behind `/api/users`.

mod handler;
mod routes;
mod store;

pub use routes::routes;
pub use store::*;
