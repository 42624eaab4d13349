//! Authors and books kept in memory, exposed under `/api/authors` and
//! `/api/books`. Request bodies go through [`crate::validate`] before they
//! reach the store.

mod handler;
mod routes;
mod store;

pub use routes::{author_routes, book_routes};
pub use store::*;
