use std::error::Error;

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod library;
pub mod products;
pub mod rate_limit;
pub mod router;
pub mod tasks;
pub mod todos;
pub mod users;
pub mod validate;

/// Flattens an error and its source chain into `outer: inner: root`.
pub fn unpack_error(err: &(dyn Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}
