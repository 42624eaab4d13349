use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::info;

use crate::api::success_with_message;
use crate::catalog::CatalogStore;
use crate::db::Database;
use crate::error::AppError;
use crate::products::ProductCatalog;
use crate::rate_limit::RateLimiter;
use crate::users::UserRepository;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub users: Arc<UserRepository>,
    pub catalog: Arc<CatalogStore>,
    pub products: Arc<ProductCatalog>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// State with the demo users and catalogue loaded into memory.
    pub fn new(db: Arc<Database>, products: ProductCatalog, limiter: Arc<RateLimiter>) -> Self {
        AppState {
            db,
            users: Arc::new(UserRepository::seeded()),
            catalog: Arc::new(CatalogStore::seeded()),
            products: Arc::new(products),
            limiter,
        }
    }
}

pub async fn healthcheck() -> Response {
    info!("got healthcheck request");
    success_with_message("ok", Value::Null)
}

pub async fn not_found() -> Response {
    AppError::NotFound("Route not found".into()).into_response()
}
