//! Product catalogue behind the storefront search box.

use std::path::Path;

use axum::{
    Router,
    extract::{Query, State},
    response::Response,
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::api::list;
use crate::error::AppResult;
use crate::handler::AppState;

const DEFAULT_PRODUCTS: &str = include_str!("../assets/products.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub price: f64,
    pub image: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: Vec<Product>,
}

impl ProductCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// Reads a `products.json` array, or the bundled catalogue when no path
    /// is configured.
    pub async fn load(path: Option<&Path>) -> AppResult<Self> {
        let raw = match path {
            Some(path) => tokio::fs::read_to_string(path).await?,
            None => DEFAULT_PRODUCTS.to_string(),
        };
        let products: Vec<Product> = serde_json::from_str(&raw)?;
        tracing::info!(count = products.len(), "product catalogue loaded");
        Ok(Self::new(products))
    }

    /// Case-insensitive substring match on the product name. A blank term
    /// returns everything.
    pub fn search(&self, term: &str) -> Vec<Product> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.products.clone();
        }
        self.products
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&term))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

pub async fn search_products(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    list(state.products.search(params.q.as_deref().unwrap_or_default()))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(search_products))
}
