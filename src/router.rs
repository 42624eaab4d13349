use axum::{
    Router,
    http::Method,
    middleware,
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handler::{AppState, healthcheck, not_found};
use crate::rate_limit::rate_limit;
use crate::{catalog, library, products, todos, users};

/// Every REST route, rate limited under `/api`.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let api = Router::new()
        .nest("/users", users::routes())
        .nest("/authors", catalog::author_routes())
        .nest("/books", catalog::book_routes())
        .nest("/products", products::routes())
        .nest("/todos", todos::routes())
        .nest("/library", library::routes())
        .layer(middleware::from_fn_with_state(state.limiter.clone(), rate_limit));

    Router::new()
        .route("/", get(healthcheck))
        .nest("/api", api)
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::db::Database;
    use crate::products::ProductCatalog;
    use crate::rate_limit::RateLimiter;

    async fn state_with_limit(max_requests: usize) -> AppState {
        let db = Database::in_memory().await.unwrap();
        db.seed().await.unwrap();
        let products = ProductCatalog::load(None).await.unwrap();
        let limiter = Arc::new(RateLimiter::new(Duration::from_secs(60), max_requests));
        AppState::new(Arc::new(db), products, limiter)
    }

    async fn state() -> AppState {
        state_with_limit(1000).await
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn users_paginate_by_role() {
        let app = app(state().await);
        let (status, body) = send(app, "GET", "/api/users?role=admin&page=1&limit=2", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["page"], 1);
        assert_eq!(body["limit"], 2);
        assert_eq!(body["total"], 2);
        assert_eq!(body["totalPages"], 1);
        let roles: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["admin", "admin"]);
    }

    #[tokio::test]
    async fn unknown_user_is_404() {
        let app = app(state().await);
        let (status, body) = send(app, "GET", "/api/users/999", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["message"], "User with ID 999 not found");
    }

    #[tokio::test]
    async fn author_with_books_is_not_deleted() {
        let state = state().await;

        let (status, body) = send(app(state.clone()), "DELETE", "/api/authors/2", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = send(app(state), "GET", "/api/authors/2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["books"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn book_validation_reports_first_violation() {
        let app = app(state().await);
        let (status, body) = send(
            app,
            "POST",
            "/api/books",
            Some(json!({"title": "", "authorId": 1, "year": 2001, "genre": "Drama", "isbn": "123-456"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("title"));
    }

    #[tokio::test]
    async fn negative_author_id_is_a_validation_error() {
        let app = app(state().await);
        let (status, body) = send(
            app,
            "POST",
            "/api/books",
            Some(json!({"title": "Dune", "authorId": -1, "year": 1965, "genre": "Sci-Fi", "isbn": "978-0441013593"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "\"authorId\" must be greater than or equal to 1");
    }

    #[tokio::test]
    async fn user_search_requires_query() {
        let app = app(state().await);
        let (status, body) = send(app, "GET", "/api/users/search", None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Query parameter q is required");
    }

    #[tokio::test]
    async fn todo_lifecycle() {
        let state = state().await;

        let (status, body) = send(
            app(state.clone()),
            "POST",
            "/api/todos",
            Some(json!({"task": "Water the plants"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Todo added");
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = send(app(state.clone()), "POST", &format!("/api/todos/{id}/done"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["done"], true);

        let (status, body) = send(app(state.clone()), "GET", "/api/todos?status=completed", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);

        let (status, body) = send(app(state.clone()), "DELETE", "/api/todos/completed", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["cleared"], 2);

        let (_, body) = send(app(state), "GET", "/api/todos", None).await;
        assert_eq!(body["count"], 3);
    }

    #[tokio::test]
    async fn todo_filter_and_ids_are_checked() {
        let state = state().await;

        let (status, body) = send(app(state.clone()), "GET", "/api/todos?status=bogus", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Unknown status filter: bogus");

        let (status, body) = send(app(state.clone()), "DELETE", "/api/todos/abc", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["message"], "Todo #abc not found");

        let (status, body) = send(app(state), "POST", "/api/todos/99/done", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Todo #99 not found");
    }

    #[tokio::test]
    async fn library_members() {
        let state = state().await;

        let (status, body) = send(
            app(state.clone()),
            "POST",
            "/api/library/members",
            Some(json!({"name": "Malee", "email": "malee@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["email"], "malee@example.com");
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) =
            send(app(state.clone()), "GET", &format!("/api/library/members/{id}/borrowed"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);

        let (status, body) = send(app(state.clone()), "GET", "/api/library/members/99/borrowed", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Member #99 not found");

        let (status, body) = send(app(state), "POST", "/api/library/borrowings/abc/return", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Borrowing #abc not found");
    }

    #[tokio::test]
    async fn library_borrow_flow() {
        let state = state().await;

        let (status, body) = send(
            app(state.clone()),
            "POST",
            "/api/library/borrowings",
            Some(json!({"bookId": 2, "memberId": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let borrowing_id = body["data"]["id"].as_i64().unwrap();

        let (status, _) = send(
            app(state.clone()),
            "POST",
            "/api/library/borrowings",
            Some(json!({"bookId": 2, "memberId": 2})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/library/borrowings/{borrowing_id}/return");
        let (status, _) = send(app(state.clone()), "POST", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(app(state), "POST", &uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn products_search() {
        let app = app(state().await);
        let (status, body) = send(app, "GET", "/api/products?q=", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 6);
    }

    #[tokio::test]
    async fn rate_limit_returns_429() {
        let state = state_with_limit(2).await;

        for _ in 0..2 {
            let (status, _) = send(app(state.clone()), "GET", "/api/products", None).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = send(app(state.clone()), "GET", "/api/products", None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["message"], "Too many requests, please try again later");

        // Outside /api is not limited.
        let (status, _) = send(app(state), "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = app(state().await);
        let (status, body) = send(app, "GET", "/nope", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Route not found");
    }
}
