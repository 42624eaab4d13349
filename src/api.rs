use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const DEFAULT_PAGE: usize = 1;
const DEFAULT_LIMIT: usize = 10;

/// Success envelope shared by every REST handler.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub success: bool,
    pub count: usize,
    pub data: Vec<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub success: bool,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    pub data: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorBody,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorEnvelope {
            success: false,
            error: ErrorBody {
                message: message.into(),
            },
        }
    }
}

pub fn success<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            message: None,
            data,
        }),
    )
        .into_response()
}

pub fn success_with_message<T: Serialize>(msg: &str, data: T) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse {
            success: true,
            message: Some(msg.to_owned()),
            data,
        }),
    )
        .into_response()
}

pub fn created<T: Serialize>(msg: Option<&str>, data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(ApiResponse {
            success: true,
            message: msg.map(str::to_owned),
            data,
        }),
    )
        .into_response()
}

pub fn list<T: Serialize>(data: Vec<T>) -> Response {
    (
        StatusCode::OK,
        Json(ListResponse {
            success: true,
            count: data.len(),
            data,
        }),
    )
        .into_response()
}

/// Unwraps a JSON body, turning extractor rejections into the error envelope.
pub fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(AppError::Validation(rejection.body_text())),
    }
}

/// Path ids are taken as strings so a non-numeric id becomes the handler's
/// own not-found response.
pub fn parse_id<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

/// Raw pagination query. Values are kept as strings so that garbage like
/// `?page=abc` falls back to the defaults instead of rejecting the request.
#[derive(Debug, Deserialize, Default)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerParams {
    pub page: usize,
    pub limit: usize,
    pub offset: usize,
}

impl PageParams {
    pub fn into_handler_params(self) -> HandlerParams {
        let page = parse_positive(self.page.as_deref()).unwrap_or(DEFAULT_PAGE);
        let limit = parse_positive(self.limit.as_deref()).unwrap_or(DEFAULT_LIMIT);

        HandlerParams {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

fn parse_positive(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok()).filter(|n| *n >= 1)
}

impl HandlerParams {
    /// Slices one page out of an already filtered collection.
    pub fn paginate<T: Clone>(&self, items: &[T]) -> PageResponse<T> {
        let total = items.len();
        let data = items.iter().skip(self.offset).take(self.limit).cloned().collect();

        PageResponse {
            success: true,
            page: self.page,
            limit: self.limit,
            total,
            total_pages: total.div_ceil(self.limit),
            data,
        }
    }
}
