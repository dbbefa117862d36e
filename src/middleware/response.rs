use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::error::SmartError;
use crate::pagination::Page;

/// Wrapper for API responses that renders the `{ data, status }` envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        match serde_json::to_value(&self.data) {
            Ok(data) => (status, Json(json!({ "data": data, "status": status.as_u16() }))).into_response(),
            Err(e) => SmartError::unknown()
                .with_function("serialize_response")
                .with_raw(e)
                .into_response(),
        }
    }
}

/// List response rendering `{ data, pagination, status }`
#[derive(Debug)]
pub struct PageResponse<T: Serialize>(pub Page<T>);

impl<T: Serialize> IntoResponse for PageResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::OK;
        let Page { data, pagination } = self.0;

        match serde_json::to_value(&data) {
            Ok(data) => (
                status,
                Json(json!({ "data": data, "pagination": pagination, "status": status.as_u16() })),
            )
                .into_response(),
            Err(e) => SmartError::unknown()
                .with_function("serialize_response")
                .with_raw(e)
                .into_response(),
        }
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, SmartError>;
pub type PageResult<T> = Result<PageResponse<T>, SmartError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::{Pagination, PaginationResults};

    async fn body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn created_envelope() {
        let response = ApiResponse::created(json!({ "id": "x" })).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body(response).await, json!({ "data": { "id": "x" }, "status": 201 }));
    }

    #[tokio::test]
    async fn page_envelope() {
        let page = Page {
            data: vec![1, 2],
            pagination: PaginationResults::from_params(&Pagination::default(), 2),
        };
        let value = body(PageResponse(page).into_response()).await;
        assert_eq!(value["status"], 200);
        assert_eq!(value["data"], json!([1, 2]));
        assert_eq!(value["pagination"]["last_page"], 1);
        assert_eq!(value["pagination"]["total"], 2);
    }
}
