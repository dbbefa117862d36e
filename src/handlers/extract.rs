// handlers/extract.rs - request extractors that validate before the handler runs

use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::{FieldError, SmartError};
use crate::pagination::Pagination;

/// JSON body deserialized and validated; failures become `ERR_INVALID_JSON` / `ERR_VALIDATION`
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = SmartError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| SmartError::invalid_json(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Query string deserialized and validated
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = SmartError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| SmartError::validation(vec![FieldError::new("query", rejection.body_text())]))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Query parameters of list endpoints without extra filters
#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct PageQuery {
    #[serde(default = "crate::pagination::default_page")]
    #[validate(range(min = 1, message = "page must be greater than zero"))]
    pub page: i64,

    #[serde(default = "crate::pagination::default_size_page")]
    #[validate(range(min = 1, max = 1000, message = "size_page must be between 1 and 1000"))]
    pub size_page: i64,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.size_page)
    }
}
