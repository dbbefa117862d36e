// Structured API errors shared by every module
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;
use std::borrow::Cow;

/// Layer an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorLayer {
    Domain,
    Infra,
    Interface,
    UseCase,
}

/// Severity of an error, drives the log level at the response boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorLevel {
    Info,
    Warning,
    Error,
    Fatal,
}

/// A single invalid input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error value rendered to clients as `{ error: { code, message, fieldErrors }, status }`.
///
/// Domain enums convert into this type exhaustively; the `code` is the stable
/// string clients branch on.
#[derive(Debug, Clone)]
pub struct SmartError {
    pub code: &'static str,
    pub message: Cow<'static, str>,
    pub level: ErrorLevel,
    pub layer: ErrorLayer,
    pub function: Option<&'static str>,
    pub field_errors: Vec<FieldError>,
    pub raw: Option<String>,
    pub status: StatusCode,
}

impl SmartError {
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>, status: StatusCode, layer: ErrorLayer) -> Self {
        let level = if status.is_server_error() {
            ErrorLevel::Error
        } else {
            ErrorLevel::Warning
        };
        Self {
            code,
            message: message.into(),
            level,
            layer,
            function: None,
            field_errors: Vec::new(),
            raw: None,
            status,
        }
    }

    pub fn with_function(mut self, function: &'static str) -> Self {
        self.function = Some(function);
        self
    }

    pub fn with_raw(mut self, raw: impl ToString) -> Self {
        self.raw = Some(raw.to_string());
        self
    }

    pub fn with_level(mut self, level: ErrorLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_field_errors(mut self, field_errors: Vec<FieldError>) -> Self {
        self.field_errors = field_errors;
        self
    }

    pub fn unknown() -> Self {
        Self::new(
            "unknown",
            "An unexpected error occurred",
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorLayer::Infra,
        )
    }

    pub fn validation(field_errors: Vec<FieldError>) -> Self {
        Self::new(
            "ERR_VALIDATION",
            "The request contains invalid fields",
            StatusCode::BAD_REQUEST,
            ErrorLayer::Interface,
        )
        .with_level(ErrorLevel::Info)
        .with_field_errors(field_errors)
    }

    pub fn invalid_json(raw: impl ToString) -> Self {
        Self::new(
            "ERR_INVALID_JSON",
            "The request body is not valid JSON for this endpoint",
            StatusCode::BAD_REQUEST,
            ErrorLayer::Interface,
        )
        .with_level(ErrorLevel::Info)
        .with_raw(raw)
    }

    pub fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new("ERR_UNAUTHORIZED", message, StatusCode::UNAUTHORIZED, ErrorLayer::Interface)
    }

    pub fn timeout(function: &'static str) -> Self {
        Self::new(
            "ERR_TIMEOUT",
            "The operation did not finish in time",
            StatusCode::GATEWAY_TIMEOUT,
            ErrorLayer::UseCase,
        )
        .with_function(function)
        .with_level(ErrorLevel::Error)
    }

    /// JSON body sent to clients. `raw` and `function` stay server side.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "fieldErrors": self.field_errors,
            },
            "status": self.status.as_u16(),
        })
    }

    fn log(&self) {
        let function = self.function.unwrap_or("-");
        let raw = self.raw.as_deref().unwrap_or("-");
        match self.level {
            ErrorLevel::Info => tracing::debug!(code = self.code, function, "{}", self.message),
            ErrorLevel::Warning => tracing::warn!(code = self.code, function, raw, "{}", self.message),
            ErrorLevel::Error | ErrorLevel::Fatal => {
                tracing::error!(code = self.code, layer = ?self.layer, function, raw, "{}", self.message)
            }
        }
    }
}

impl std::fmt::Display for SmartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for SmartError {}

impl IntoResponse for SmartError {
    fn into_response(self) -> axum::response::Response {
        self.log();
        (self.status, Json(self.to_json())).into_response()
    }
}

impl From<validator::ValidationErrors> for SmartError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields = Vec::new();
        collect_field_errors("", &errors, &mut fields);
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        SmartError::validation(fields)
    }
}

fn collect_field_errors(prefix: &str, errors: &validator::ValidationErrors, out: &mut Vec<FieldError>) {
    use validator::ValidationErrorsKind;

    for (field, kind) in errors.errors() {
        let path = format!("{prefix}{field}");
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("failed '{}' validation", err.code));
                    out.push(FieldError::new(path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                collect_field_errors(&format!("{path}."), inner, out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(&format!("{path}[{index}]."), inner, out);
                }
            }
        }
    }
}
