//! Error handler for vigil.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sqlx::Error as SQLxError;
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

const UNIQUE_VIOLATION: &str = "23505";

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("SQL request failed: {0}")]
    Sql(#[from] SQLxError),

    #[error("mail transport failure: {0}")]
    Mail(#[from] lapin::Error),

    #[error("invalid amqp scheme")]
    InvalidScheme,

    #[error("{0}")]
    Invalid(String),

    #[error("invalid 'Authorization' header")]
    Unauthorized,

    #[error("invalid credentials")]
    Credentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal server error, {details}")]
    Internal { details: String },
}

impl ServerError {
    fn internal(details: impl ToString) -> Self {
        ServerError::Internal {
            details: details.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for ServerError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        ServerError::internal(err)
    }
}

impl From<jsonwebtoken::errors::Error> for ServerError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ServerError::internal(err)
    }
}

impl From<argon2::Error> for ServerError {
    fn from(err: argon2::Error) -> Self {
        ServerError::internal(err)
    }
}

impl From<argon2::password_hash::Error> for ServerError {
    fn from(err: argon2::password_hash::Error) -> Self {
        ServerError::internal(err)
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::internal(err)
    }
}

impl From<url::ParseError> for ServerError {
    fn from(err: url::ParseError) -> Self {
        ServerError::internal(err)
    }
}

/// Structure for error responses. Every failure carries a `message` field.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Create a new [`ResponseError`] with a human-readable message.
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_owned(),
            errors: None,
        }
    }

    /// Automatically add `errors` field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(
        self,
        status: StatusCode,
    ) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue.to_string(),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, response) = match &self {
            ServerError::Validation(validation_errors) => (
                StatusCode::BAD_REQUEST,
                ResponseError::new("There were validation errors with your request.")
                    .errors(validation_errors),
            ),

            ServerError::Axum(rejection) => (
                StatusCode::BAD_REQUEST,
                ResponseError::new(&rejection.body_text()),
            ),

            ServerError::Invalid(message) => {
                (StatusCode::BAD_REQUEST, ResponseError::new(message))
            },

            ServerError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ResponseError::new("Invalid token"),
            ),

            ServerError::Credentials => (
                StatusCode::UNAUTHORIZED,
                ResponseError::new("Invalid credentials"),
            ),

            ServerError::Forbidden(message) => {
                (StatusCode::FORBIDDEN, ResponseError::new(message))
            },

            ServerError::NotFound(message) => {
                (StatusCode::NOT_FOUND, ResponseError::new(message))
            },

            ServerError::Conflict(message) => {
                (StatusCode::CONFLICT, ResponseError::new(message))
            },

            ServerError::Sql(err) => match err {
                SQLxError::RowNotFound => {
                    (StatusCode::NOT_FOUND, ResponseError::new("Not found"))
                },
                err if err
                    .as_database_error()
                    .and_then(|e| e.code())
                    .is_some_and(|code| code == UNIQUE_VIOLATION) =>
                {
                    (StatusCode::CONFLICT, ResponseError::new("Already exists"))
                },
                err => {
                    tracing::error!(%err, "sql request returned 500 status");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ResponseError::new("Internal server error"),
                    )
                },
            },

            ServerError::Internal { details } => {
                tracing::error!(%details, "server returned 500 status");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ResponseError::new("Internal server error"),
                )
            },

            err => {
                tracing::error!(%err, "server returned 500 status");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ResponseError::new("Internal server error"),
                )
            },
        };

        response
            .into_response(status)
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "message": "Internal server error",
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
