use hyper::StatusCode;
use thiserror::Error;
pub use tokio_postgres::Error as DbError;

use crate::geocoding::GeocodeError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ValidationFailed(pub &'static str);

/// Errors produced by the model layer, before they reach a handler.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Validation(#[from] ValidationFailed),
    #[error("The username \"{0}\" is already taken")]
    DuplicateUsername(String),
    #[error("The event {0} does not exist")]
    InvalidEvent(i32),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    ValidationFail(String),
    #[error("The username \"{0}\" is already taken")]
    DuplicateUsername(String),
    #[error("The event {0} does not exist")]
    InvalidEvent(i32),
    #[error("Failed to geocode the address: {0}")]
    Geocode(#[from] GeocodeError),
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("Object storage failure: {0}")]
    Storage(#[from] StorageError),
    #[error("An unexpected database error occurred")]
    Database(#[from] DbError),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("An unexpected error occurred")]
    Unexpected(anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        use AppError::*;
        match self {
            ValidationFail(_) => StatusCode::BAD_REQUEST,
            DuplicateUsername(_) => StatusCode::CONFLICT,
            InvalidEvent(_) | NotFound(_) => StatusCode::NOT_FOUND,
            Geocode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Storage(_) => StatusCode::BAD_GATEWAY,
            MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        use AppError::*;
        match self {
            ValidationFail(_) => "VALIDATION_FAIL",
            DuplicateUsername(_) => "DUPLICATE_USERNAME",
            InvalidEvent(_) => "INVALID_EVENT",
            Geocode(_) => "GEOCODE_FAIL",
            UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Storage(_) => "STORAGE_FAIL",
            Database(_) => "PERSISTENCE_FAIL",
            NotFound(_) => "NOT_FOUND",
            MethodNotAllowed => "METHOD_NOT_ALLOWED",
            _ => "UNEXPECTED",
        }
    }
}

impl From<ValidationFailed> for AppError {
    fn from(ValidationFailed(message): ValidationFailed) -> AppError {
        AppError::ValidationFail(message.to_string())
    }
}

impl From<ModelError> for AppError {
    fn from(e: ModelError) -> AppError {
        match e {
            ModelError::Database(e) => e.into(),
            ModelError::Validation(e) => e.into(),
            ModelError::DuplicateUsername(username) => AppError::DuplicateUsername(username),
            ModelError::InvalidEvent(event_id) => AppError::InvalidEvent(event_id),
        }
    }
}

macro_rules! unexpected {
    () => {
        |e| {
            ::log::error!("Unexpected error: [{}][{}]{}", file!(), line!(), e);
            crate::error::AppError::Unexpected(e.into())
        }
    };
    ($msg: expr) => {{
        let msg = $msg.to_string();
        ::log::error!("Unexpected error: [{}][{}]{}", file!(), line!(), msg);
        crate::error::AppError::Unexpected(::anyhow::anyhow!(msg))
    }};
}

#[test]
fn error_kinds_are_distinct() {
    let errors = vec![
        AppError::ValidationFail("name is required".to_string()),
        AppError::DuplicateUsername("humura".to_string()),
        AppError::InvalidEvent(42),
        AppError::Geocode(GeocodeError::NoMatch),
        AppError::UnsupportedMediaType("image/gif".to_string()),
        AppError::Storage(StorageError::MissingCredentials),
        AppError::NotFound("event"),
    ];
    let mut codes: Vec<&str> = errors.iter().map(AppError::error_code).collect();
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(codes.len(), errors.len());
    assert!(!codes.contains(&"UNEXPECTED"));
}

#[test]
fn model_error_conversion() {
    let e: AppError = ModelError::InvalidEvent(7).into();
    assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(e.error_code(), "INVALID_EVENT");

    let e: AppError = ModelError::Validation(ValidationFailed("Message is empty.")).into();
    assert_eq!(e.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(e.to_string(), "Validation failed: Message is empty.");

    let e: AppError = ModelError::DuplicateUsername("cocona".to_string()).into();
    assert_eq!(e.status_code(), StatusCode::CONFLICT);
}
