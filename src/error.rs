use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Invalid URL format")]
    InvalidUrl(String),

    #[error("Validity must be greater than 0")]
    InvalidValidity(f64),

    #[error("Invalid shortcode format")]
    InvalidShortCode(String),

    #[error("Shortcode already exists")]
    ShortCodeTaken(String),

    #[error("Short URL not found")]
    NotFound(String),

    #[error("Short URL has expired")]
    Expired(String),

    #[error("Could not find a free shortcode after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error("Failed to load URLs from storage: {0}")]
    StorageRead(String),

    #[error("Failed to save URLs to storage: {0}")]
    StorageWrite(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug)]
pub enum AppError {
    Registry(RegistryError),
    BadRequest(String),
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::Registry(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Registry(err) => match err {
                RegistryError::InvalidUrl(_)
                | RegistryError::InvalidValidity(_)
                | RegistryError::InvalidShortCode(_) => StatusCode::BAD_REQUEST,
                RegistryError::ShortCodeTaken(_) => StatusCode::CONFLICT,
                RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
                RegistryError::Expired(_) => StatusCode::GONE,
                RegistryError::CodeSpaceExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
                RegistryError::StorageRead(_) | RegistryError::StorageWrite(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let error_message = match self {
            AppError::Registry(err) => err.to_string(),
            AppError::BadRequest(msg) => msg,
        };

        let body = Json(serde_json::json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
