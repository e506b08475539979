use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;

use crate::blog::{BlogError, RepositoryError, ValidationErrors};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Anonymous request to a page that needs a user; sent to the login page.
    #[error("Login required for {next}")]
    LoginRequired { login_url: String, next: String },

    #[error("Unauthorized")]
    Unauthorized,

    /// Signed in, but not allowed; sent back to where they came from.
    #[error("Forbidden, redirecting to {redirect}")]
    Forbidden { redirect: String },

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn login_required(login_url: &str, next: impl Into<String>) -> Self {
        AppError::LoginRequired {
            login_url: login_url.to_string(),
            next: next.into(),
        }
    }
}

impl From<BlogError> for AppError {
    fn from(err: BlogError) -> Self {
        match err {
            BlogError::NotFound(what) => AppError::NotFound(what),
            BlogError::Unauthorized => AppError::Unauthorized,
            BlogError::Forbidden { post_id } => AppError::Forbidden {
                redirect: format!("/posts/{}/", post_id),
            },
            BlogError::Validation(errors) => AppError::Validation(errors),
            BlogError::Repository(e) => AppError::Repository(e),
        }
    }
}

/// `<login_url>?next=<url-encoded next>`
pub fn login_redirect_target(login_url: &str, next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{}?next={}", login_url, encoded)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::LoginRequired { login_url, next } => {
                return Redirect::to(&login_redirect_target(login_url, next)).into_response();
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden { redirect } => {
                return Redirect::to(redirect).into_response();
            }
            AppError::Validation(errors) => {
                let body = serde_json::json!({ "errors": errors });
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Repository(e) => {
                tracing::error!("Repository error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
