use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for the AI generation pipeline.
///
/// Structural defects and recognized upstream signatures abort the stage
/// and surface to the caller; per-block media failures never reach this
/// type — they are downgraded to placeholders inside the populators.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("The AI model is currently overloaded. Please wait a moment and try again.")]
    ModelOverloaded,

    #[error("AI request limit reached. Please try again in a few minutes.")]
    RateLimited,

    #[error("AI generation returned an invalid course structure: {0}")]
    InvalidStructure(String),

    #[error("Course generation failed: {0}")]
    Upstream(String),
}

impl GenerationError {
    /// Rewrite a raw upstream error into the closest actionable variant.
    /// Recognizes the two known failure signatures (overload, rate limit);
    /// everything else passes through with the original message prefixed.
    pub fn from_upstream(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("overloaded") || lower.contains("503") {
            GenerationError::ModelOverloaded
        } else if lower.contains("rate limit") || lower.contains("429") || lower.contains("quota") {
            GenerationError::RateLimited
        } else {
            GenerationError::Upstream(message.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Generation(err) => {
                let status = match err {
                    GenerationError::ModelOverloaded | GenerationError::RateLimited => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, err.to_string())
            }
            Error::Reqwest(err) => (
                StatusCode::BAD_GATEWAY,
                format!("External service error: {}", err),
            ),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            Error::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            Error::Anyhow(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
            ),
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_overload_is_rewritten() {
        let err = GenerationError::from_upstream("OpenAI API Error 503: model overloaded");
        assert!(matches!(err, GenerationError::ModelOverloaded));
    }

    #[test]
    fn upstream_rate_limit_is_rewritten() {
        let err = GenerationError::from_upstream("429 Too Many Requests: rate limit exceeded");
        assert!(matches!(err, GenerationError::RateLimited));
    }

    #[test]
    fn unknown_upstream_keeps_original_message() {
        let err = GenerationError::from_upstream("connection reset by peer");
        assert_eq!(
            err.to_string(),
            "Course generation failed: connection reset by peer"
        );
    }
}
