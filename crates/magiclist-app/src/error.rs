use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    DatabaseError(#[from] magiclist_dal::Error),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Suggestions are not configured")]
    SuggestionsDisabled,

    #[error("Suggestion service failed: {0}")]
    SuggestionFailed(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detalhes: Option<Value>,
}

pub fn error_response(status: StatusCode, error: impl Into<String>, detalhes: Option<Value>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
            detalhes,
        }),
    )
        .into_response()
}

const INTERNAL_MESSAGE: &str = "Internal server error";

fn internal(cause: &dyn std::fmt::Display) -> (StatusCode, String, Option<Value>) {
    error!("Internal error: {cause}");
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string(), None)
}

fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, String, Option<Value>) {
    match err {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "Record not found".to_string(), None),
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => (
            StatusCode::CONFLICT,
            format!("Conflict: {}", db_err.message()),
            None,
        ),
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => (
            StatusCode::NOT_FOUND,
            "Referenced record not found".to_string(),
            None,
        ),
        sqlx::Error::Database(db_err) if db_err.is_check_violation() => (
            StatusCode::BAD_REQUEST,
            format!("Invalid value: {}", db_err.message()),
            None,
        ),
        other => internal(other),
    }
}

fn classify_dal_error(err: &magiclist_dal::Error) -> (StatusCode, String, Option<Value>) {
    use magiclist_dal::Error;
    match err {
        Error::DatabaseError(e) => classify_sqlx_error(e),
        Error::RecordNotFound(_) => (StatusCode::NOT_FOUND, err.to_string(), None),
        Error::InvalidReferences { entity, ids } => (
            StatusCode::NOT_FOUND,
            err.to_string(),
            Some(json!({ "entity": entity, "ids": ids })),
        ),
        Error::InvalidOrdinal(_) | Error::InvalidOrderByField(_) => {
            (StatusCode::BAD_REQUEST, err.to_string(), None)
        }
        Error::Conflict(_) => (StatusCode::CONFLICT, err.to_string(), None),
        Error::MigrationError(e) => internal(e),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, detalhes) = match &self {
            ApiError::DatabaseError(e) => classify_dal_error(e),
            ApiError::InvalidQuery(_) => (StatusCode::BAD_REQUEST, self.to_string(), None),
            ApiError::SuggestionsDisabled => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string(), None)
            }
            ApiError::SuggestionFailed(cause) => {
                error!("Suggestion upstream failure: {cause}");
                (StatusCode::BAD_GATEWAY, self.to_string(), None)
            }
        };
        error_response(status, message, detalhes)
    }
}
