use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::state::room::RoomError;

/// Errors that can occur in service layer operations.
///
/// Every variant is local to the room or connection that caused it; none of them affects
/// other rooms.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The question store has nothing for the request (after dropping the difficulty
    /// filter), or is unreachable.
    #[error("no questions available for subject `{subject_id}` and type `{type_id}`")]
    NoQuestionsAvailable { subject_id: String, type_id: String },
    /// Event not meaningful in the room's current phase.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    /// Room code has no live room.
    #[error("unknown room `{0}`")]
    UnknownRoom(String),
    /// Sender has not joined the room it addressed.
    #[error("not a member: {0}")]
    NotMember(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The question store did not answer in time.
    #[error("operation timed out")]
    Timeout,
}

/// Stable machine-readable error codes sent over the WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NoQuestionsAvailable,
    InvalidTransition,
    UnknownRoom,
    NotMember,
    Unauthorized,
    InvalidInput,
    NotFound,
    Timeout,
}

impl ServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::NoQuestionsAvailable { .. } => ErrorCode::NoQuestionsAvailable,
            ServiceError::InvalidTransition(_) => ErrorCode::InvalidTransition,
            ServiceError::UnknownRoom(_) => ErrorCode::UnknownRoom,
            ServiceError::NotMember(_) => ErrorCode::NotMember,
            ServiceError::Unauthorized(_) => ErrorCode::Unauthorized,
            ServiceError::InvalidInput(_) => ErrorCode::InvalidInput,
            ServiceError::NotFound(_) => ErrorCode::NotFound,
            ServiceError::Timeout => ErrorCode::Timeout,
        }
    }
}

impl From<RoomError> for ServiceError {
    fn from(err: RoomError) -> Self {
        match err {
            RoomError::InvalidTransition(_)
            | RoomError::WrongPhase { .. }
            | RoomError::LoadPending
            | RoomError::StaleLoad => ServiceError::InvalidTransition(err.to_string()),
            RoomError::NotMember(_) => ServiceError::NotMember(err.to_string()),
            RoomError::InvalidCode { .. }
            | RoomError::NotEnoughTeams { .. }
            | RoomError::DuplicateTeamName(_)
            | RoomError::UnknownTeam(_)
            | RoomError::UnknownOption(_) => ServiceError::InvalidInput(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NoQuestionsAvailable { .. } | ServiceError::UnknownRoom(_) => {
                AppError::NotFound(err.to_string())
            }
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::InvalidTransition(message) => AppError::Conflict(message),
            ServiceError::NotMember(message) | ServiceError::Unauthorized(message) => {
                AppError::Unauthorized(message)
            }
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
