use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::state::vote::VoteError;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Invoker is neither the track sender, an elevated role holder nor an administrator.
    #[error("you are not allowed to control this track")]
    NotAuthorized,
    /// The command needs a loaded track and none is playing.
    #[error("no track is currently playing")]
    NoActiveTrack,
    /// The command needs pending tracks and the queue is empty.
    #[error("the queue is empty")]
    EmptyQueue,
    /// Numeric argument outside of its accepted bounds.
    #[error("value {value} is out of range (expected {min}..={max})")]
    OutOfRange { value: i64, min: i64, max: i64 },
    /// The participant already voted in the active vote.
    #[error("you have already voted")]
    DuplicateVote,
    /// No playback session exists for the room.
    #[error("no playback session exists for this room")]
    SessionNotFound,
    /// Resume requested while nothing is paused.
    #[error("the current track is not paused")]
    TrackNotPaused,
    /// Pause requested while the track is already paused.
    #[error("the current track is already paused")]
    TrackAlreadyPaused,
    /// A vote is already collecting confirmations in this room.
    #[error("another vote is already in progress")]
    VoteInProgress,
    /// Vote interaction without an active vote.
    #[error("no vote is in progress")]
    NoActiveVote,
    /// Voting has been switched off for the room.
    #[error("voting is disabled in this room")]
    VotingDisabled,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<VoteError> for ServiceError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::DuplicateVote => ServiceError::DuplicateVote,
            VoteError::Closed => ServiceError::NoActiveVote,
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
    /// Caller lacks the rights for the command.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::NotAuthorized | ServiceError::VotingDisabled => {
                AppError::Forbidden(message)
            }
            ServiceError::OutOfRange { .. } | ServiceError::InvalidInput(_) => {
                AppError::BadRequest(message)
            }
            ServiceError::SessionNotFound => AppError::NotFound(message),
            ServiceError::NoActiveTrack
            | ServiceError::EmptyQueue
            | ServiceError::DuplicateVote
            | ServiceError::TrackNotPaused
            | ServiceError::TrackAlreadyPaused
            | ServiceError::VoteInProgress
            | ServiceError::NoActiveVote => AppError::Conflict(message),
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
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
