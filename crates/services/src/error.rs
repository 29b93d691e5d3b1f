//! Shared error types for the services crate.

use thiserror::Error;

use learn_core::completion::Stage;
use learn_core::model::{CourseId, LessonId, ScoreError};
use learn_core::quiz::QuizError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Coarse classification every failure maps into, so callers can decide
/// between re-authenticating, showing a message, or offering a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credentials missing or expired. The session has been dropped.
    Unauthenticated,
    Forbidden,
    NotFound,
    /// Network failure or unexpected status. Retrying may succeed.
    Transient,
    /// The request itself was rejected by a local check or a bad payload.
    Validation,
}

/// Errors from the remote course API.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    /// Map a non-success status. Returns `None` for 2xx.
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode) -> Option<Self> {
        if status.is_success() {
            return None;
        }
        Some(match status.as_u16() {
            401 => Self::Unauthenticated,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            _ => Self::HttpStatus(status),
        })
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::NotFound => ErrorKind::NotFound,
            Self::InvalidPayload(_) | Self::Url(_) => ErrorKind::Validation,
            Self::HttpStatus(_) | Self::Http(_) => ErrorKind::Transient,
        }
    }
}

impl From<ApiError> for StorageError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthenticated => StorageError::Unauthenticated,
            ApiError::Forbidden => StorageError::Forbidden,
            ApiError::NotFound => StorageError::NotFound,
            ApiError::InvalidPayload(msg) => StorageError::Serialization(msg),
            other => StorageError::Connection(other.to_string()),
        }
    }
}

/// Errors emitted by an `AssignmentEvaluator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvaluatorError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("grader unavailable: {0}")]
    Unavailable(String),
}

impl EvaluatorError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api(err) => err.kind(),
            Self::Unavailable(_) => ErrorKind::Transient,
        }
    }
}

/// Errors emitted by `CourseProgressionController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressionError {
    #[error("learner is not enrolled in course {0}")]
    NotEnrolled(CourseId),
    #[error("lesson {0} is locked")]
    Locked(LessonId),
    #[error("lesson {0} is not part of this course")]
    UnknownLesson(LessonId),
    #[error("lesson {lesson} has no {stage}")]
    StageAbsent { lesson: LessonId, stage: Stage },
    #[error("a {stage} submission for lesson {lesson} is already in flight")]
    StageInFlight { lesson: LessonId, stage: Stage },
    #[error("submission is empty")]
    EmptySubmission,
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ProgressionError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotEnrolled(_) | Self::Locked(_) => ErrorKind::Forbidden,
            Self::UnknownLesson(_) => ErrorKind::NotFound,
            Self::StageAbsent { .. }
            | Self::StageInFlight { .. }
            | Self::EmptySubmission
            | Self::Quiz(_) => ErrorKind::Validation,
            Self::Evaluator(err) => err.kind(),
            Self::Storage(err) => storage_kind(err),
        }
    }

    /// True when the caller should drop its session and unsaved state.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        self.kind() == ErrorKind::Unauthenticated
    }
}

fn storage_kind(err: &StorageError) -> ErrorKind {
    match err {
        StorageError::NotFound => ErrorKind::NotFound,
        StorageError::Unauthenticated => ErrorKind::Unauthenticated,
        StorageError::Forbidden => ErrorKind::Forbidden,
        StorageError::Serialization(_) => ErrorKind::Validation,
        _ => ErrorKind::Transient,
    }
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} is not a valid url: {source}")]
    InvalidUrl {
        var: &'static str,
        source: url::ParseError,
    },
    #[error("{var} must be a whole number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error(transparent)]
    Thresholds(#[from] ScoreError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
