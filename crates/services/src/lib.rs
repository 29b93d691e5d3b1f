#![forbid(unsafe_code)]

pub mod api;
pub mod app_services;
pub mod auth;
pub mod config;
pub mod controller;
pub mod dashboard;
pub mod error;
pub mod evaluator;
pub mod progress_store;

pub use learn_core::Clock;

pub use app_services::AppServices;
pub use auth::{AuthClient, AuthSession, SessionHandle, SessionState};
pub use config::{ApiConfig, GraderConfig};
pub use controller::{
    AssignmentOutcome, CourseProgressionController, CourseView, LessonView, QuizAdvance,
};
pub use dashboard::{CourseDashboards, RemoteDashboards, StoredDashboards};
pub use error::{
    ApiError, AppServicesError, ConfigError, ErrorKind, EvaluatorError, ProgressionError,
};
pub use evaluator::{AssignmentEvaluator, Evaluation, HttpAssignmentEvaluator};
pub use progress_store::ProgressStore;
