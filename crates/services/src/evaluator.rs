use async_trait::async_trait;
use learn_core::model::{LessonId, Score};
use url::Url;

use crate::api::ApiClient;
use crate::api::decode;
use crate::api::wire::{EvaluateRequest, EvaluationWire};
use crate::config::GraderConfig;
use crate::error::{ApiError, EvaluatorError};

/// Grader verdict for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub assignment_score: Score,
    pub message: String,
}

/// Remote grading oracle. Implementations must not persist anything; the
/// controller owns best-score reconciliation.
#[async_trait]
pub trait AssignmentEvaluator: Send + Sync {
    /// Grade `code` for the assignment of `lesson_id`.
    ///
    /// # Errors
    ///
    /// Returns `EvaluatorError` when the grader cannot be reached or replies
    /// with a malformed verdict.
    async fn evaluate(&self, lesson_id: LessonId, code: &str) -> Result<Evaluation, EvaluatorError>;
}

const EVALUATE_PATH: &str = "lessons/assignments/evaluate";

/// Grades through `POST lessons/assignments/evaluate`.
#[derive(Clone)]
pub struct HttpAssignmentEvaluator {
    client: ApiClient,
    endpoint: Option<Url>,
}

impl HttpAssignmentEvaluator {
    /// Use the course API's own grading endpoint.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            endpoint: None,
        }
    }

    /// Use the dedicated grader from `config` when one is set.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Url` if the grader url cannot be joined.
    pub fn with_config(client: ApiClient, config: &GraderConfig) -> Result<Self, ApiError> {
        let endpoint = config
            .url
            .as_ref()
            .map(|base| base.join(EVALUATE_PATH))
            .transpose()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl AssignmentEvaluator for HttpAssignmentEvaluator {
    async fn evaluate(&self, lesson_id: LessonId, code: &str) -> Result<Evaluation, EvaluatorError> {
        let request = EvaluateRequest {
            lesson_id: lesson_id.value(),
            user_code: code,
        };
        let body = match &self.endpoint {
            Some(url) => self.client.post_url(url.clone(), &request).await?,
            None => self.client.post(EVALUATE_PATH, &request).await?,
        };
        let wire: EvaluationWire = decode(&body)?;
        let evaluation = Evaluation::try_from(wire)?;
        tracing::debug!(
            lesson_id = %lesson_id,
            score = evaluation.assignment_score.value(),
            "assignment graded"
        );
        Ok(evaluation)
    }
}
