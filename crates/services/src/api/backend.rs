use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learn_core::model::{
    Course, CourseId, Enrollment, LearnerId, LessonId, LessonProgress, ProgressUpdate, Rating,
    RatingSummary,
};
use serde_json::json;
use storage::repository::{
    CourseRepository, EnrollmentRepository, ProgressRepository, RatingRepository, Storage,
    StorageError,
};

use super::ApiClient;
use super::wire::{RateRequest, StatUpdate, parse_course, parse_course_rating, parse_lesson_stats};
use crate::error::ApiError;

/// Repository adapter over the remote course API.
///
/// The bearer token identifies the learner, so the `LearnerId` arguments of
/// the repository traits are not sent.
#[derive(Clone)]
pub struct HttpBackend {
    client: ApiClient,
}

impl HttpBackend {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn into_storage(self) -> Storage {
        Storage::from_backend(self)
    }

    async fn fetch_stats(&self, course_id: CourseId) -> Result<Vec<LessonProgress>, ApiError> {
        let body = self.client.get(&format!("courses/{course_id}/stats")).await?;
        parse_lesson_stats(&body)
    }
}

#[async_trait]
impl CourseRepository for HttpBackend {
    async fn get_course(&self, id: CourseId) -> Result<Course, StorageError> {
        let body = self.client.get(&format!("courses/{id}")).await?;
        Ok(parse_course(&body)?.course)
    }

    async fn upsert_course(&self, course: &Course, _at: DateTime<Utc>) -> Result<(), StorageError> {
        tracing::warn!(course_id = %course.id(), "course authoring is not available over the learner api");
        Err(StorageError::Forbidden)
    }
}

#[async_trait]
impl EnrollmentRepository for HttpBackend {
    async fn enroll(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let path = format!("courses/{}/enroll", enrollment.course_id());
        self.client.post(&path, &json!({})).await?;
        Ok(())
    }

    async fn is_enrolled(
        &self,
        _learner: LearnerId,
        course_id: CourseId,
    ) -> Result<bool, StorageError> {
        match self.fetch_stats(course_id).await {
            Ok(_) => Ok(true),
            Err(ApiError::NotFound) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_learners(&self, course_id: CourseId) -> Result<Vec<LearnerId>, StorageError> {
        tracing::debug!(course_id = %course_id, "learner api does not list other learners");
        Err(StorageError::Forbidden)
    }
}

#[async_trait]
impl ProgressRepository for HttpBackend {
    async fn get_progress(
        &self,
        _learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let stats = self.fetch_stats(course_id).await?;
        Ok(stats.into_iter().find(|p| p.lesson_id == lesson_id))
    }

    async fn upsert_progress(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
        update: &ProgressUpdate,
        _at: DateTime<Utc>,
    ) -> Result<LessonProgress, StorageError> {
        let body = StatUpdate::new(lesson_id, update);
        self.client
            .post(&format!("courses/{course_id}/stats"), &body)
            .await?;
        self.get_progress(learner, course_id, lesson_id)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn list_progress(
        &self,
        _learner: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        Ok(self.fetch_stats(course_id).await?)
    }

    async fn list_course_progress(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<(LearnerId, LessonProgress)>, StorageError> {
        tracing::debug!(course_id = %course_id, "learner api does not expose raw progress of others");
        Err(StorageError::Forbidden)
    }
}

#[async_trait]
impl RatingRepository for HttpBackend {
    async fn rate_course(
        &self,
        _learner: LearnerId,
        course_id: CourseId,
        rating: Rating,
        _at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.client
            .post(&format!("courses/{course_id}/rate"), &RateRequest::from(rating))
            .await?;
        Ok(())
    }

    async fn rating_summary(&self, course_id: CourseId) -> Result<RatingSummary, StorageError> {
        let body = self.client.get(&format!("courses/{course_id}")).await?;
        Ok(parse_course_rating(&body)?)
    }
}
