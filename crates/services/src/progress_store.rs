use std::sync::Arc;

use learn_core::model::{
    CourseId, LearnerId, LessonId, LessonProgress, ProgressSnapshot, ProgressUpdate,
};
use storage::repository::{ProgressRepository, StorageError};

use crate::Clock;

/// Per-lesson progress records for enrolled learners.
///
/// Writes merge into the stored record, so flags never clear and scores never
/// drop. A write is visible to the next read of the same learner.
#[derive(Clone)]
pub struct ProgressStore {
    clock: Clock,
    repo: Arc<dyn ProgressRepository>,
}

impl ProgressStore {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn ProgressRepository>) -> Self {
        Self { clock, repo }
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub async fn get(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        self.repo.get_progress(learner, course_id, lesson_id).await
    }

    /// Merge `update` into the learner's record for `lesson_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Forbidden` if the learner is not enrolled in
    /// the course, or another `StorageError` if the record cannot be written.
    pub async fn upsert(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
        update: &ProgressUpdate,
    ) -> Result<LessonProgress, StorageError> {
        self.repo
            .upsert_progress(learner, course_id, lesson_id, update, self.clock.now())
            .await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub async fn all_for_course(
        &self,
        learner: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        self.repo.list_progress(learner, course_id).await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub async fn snapshot(
        &self,
        learner: LearnerId,
        course_id: CourseId,
    ) -> Result<ProgressSnapshot, StorageError> {
        Ok(self
            .all_for_course(learner, course_id)
            .await?
            .into_iter()
            .collect())
    }
}
