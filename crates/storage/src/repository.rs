use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learn_core::model::{
    Course, CourseId, Enrollment, LearnerId, LessonId, LessonProgress, ProgressUpdate, Rating,
    RatingSummary,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("not authenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for course trees.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Fetch a course by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_course(&self, id: CourseId) -> Result<Course, StorageError>;

    /// Persist or replace a course tree, stamped with `at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course, at: DateTime<Utc>) -> Result<(), StorageError>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Record an enrollment. Enrolling twice keeps the first record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the enrollment cannot be stored.
    async fn enroll(&self, enrollment: &Enrollment) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be reached.
    async fn is_enrolled(&self, learner: LearnerId, course_id: CourseId)
    -> Result<bool, StorageError>;

    /// Every learner enrolled in the course, by ascending id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Forbidden` if the backend does not expose other
    /// learners, or another storage error.
    async fn list_learners(&self, course_id: CourseId) -> Result<Vec<LearnerId>, StorageError>;
}

/// Per-lesson progress records, keyed by learner, course and lesson.
///
/// `upsert_progress` merges: flags never go back to false and scores never
/// decrease, whatever the update says. Records only exist for enrolled
/// learners, so writing for anyone else fails with `StorageError::Forbidden`.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get_progress(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError>;

    /// Merge `update` into the stored record, creating it if needed, and
    /// return the merged record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Forbidden` if the learner is not enrolled in
    /// the course, or another storage error.
    async fn upsert_progress(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
        update: &ProgressUpdate,
        at: DateTime<Utc>,
    ) -> Result<LessonProgress, StorageError>;

    /// Every record the learner has for the course, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_progress(
        &self,
        learner: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError>;

    /// Every record of every learner in the course, ordered by learner then
    /// lesson id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Forbidden` if the backend does not expose other
    /// learners, or another storage error.
    async fn list_course_progress(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<(LearnerId, LessonProgress)>, StorageError>;
}

/// One rating per enrolled learner and course. Rating again replaces the
/// earlier rating.
#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Forbidden` if the learner is not enrolled in
    /// the course, or another storage error.
    async fn rate_course(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        rating: Rating,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn rating_summary(&self, course_id: CourseId) -> Result<RatingSummary, StorageError>;
}

type ProgressKey = (LearnerId, CourseId, LessonId);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    enrollments: Arc<Mutex<HashMap<(LearnerId, CourseId), Enrollment>>>,
    progress: Arc<Mutex<HashMap<ProgressKey, LessonProgress>>>,
    ratings: Arc<Mutex<HashMap<(LearnerId, CourseId), Rating>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_enrolled(&self, learner: LearnerId, course_id: CourseId) -> Result<(), StorageError> {
        let guard = self.enrollments.lock().map_err(poisoned)?;
        if guard.contains_key(&(learner, course_id)) {
            Ok(())
        } else {
            Err(StorageError::Forbidden)
        }
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn get_course(&self, id: CourseId) -> Result<Course, StorageError> {
        let guard = self.courses.lock().map_err(poisoned)?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn upsert_course(&self, course: &Course, _at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut guard = self.courses.lock().map_err(poisoned)?;
        guard.insert(course.id(), course.clone());
        Ok(())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn enroll(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let mut guard = self.enrollments.lock().map_err(poisoned)?;
        guard
            .entry((enrollment.learner(), enrollment.course_id()))
            .or_insert_with(|| enrollment.clone());
        Ok(())
    }

    async fn is_enrolled(
        &self,
        learner: LearnerId,
        course_id: CourseId,
    ) -> Result<bool, StorageError> {
        let guard = self.enrollments.lock().map_err(poisoned)?;
        Ok(guard.contains_key(&(learner, course_id)))
    }

    async fn list_learners(&self, course_id: CourseId) -> Result<Vec<LearnerId>, StorageError> {
        let guard = self.enrollments.lock().map_err(poisoned)?;
        let mut learners: Vec<_> = guard
            .keys()
            .filter(|(_, c)| *c == course_id)
            .map(|(l, _)| *l)
            .collect();
        learners.sort_unstable();
        Ok(learners)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(&(learner, course_id, lesson_id)).cloned())
    }

    async fn upsert_progress(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
        update: &ProgressUpdate,
        at: DateTime<Utc>,
    ) -> Result<LessonProgress, StorageError> {
        self.ensure_enrolled(learner, course_id)?;
        let mut guard = self.progress.lock().map_err(poisoned)?;
        let record = guard
            .entry((learner, course_id, lesson_id))
            .or_insert_with(|| LessonProgress::empty(lesson_id));
        record.merge(update, at);
        Ok(record.clone())
    }

    async fn list_progress(
        &self,
        learner: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard
            .iter()
            .filter(|((l, c, _), _)| *l == learner && *c == course_id)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn list_course_progress(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<(LearnerId, LessonProgress)>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        let mut records: Vec<_> = guard
            .iter()
            .filter(|((_, c, _), _)| *c == course_id)
            .map(|((l, _, _), p)| (*l, p.clone()))
            .collect();
        records.sort_by_key(|(l, p)| (*l, p.lesson_id));
        Ok(records)
    }
}

#[async_trait]
impl RatingRepository for InMemoryRepository {
    async fn rate_course(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        rating: Rating,
        _at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.ensure_enrolled(learner, course_id)?;
        let mut guard = self.ratings.lock().map_err(poisoned)?;
        guard.insert((learner, course_id), rating);
        Ok(())
    }

    async fn rating_summary(&self, course_id: CourseId) -> Result<RatingSummary, StorageError> {
        let guard = self.ratings.lock().map_err(poisoned)?;
        Ok(RatingSummary::from_ratings(
            guard
                .iter()
                .filter(|((_, c), _)| *c == course_id)
                .map(|(_, r)| *r),
        ))
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub ratings: Arc<dyn RatingRepository>,
}

impl Storage {
    /// Wire every repository to one backend that implements all of them.
    #[must_use]
    pub fn from_backend<R>(backend: R) -> Self
    where
        R: CourseRepository
            + EnrollmentRepository
            + ProgressRepository
            + RatingRepository
            + Clone
            + 'static,
    {
        Self {
            courses: Arc::new(backend.clone()),
            enrollments: Arc::new(backend.clone()),
            progress: Arc::new(backend.clone()),
            ratings: Arc::new(backend),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(InMemoryRepository::new())
    }
}
