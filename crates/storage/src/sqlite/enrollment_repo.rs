use learn_core::model::{CourseId, Enrollment, LearnerId};

use super::SqliteRepository;
use sqlx::Row;

use super::mapping::{conn, course_key, learner_from_column, learner_key, ser};
use crate::repository::{EnrollmentRepository, StorageError};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn enroll(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            INSERT INTO enrollments (learner_id, course_id, enrolled_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(learner_id, course_id) DO NOTHING
            ",
        )
        .bind(learner_key(enrollment.learner())?)
        .bind(course_key(enrollment.course_id())?)
        .bind(enrollment.enrolled_at())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(StorageError::NotFound)
            }
            Err(e) => Err(conn(e)),
        }
    }

    async fn is_enrolled(
        &self,
        learner: LearnerId,
        course_id: CourseId,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM enrollments WHERE learner_id = ?1 AND course_id = ?2")
            .bind(learner_key(learner)?)
            .bind(course_key(course_id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        Ok(row.is_some())
    }

    async fn list_learners(&self, course_id: CourseId) -> Result<Vec<LearnerId>, StorageError> {
        let rows = sqlx::query(
            "SELECT learner_id FROM enrollments WHERE course_id = ?1 ORDER BY learner_id",
        )
        .bind(course_key(course_id)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| learner_from_column(row.try_get("learner_id").map_err(ser)?))
            .collect()
    }
}
