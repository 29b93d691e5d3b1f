use chrono::{DateTime, Utc};
use learn_core::model::{CourseId, LearnerId, LessonId, LessonProgress, ProgressUpdate};

use super::SqliteRepository;
use sqlx::Row;

use super::mapping::{
    conn, course_key, learner_from_column, learner_key, lesson_key, progress_from_row, ser,
    score_to_column,
};
use crate::repository::{ProgressRepository, StorageError};

const SELECT_PROGRESS: &str = r"
    SELECT learner_id, lesson_id, introduction_completed, quiz_score, assignment_score,
           lesson_completed, updated_at
    FROM lesson_progress
";

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let sql = format!(
            "{SELECT_PROGRESS} WHERE learner_id = ?1 AND course_id = ?2 AND lesson_id = ?3"
        );
        let row = sqlx::query(&sql)
            .bind(learner_key(learner)?)
            .bind(course_key(course_id)?)
            .bind(lesson_key(lesson_id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(progress_from_row).transpose()
    }

    async fn upsert_progress(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
        update: &ProgressUpdate,
        at: DateTime<Utc>,
    ) -> Result<LessonProgress, StorageError> {
        // MAX(x, NULL) is NULL in SQLite, hence the COALESCE fallbacks.
        let result = sqlx::query(
            r"
            INSERT INTO lesson_progress (
                learner_id, course_id, lesson_id, introduction_completed,
                quiz_score, assignment_score, lesson_completed, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(learner_id, course_id, lesson_id) DO UPDATE SET
                introduction_completed =
                    (introduction_completed OR excluded.introduction_completed),
                quiz_score = COALESCE(
                    MAX(quiz_score, excluded.quiz_score), quiz_score, excluded.quiz_score
                ),
                assignment_score = COALESCE(
                    MAX(assignment_score, excluded.assignment_score),
                    assignment_score,
                    excluded.assignment_score
                ),
                lesson_completed = (lesson_completed OR excluded.lesson_completed),
                updated_at = excluded.updated_at
            ",
        )
        .bind(learner_key(learner)?)
        .bind(course_key(course_id)?)
        .bind(lesson_key(lesson_id)?)
        .bind(i64::from(update.introduction_completed.unwrap_or(false)))
        .bind(score_to_column(update.quiz_score))
        .bind(score_to_column(update.assignment_score))
        .bind(i64::from(update.lesson_completed.unwrap_or(false)))
        .bind(at)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            return match e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    Err(StorageError::Forbidden)
                }
                other => Err(conn(other)),
            };
        }

        tracing::debug!(
            learner = %learner,
            course_id = %course_id,
            lesson_id = %lesson_id,
            "merged lesson progress"
        );

        self.get_progress(learner, course_id, lesson_id)
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn list_progress(
        &self,
        learner: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let sql = format!("{SELECT_PROGRESS} WHERE learner_id = ?1 AND course_id = ?2");
        let rows = sqlx::query(&sql)
            .bind(learner_key(learner)?)
            .bind(course_key(course_id)?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(progress_from_row(&row)?);
        }
        Ok(records)
    }

    async fn list_course_progress(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<(LearnerId, LessonProgress)>, StorageError> {
        let sql = format!("{SELECT_PROGRESS} WHERE course_id = ?1 ORDER BY learner_id, lesson_id");
        let rows = sqlx::query(&sql)
            .bind(course_key(course_id)?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter()
            .map(|row| {
                let learner = learner_from_column(row.try_get("learner_id").map_err(ser)?)?;
                Ok((learner, progress_from_row(row)?))
            })
            .collect()
    }
}
