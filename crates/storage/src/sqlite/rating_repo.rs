use chrono::{DateTime, Utc};
use learn_core::model::{CourseId, LearnerId, Rating, RatingSummary};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, course_key, learner_key, rating_from_column, ser};
use crate::repository::{RatingRepository, StorageError};

#[async_trait::async_trait]
impl RatingRepository for SqliteRepository {
    async fn rate_course(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        rating: Rating,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r"
            INSERT INTO course_ratings (learner_id, course_id, score, rated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(learner_id, course_id) DO UPDATE SET
                score = excluded.score,
                rated_at = excluded.rated_at
            ",
        )
        .bind(learner_key(learner)?)
        .bind(course_key(course_id)?)
        .bind(i64::from(rating.value()))
        .bind(at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::debug!(learner = %learner, course_id = %course_id, %rating, "rated course");
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                Err(StorageError::Forbidden)
            }
            Err(e) => Err(conn(e)),
        }
    }

    async fn rating_summary(&self, course_id: CourseId) -> Result<RatingSummary, StorageError> {
        let rows = sqlx::query("SELECT score FROM course_ratings WHERE course_id = ?1")
            .bind(course_key(course_id)?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let ratings = rows
            .iter()
            .map(|row| rating_from_column(row.try_get("score").map_err(ser)?))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RatingSummary::from_ratings(ratings))
    }
}
