use chrono::{DateTime, Utc};
use learn_core::model::{Course, CourseId};

use super::SqliteRepository;
use super::mapping::{conn, course_from_row, course_key, course_to_document};
use crate::repository::{CourseRepository, StorageError};

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn get_course(&self, id: CourseId) -> Result<Course, StorageError> {
        let row = sqlx::query("SELECT document FROM courses WHERE id = ?1")
            .bind(course_key(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        match row {
            Some(row) => course_from_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn upsert_course(&self, course: &Course, at: DateTime<Utc>) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO courses (id, name, document, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                document = excluded.document,
                updated_at = excluded.updated_at
            ",
        )
        .bind(course_key(course.id())?)
        .bind(course.name())
        .bind(course_to_document(course)?)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        tracing::debug!(course_id = %course.id(), "stored course");
        Ok(())
    }
}
