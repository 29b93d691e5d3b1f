use learn_core::model::{
    Course, CourseId, LearnerId, LessonId, LessonProgress, Rating, Score,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn course_key(id: CourseId) -> Result<i64, StorageError> {
    u64_to_i64("course_id", id.value())
}

pub(crate) fn learner_key(id: LearnerId) -> Result<i64, StorageError> {
    u64_to_i64("learner_id", id.value())
}

pub(crate) fn learner_from_column(v: i64) -> Result<LearnerId, StorageError> {
    i64_to_u64("learner_id", v).map(LearnerId::new)
}

pub(crate) fn lesson_key(id: LessonId) -> Result<i64, StorageError> {
    u64_to_i64("lesson_id", id.value())
}

pub(crate) fn course_to_document(course: &Course) -> Result<String, StorageError> {
    serde_json::to_string(course).map_err(ser)
}

pub(crate) fn course_from_row(row: &SqliteRow) -> Result<Course, StorageError> {
    let document: String = row.try_get("document").map_err(ser)?;
    serde_json::from_str(&document).map_err(ser)
}

fn score_from_column(field: &'static str, v: Option<i64>) -> Result<Option<Score>, StorageError> {
    v.map(|raw| {
        let raw = u32::try_from(raw)
            .map_err(|_| StorageError::Serialization(format!("{field} out of range: {raw}")))?;
        Score::new(raw).map_err(ser)
    })
    .transpose()
}

pub(crate) fn score_to_column(score: Option<Score>) -> Option<i64> {
    score.map(|s| i64::from(s.value()))
}

pub(crate) fn rating_from_column(v: i64) -> Result<Rating, StorageError> {
    let raw = u32::try_from(v)
        .map_err(|_| StorageError::Serialization(format!("rating out of range: {v}")))?;
    Rating::new(raw).map_err(ser)
}

pub(crate) fn progress_from_row(row: &SqliteRow) -> Result<LessonProgress, StorageError> {
    Ok(LessonProgress {
        lesson_id: LessonId::new(i64_to_u64(
            "lesson_id",
            row.try_get("lesson_id").map_err(ser)?,
        )?),
        introduction_completed: row
            .try_get::<i64, _>("introduction_completed")
            .map_err(ser)?
            != 0,
        quiz_score: score_from_column("quiz_score", row.try_get("quiz_score").map_err(ser)?)?,
        assignment_score: score_from_column(
            "assignment_score",
            row.try_get("assignment_score").map_err(ser)?,
        )?,
        lesson_completed: row.try_get::<i64, _>("lesson_completed").map_err(ser)? != 0,
        updated_at: Some(row.try_get("updated_at").map_err(ser)?),
    })
}
