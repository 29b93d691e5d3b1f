//! JSON shapes exchanged with the course API, parsed strictly.
//!
//! Required fields must be present and well-typed. Ids may arrive as JSON
//! numbers or numeric strings. Anything else, including scores above 100 or
//! broken module/lesson ordering, is rejected as `ApiError::InvalidPayload`
//! instead of being defaulted.

use std::fmt;

use learn_core::dashboard::{LearnerRef, LearnerStats, LessonAggregate, OverviewStats};
use learn_core::model::{
    Answer, AnswerId, Course, CourseDraft, CourseId, CreatorState, LessonDraft, LessonId,
    LessonProgress, ModuleDraft, ModuleId, ProgressUpdate, QuestionDraft, QuestionId, Rating,
    RatingSummary, Score,
};
use learn_core::stats::CourseStats;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;
use crate::evaluator::Evaluation;

fn invalid(e: impl fmt::Display) -> ApiError {
    ApiError::InvalidPayload(e.to_string())
}

//
// ─── IDS ───────────────────────────────────────────────────────────────────────
//

/// An id that accepts `42` or `"42"` and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireId(pub u64);

impl<'de> Deserialize<'de> for WireId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = WireId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative integer id or a numeric string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<WireId, E> {
                Ok(WireId(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<WireId, E> {
                u64::try_from(v)
                    .map(WireId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<WireId, E> {
                v.trim()
                    .parse::<u64>()
                    .map(WireId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

fn wire_score(field: &str, raw: u32) -> Result<Score, ApiError> {
    Score::new(raw).map_err(|e| invalid(format!("{field}: {e}")))
}

fn wire_percentage(field: &str, raw: u32) -> Result<u32, ApiError> {
    wire_score(field, raw).map(Score::value)
}

fn wire_part(field: &str, part: u32, whole: u32) -> Result<u32, ApiError> {
    if part > whole {
        return Err(invalid(format!("{field}: {part} exceeds {whole}")));
    }
    Ok(part)
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub struct CourseWire {
    pub id: WireId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub creator_state: Option<String>,
    pub modules: Vec<ModuleWire>,
}

#[derive(Debug, Deserialize)]
pub struct ModuleWire {
    pub id: WireId,
    pub name: String,
    pub order: u32,
    pub is_visible: bool,
    pub lessons: Vec<LessonWire>,
}

#[derive(Debug, Deserialize)]
pub struct LessonWire {
    pub id: WireId,
    pub topic: String,
    pub order: u32,
    #[serde(default)]
    pub introduction: Option<IntroductionWire>,
    #[serde(default)]
    pub quiz: Vec<QuestionWire>,
    #[serde(default)]
    pub assignment: Option<AssignmentWire>,
}

#[derive(Debug, Deserialize)]
pub struct IntroductionWire {
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentWire {
    pub instructions: String,
}

#[derive(Debug, Deserialize)]
pub struct QuestionWire {
    pub id: WireId,
    pub question: String,
    pub answers: Vec<AnswerWire>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerWire {
    pub id: WireId,
    pub answer: String,
    pub is_correct: bool,
}

/// A course as served by the API, with its authoring state when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCourse {
    pub course: Course,
    pub creator_state: Option<CreatorState>,
}

impl TryFrom<CourseWire> for RemoteCourse {
    type Error = ApiError;

    fn try_from(wire: CourseWire) -> Result<Self, Self::Error> {
        let creator_state = wire
            .creator_state
            .as_deref()
            .map(str::parse::<CreatorState>)
            .transpose()
            .map_err(invalid)?;

        let draft = CourseDraft {
            id: CourseId::new(wire.id.0),
            name: wire.name,
            description: wire.description,
            modules: wire.modules.into_iter().map(module_draft).collect(),
        };
        let course = draft.validate().map_err(invalid)?;
        Ok(Self {
            course,
            creator_state,
        })
    }
}

fn module_draft(wire: ModuleWire) -> ModuleDraft {
    ModuleDraft {
        id: ModuleId::new(wire.id.0),
        name: wire.name,
        order: wire.order,
        is_visible: wire.is_visible,
        lessons: wire.lessons.into_iter().map(lesson_draft).collect(),
    }
}

fn lesson_draft(wire: LessonWire) -> LessonDraft {
    LessonDraft {
        id: LessonId::new(wire.id.0),
        topic: wire.topic,
        order: wire.order,
        introduction: wire.introduction.map(|i| i.description),
        quiz: wire
            .quiz
            .into_iter()
            .map(|q| QuestionDraft {
                id: QuestionId::new(q.id.0),
                prompt: q.question,
                answers: q
                    .answers
                    .into_iter()
                    .map(|a| Answer::new(AnswerId::new(a.id.0), a.answer, a.is_correct))
                    .collect(),
            })
            .collect(),
        assignment: wire.assignment.map(|a| a.instructions),
    }
}

/// Parse a course document.
///
/// # Errors
///
/// Returns `ApiError::InvalidPayload` for malformed JSON or an invalid tree.
pub fn parse_course(body: &[u8]) -> Result<RemoteCourse, ApiError> {
    let wire: CourseWire = serde_json::from_slice(body).map_err(invalid)?;
    RemoteCourse::try_from(wire)
}

#[derive(Debug, Deserialize)]
struct CourseRatingWire {
    #[serde(default)]
    rating: Option<f64>,
}

/// Read the average `rating` of a course document. A missing or null rating
/// means nobody rated the course yet.
///
/// # Errors
///
/// Returns `ApiError::InvalidPayload` for malformed JSON or an average
/// outside `0..=5`.
pub fn parse_course_rating(body: &[u8]) -> Result<RatingSummary, ApiError> {
    let wire: CourseRatingWire = serde_json::from_slice(body).map_err(invalid)?;
    match wire.rating {
        None => Ok(RatingSummary::default()),
        Some(avg) => RatingSummary::from_average(avg).map_err(invalid),
    }
}

/// Body of `POST courses/{id}/rate`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RateRequest {
    pub score: u32,
}

impl From<Rating> for RateRequest {
    fn from(rating: Rating) -> Self {
        Self {
            score: rating.value(),
        }
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub struct LessonStatWire {
    pub lesson_id: WireId,
    pub introduction_completed: bool,
    pub quiz_score: Option<u32>,
    pub assignment_score: Option<u32>,
    pub lesson_completed: bool,
}

impl TryFrom<LessonStatWire> for LessonProgress {
    type Error = ApiError;

    fn try_from(wire: LessonStatWire) -> Result<Self, Self::Error> {
        let mut progress = LessonProgress::empty(LessonId::new(wire.lesson_id.0));
        progress.introduction_completed = wire.introduction_completed;
        progress.quiz_score = wire
            .quiz_score
            .map(|s| wire_score("quiz_score", s))
            .transpose()?;
        progress.assignment_score = wire
            .assignment_score
            .map(|s| wire_score("assignment_score", s))
            .transpose()?;
        progress.lesson_completed = wire.lesson_completed;
        Ok(progress)
    }
}

/// Parse the `courses/{id}/stats` response.
///
/// # Errors
///
/// Returns `ApiError::InvalidPayload` if any entry is malformed.
pub fn parse_lesson_stats(body: &[u8]) -> Result<Vec<LessonProgress>, ApiError> {
    let wire: Vec<LessonStatWire> = serde_json::from_slice(body).map_err(invalid)?;
    wire.into_iter().map(LessonProgress::try_from).collect()
}

/// Body of `POST courses/{id}/stats`. Absent fields are omitted.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatUpdate {
    pub lesson_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introduction_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_completed: Option<bool>,
}

impl StatUpdate {
    #[must_use]
    pub fn new(lesson_id: LessonId, update: &ProgressUpdate) -> Self {
        Self {
            lesson_id: lesson_id.value(),
            introduction_completed: update.introduction_completed,
            quiz_score: update.quiz_score.map(Score::value),
            assignment_score: update.assignment_score.map(Score::value),
            lesson_completed: update.lesson_completed,
        }
    }
}

//
// ─── DASHBOARDS ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
pub struct UserProgressWire {
    pub username: String,
    pub completed_lessons: u32,
    pub lesson_count: u32,
    pub started_quizzes: u32,
    pub started_assignments: u32,
    pub quiz_score_percentage: u32,
    pub assignment_score_percentage: u32,
}

impl TryFrom<UserProgressWire> for LearnerStats {
    type Error = ApiError;

    fn try_from(wire: UserProgressWire) -> Result<Self, Self::Error> {
        if wire.username.trim().is_empty() {
            return Err(invalid("username is empty"));
        }
        let lessons = wire.lesson_count;
        Ok(LearnerStats {
            learner: LearnerRef::Username(wire.username),
            stats: CourseStats {
                lesson_count: lessons,
                completed_lessons: wire_part("completed_lessons", wire.completed_lessons, lessons)?,
                started_quizzes: wire_part("started_quizzes", wire.started_quizzes, lessons)?,
                started_assignments: wire_part(
                    "started_assignments",
                    wire.started_assignments,
                    lessons,
                )?,
                quiz_score_percentage: wire_percentage(
                    "quiz_score_percentage",
                    wire.quiz_score_percentage,
                )?,
                assignment_score_percentage: wire_percentage(
                    "assignment_score_percentage",
                    wire.assignment_score_percentage,
                )?,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct EnrolledStatsWire {
    pub course_id: WireId,
    pub course_name: String,
    pub users_progress: Vec<UserProgressWire>,
}

/// Leaderboard rows of one course from the `courses/stats/enrolled` listing.
/// A course missing from the listing has no rows.
///
/// # Errors
///
/// Returns `ApiError::InvalidPayload` if any entry is malformed.
pub fn parse_enrolled_stats(
    body: &[u8],
    course_id: CourseId,
) -> Result<Vec<LearnerStats>, ApiError> {
    let wire: Vec<EnrolledStatsWire> = serde_json::from_slice(body).map_err(invalid)?;
    wire.into_iter()
        .filter(|c| c.course_id.0 == course_id.value())
        .flat_map(|c| c.users_progress)
        .map(LearnerStats::try_from)
        .collect()
}

/// One lesson of the author view. `lesson_count` is the number of enrolled
/// learners and `completed_lessons` how many of them completed the lesson.
#[derive(Debug, Deserialize)]
pub struct LessonProgressStatsWire {
    pub lesson_id: WireId,
    pub lesson_topic: String,
    pub completed_lessons: u32,
    pub lesson_count: u32,
    pub quiz_score_percentage: u32,
    pub assignment_score_percentage: u32,
}

impl TryFrom<LessonProgressStatsWire> for LessonAggregate {
    type Error = ApiError;

    fn try_from(wire: LessonProgressStatsWire) -> Result<Self, Self::Error> {
        Ok(LessonAggregate {
            lesson_id: LessonId::new(wire.lesson_id.0),
            topic: wire.lesson_topic,
            learner_count: wire.lesson_count,
            completed_count: wire_part("completed_lessons", wire.completed_lessons, wire.lesson_count)?,
            quiz_score_percentage: wire_percentage(
                "quiz_score_percentage",
                wire.quiz_score_percentage,
            )?,
            assignment_score_percentage: wire_percentage(
                "assignment_score_percentage",
                wire.assignment_score_percentage,
            )?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CourseProgressWire {
    pub course_id: WireId,
    pub course_name: String,
    pub lesson_progress: Vec<LessonProgressStatsWire>,
}

/// Per-lesson aggregates of one course from `student-progress/{id}`.
///
/// # Errors
///
/// Returns `ApiError::InvalidPayload` if any entry is malformed.
pub fn parse_course_progress(
    body: &[u8],
    course_id: CourseId,
) -> Result<Vec<LessonAggregate>, ApiError> {
    let wire: Vec<CourseProgressWire> = serde_json::from_slice(body).map_err(invalid)?;
    wire.into_iter()
        .filter(|c| c.course_id.0 == course_id.value())
        .flat_map(|c| c.lesson_progress)
        .map(LessonAggregate::try_from)
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct OverviewWire {
    pub courses_count: u32,
    pub students_count: u32,
    pub completed_lessons: u32,
}

/// Parse the `courses/stats` response.
///
/// # Errors
///
/// Returns `ApiError::InvalidPayload` for malformed JSON.
pub fn parse_overview(body: &[u8]) -> Result<OverviewStats, ApiError> {
    let wire: OverviewWire = serde_json::from_slice(body).map_err(invalid)?;
    Ok(OverviewStats {
        courses_count: wire.courses_count,
        students_count: wire.students_count,
        completed_lessons: wire.completed_lessons,
    })
}

//
// ─── GRADING & AUTH ────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
pub struct EvaluateRequest<'a> {
    pub lesson_id: u64,
    pub user_code: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct EvaluationWire {
    pub assignment_score: u32,
    pub message: String,
}

impl TryFrom<EvaluationWire> for Evaluation {
    type Error = ApiError;

    fn try_from(wire: EvaluationWire) -> Result<Self, Self::Error> {
        Ok(Evaluation {
            assignment_score: wire_score("assignment_score", wire.assignment_score)?,
            message: wire.message,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    /// # Errors
    ///
    /// Returns `ApiError::InvalidPayload` if the access token is blank.
    pub fn validate(self) -> Result<Self, ApiError> {
        if self.access.trim().is_empty() {
            return Err(invalid("access token is empty"));
        }
        Ok(self)
    }
}
