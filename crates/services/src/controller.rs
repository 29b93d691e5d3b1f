//! Learner-facing orchestration of a course.
//!
//! Every mutating operation follows the same loop: check enrollment and the
//! unlock policy, score or grade, merge the result into the progress store,
//! re-read the record, settle lesson completion, and hand back a fresh view.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use learn_core::completion::{Stage, StageStatus, is_lesson_complete, stage_statuses};
use learn_core::model::{
    Course, CourseId, Enrollment, LearnerId, Lesson, LessonId, LessonProgress, ModuleId,
    ProgressSnapshot, ProgressUpdate, Rating, RatingSummary, Score, ScoreThresholds, ScoreTier,
};
use learn_core::quiz::{QuizError, QuizResult, QuizSession, QuizStep};
use learn_core::stats::CourseStats;
use learn_core::unlock::{is_course_completed, is_lesson_unlocked};
use storage::repository::{CourseRepository, EnrollmentRepository, RatingRepository};

use crate::Clock;
use crate::error::ProgressionError;
use crate::evaluator::{AssignmentEvaluator, Evaluation};
use crate::progress_store::ProgressStore;

//
// ─── VIEW MODEL ────────────────────────────────────────────────────────────────
//

/// Everything a renderer needs to draw one lesson entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonView {
    pub lesson_id: LessonId,
    pub module_id: ModuleId,
    pub topic: String,
    pub unlocked: bool,
    pub introduction_done: bool,
    pub quiz_best_score: Option<Score>,
    pub assignment_best_score: Option<Score>,
    pub lesson_completed: bool,
    pub stages: Vec<StageStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseView {
    pub course_id: CourseId,
    pub name: String,
    pub enrolled: bool,
    pub completed: bool,
    /// First unlocked lesson that is not yet completed.
    pub current_lesson: Option<LessonId>,
    /// Visible lessons in course order.
    pub lessons: Vec<LessonView>,
}

impl CourseView {
    #[must_use]
    pub fn lesson(&self, id: LessonId) -> Option<&LessonView> {
        self.lessons.iter().find(|l| l.lesson_id == id)
    }
}

/// Outcome of `advance_quiz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizAdvance {
    /// Moved to the question at `index`; nothing was persisted.
    Next { index: usize },
    /// The attempt finished and its score was merged into the record.
    Completed {
        result: QuizResult,
        best_score: Option<Score>,
        lesson: LessonView,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentOutcome {
    pub evaluation: Evaluation,
    pub best_score: Option<Score>,
    pub passed: bool,
    pub tier: ScoreTier,
    pub lesson: LessonView,
    /// Next visible lesson, when this submission completed the current one.
    pub next_lesson: Option<LessonId>,
}

//
// ─── IN-FLIGHT GUARD ───────────────────────────────────────────────────────────
//

type InFlightKey = (LearnerId, LessonId, Stage);

/// Releases its key from the in-flight set on drop, success or failure.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<InFlightKey>>>,
    key: InFlightKey,
}

impl InFlightGuard {
    fn acquire(
        set: &Arc<Mutex<HashSet<InFlightKey>>>,
        key: InFlightKey,
    ) -> Result<Self, ProgressionError> {
        let mut guard = set.lock().unwrap_or_else(PoisonError::into_inner);
        if !guard.insert(key) {
            return Err(ProgressionError::StageInFlight {
                lesson: key.1,
                stage: key.2,
            });
        }
        Ok(Self {
            set: Arc::clone(set),
            key,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Drives a learner through a course.
#[derive(Clone)]
pub struct CourseProgressionController {
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    ratings: Arc<dyn RatingRepository>,
    progress: ProgressStore,
    evaluator: Arc<dyn AssignmentEvaluator>,
    thresholds: ScoreThresholds,
    clock: Clock,
    in_flight: Arc<Mutex<HashSet<InFlightKey>>>,
}

impl CourseProgressionController {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        ratings: Arc<dyn RatingRepository>,
        progress: ProgressStore,
        evaluator: Arc<dyn AssignmentEvaluator>,
    ) -> Self {
        Self {
            courses,
            enrollments,
            ratings,
            progress,
            evaluator,
            thresholds: ScoreThresholds::default(),
            clock,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: ScoreThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub fn thresholds(&self) -> ScoreThresholds {
        self.thresholds
    }

    /// Enroll the learner. Enrolling again is harmless.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Storage` if the course does not exist or
    /// the enrollment cannot be stored.
    pub async fn enroll(
        &self,
        learner: LearnerId,
        course_id: CourseId,
    ) -> Result<CourseView, ProgressionError> {
        let course = self.courses.get_course(course_id).await?;
        self.enrollments
            .enroll(&Enrollment::new(learner, course_id, self.clock.now()))
            .await?;
        tracing::info!(learner = %learner, course_id = %course_id, "enrolled");
        let snapshot = self.progress.snapshot(learner, course_id).await?;
        Ok(self.build_course_view(&course, true, &snapshot))
    }

    /// Current state of every visible lesson. Everything is locked when the
    /// learner is not enrolled.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Storage` if the course or progress cannot
    /// be read.
    pub async fn course_view(
        &self,
        learner: LearnerId,
        course_id: CourseId,
    ) -> Result<CourseView, ProgressionError> {
        let course = self.courses.get_course(course_id).await?;
        let enrolled = self.enrollments.is_enrolled(learner, course_id).await?;
        let snapshot = if enrolled {
            self.progress.snapshot(learner, course_id).await?
        } else {
            ProgressSnapshot::new()
        };
        Ok(self.build_course_view(&course, enrolled, &snapshot))
    }

    /// Navigate to a lesson. Never unlocks anything; a lesson without any
    /// stage is completed by opening it.
    ///
    /// # Errors
    ///
    /// Returns `Locked`, `NotEnrolled` or `UnknownLesson` when navigation is
    /// refused, or a storage error.
    pub async fn open_lesson(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<LessonView, ProgressionError> {
        let course = self.load_unlocked(learner, course_id, lesson_id).await?;
        let (module_id, lesson) = lesson_of(&course, lesson_id)?;

        let record = if lesson.has_introduction() || lesson.has_quiz() || lesson.has_assignment()
        {
            self.progress.get(learner, course_id, lesson_id).await?
        } else {
            Some(
                self.progress
                    .upsert(learner, course_id, lesson_id, &ProgressUpdate::completed())
                    .await?,
            )
        };
        tracing::debug!(learner = %learner, lesson_id = %lesson_id, "lesson opened");
        Ok(self.build_lesson_view(module_id, lesson, true, record.as_ref()))
    }

    /// Mark the introduction as viewed.
    ///
    /// # Errors
    ///
    /// Returns `StageAbsent` if the lesson has no introduction, or any error
    /// `open_lesson` can return.
    pub async fn view_introduction(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<LessonView, ProgressionError> {
        let course = self.load_unlocked(learner, course_id, lesson_id).await?;
        let (module_id, lesson) = lesson_of(&course, lesson_id)?;
        if !lesson.has_introduction() {
            return Err(ProgressionError::StageAbsent {
                lesson: lesson_id,
                stage: Stage::Introduction,
            });
        }
        self.progress
            .upsert(learner, course_id, lesson_id, &ProgressUpdate::introduction_viewed())
            .await?;
        let record = self.settle_completion(learner, &course, lesson).await?;
        Ok(self.build_lesson_view(module_id, lesson, true, record.as_ref()))
    }

    /// Start a new quiz attempt on the first question.
    ///
    /// # Errors
    ///
    /// Returns `StageAbsent` if the lesson has no quiz, or any error
    /// `open_lesson` can return.
    pub async fn start_quiz(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<QuizSession, ProgressionError> {
        let course = self.load_unlocked(learner, course_id, lesson_id).await?;
        let (_, lesson) = lesson_of(&course, lesson_id)?;
        if !lesson.has_quiz() {
            return Err(ProgressionError::StageAbsent {
                lesson: lesson_id,
                stage: Stage::Quiz,
            });
        }
        Ok(QuizSession::start(lesson)?)
    }

    /// Score the selected answer and move on. The final step persists the
    /// attempt's score as a best-of merge.
    ///
    /// If persisting fails because the session expired, the attempt is
    /// discarded and the session is returned to `NotStarted`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressionError::Quiz` for local quiz rule violations, or
    /// any error `record_quiz_result` can return.
    pub async fn advance_quiz(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        session: &mut QuizSession,
    ) -> Result<QuizAdvance, ProgressionError> {
        match session.advance()? {
            QuizStep::Next { index } => Ok(QuizAdvance::Next { index }),
            QuizStep::Completed(_) => {
                match self.record_quiz_result(learner, course_id, session).await {
                    Err(err) if err.is_unauthenticated() => {
                        tracing::warn!(lesson_id = %session.lesson_id(), "quiz attempt discarded");
                        session.restart();
                        Err(err)
                    }
                    other => other,
                }
            }
        }
    }

    /// Persist a completed attempt. Useful to retry after a transient failure
    /// in `advance_quiz`.
    ///
    /// # Errors
    ///
    /// Returns `Quiz(NotStarted)` if the session has no result, `StageInFlight`
    /// if the same result is already being saved, or enrollment, unlock and
    /// storage errors.
    pub async fn record_quiz_result(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        session: &QuizSession,
    ) -> Result<QuizAdvance, ProgressionError> {
        let result = session.result().ok_or(QuizError::NotStarted)?;
        let lesson_id = result.lesson_id;
        let _guard = InFlightGuard::acquire(&self.in_flight, (learner, lesson_id, Stage::Quiz))?;

        let course = self.load_unlocked(learner, course_id, lesson_id).await?;
        let (module_id, lesson) = lesson_of(&course, lesson_id)?;
        self.progress
            .upsert(learner, course_id, lesson_id, &ProgressUpdate::quiz(result.score))
            .await?;
        let record = self.settle_completion(learner, &course, lesson).await?;
        tracing::info!(
            learner = %learner,
            lesson_id = %lesson_id,
            score = result.score.value(),
            "quiz completed"
        );

        Ok(QuizAdvance::Completed {
            result,
            best_score: record.as_ref().and_then(|r| r.quiz_score),
            lesson: self.build_lesson_view(module_id, lesson, true, record.as_ref()),
        })
    }

    /// Send code to the grader and merge the score as a best-of.
    ///
    /// A second submission for the same lesson while one is in flight is
    /// refused with `StageInFlight`.
    ///
    /// # Errors
    ///
    /// Returns `EmptySubmission`, `StageAbsent`, `StageInFlight`, grader
    /// errors, or any error `open_lesson` can return.
    pub async fn submit_assignment(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
        code: &str,
    ) -> Result<AssignmentOutcome, ProgressionError> {
        if code.trim().is_empty() {
            return Err(ProgressionError::EmptySubmission);
        }
        let _guard =
            InFlightGuard::acquire(&self.in_flight, (learner, lesson_id, Stage::Assignment))?;

        let course = self.load_unlocked(learner, course_id, lesson_id).await?;
        let (module_id, lesson) = lesson_of(&course, lesson_id)?;
        if !lesson.has_assignment() {
            return Err(ProgressionError::StageAbsent {
                lesson: lesson_id,
                stage: Stage::Assignment,
            });
        }

        let evaluation = self.evaluator.evaluate(lesson_id, code).await?;
        let score = evaluation.assignment_score;
        self.progress
            .upsert(learner, course_id, lesson_id, &ProgressUpdate::assignment(score))
            .await?;
        let record = self.settle_completion(learner, &course, lesson).await?;

        let completed = record.as_ref().is_some_and(|r| r.lesson_completed);
        let next_lesson = if completed {
            course.next_lesson(lesson_id).map(Lesson::id)
        } else {
            None
        };
        tracing::info!(
            learner = %learner,
            lesson_id = %lesson_id,
            score = score.value(),
            completed,
            "assignment graded"
        );

        Ok(AssignmentOutcome {
            passed: self.thresholds.passes(score),
            tier: self.thresholds.tier(score),
            best_score: record.as_ref().and_then(|r| r.assignment_score),
            lesson: self.build_lesson_view(module_id, lesson, true, record.as_ref()),
            next_lesson,
            evaluation,
        })
    }

    /// Aggregate progress numbers for the stats dashboard.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled` or a storage error.
    pub async fn course_stats(
        &self,
        learner: LearnerId,
        course_id: CourseId,
    ) -> Result<CourseStats, ProgressionError> {
        let course = self.courses.get_course(course_id).await?;
        self.ensure_enrolled(learner, course_id).await?;
        let snapshot = self.progress.snapshot(learner, course_id).await?;
        Ok(CourseStats::compute(&course, &snapshot))
    }

    /// Rate the course. Rating again replaces the learner's earlier rating.
    /// Returns the updated course rating.
    ///
    /// # Errors
    ///
    /// Returns `NotEnrolled` or a storage error.
    pub async fn rate_course(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        rating: Rating,
    ) -> Result<RatingSummary, ProgressionError> {
        self.courses.get_course(course_id).await?;
        self.ensure_enrolled(learner, course_id).await?;
        self.ratings
            .rate_course(learner, course_id, rating, self.clock.now())
            .await?;
        tracing::info!(learner = %learner, course_id = %course_id, %rating, "course rated");
        self.course_rating(course_id).await
    }

    /// # Errors
    ///
    /// Returns a storage error if the rating cannot be read.
    pub async fn course_rating(
        &self,
        course_id: CourseId,
    ) -> Result<RatingSummary, ProgressionError> {
        Ok(self.ratings.rating_summary(course_id).await?)
    }

    async fn ensure_enrolled(
        &self,
        learner: LearnerId,
        course_id: CourseId,
    ) -> Result<(), ProgressionError> {
        if self.enrollments.is_enrolled(learner, course_id).await? {
            Ok(())
        } else {
            Err(ProgressionError::NotEnrolled(course_id))
        }
    }

    /// Load the course and check enrollment and the unlock policy for
    /// `lesson_id`.
    async fn load_unlocked(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Course, ProgressionError> {
        let course = self.courses.get_course(course_id).await?;
        lesson_of(&course, lesson_id)?;
        self.ensure_enrolled(learner, course_id).await?;
        let snapshot = self.progress.snapshot(learner, course_id).await?;
        if !is_lesson_unlocked(&course, &snapshot, lesson_id) {
            tracing::debug!(learner = %learner, lesson_id = %lesson_id, "lesson locked");
            return Err(ProgressionError::Locked(lesson_id));
        }
        Ok(course)
    }

    /// Re-read the record and mark the lesson completed once every present
    /// stage is passed. Returns the final record.
    async fn settle_completion(
        &self,
        learner: LearnerId,
        course: &Course,
        lesson: &Lesson,
    ) -> Result<Option<LessonProgress>, ProgressionError> {
        let record = self.progress.get(learner, course.id(), lesson.id()).await?;
        let already = record.as_ref().is_some_and(|r| r.lesson_completed);
        if already || !is_lesson_complete(lesson, record.as_ref(), &self.thresholds) {
            return Ok(record);
        }
        let updated = self
            .progress
            .upsert(learner, course.id(), lesson.id(), &ProgressUpdate::completed())
            .await?;
        tracing::info!(learner = %learner, lesson_id = %lesson.id(), "lesson completed");
        Ok(Some(updated))
    }

    fn build_course_view(
        &self,
        course: &Course,
        enrolled: bool,
        snapshot: &ProgressSnapshot,
    ) -> CourseView {
        let mut lessons = Vec::new();
        for module in course.visible_modules() {
            for lesson in module.lessons() {
                let unlocked = enrolled && is_lesson_unlocked(course, snapshot, lesson.id());
                lessons.push(self.build_lesson_view(
                    module.id(),
                    lesson,
                    unlocked,
                    snapshot.get(lesson.id()),
                ));
            }
        }
        let current_lesson = lessons
            .iter()
            .find(|l| l.unlocked && !l.lesson_completed)
            .map(|l| l.lesson_id);
        CourseView {
            course_id: course.id(),
            name: course.name().to_owned(),
            enrolled,
            completed: enrolled && is_course_completed(course, snapshot),
            current_lesson,
            lessons,
        }
    }

    fn build_lesson_view(
        &self,
        module_id: ModuleId,
        lesson: &Lesson,
        unlocked: bool,
        record: Option<&LessonProgress>,
    ) -> LessonView {
        LessonView {
            lesson_id: lesson.id(),
            module_id,
            topic: lesson.topic().to_owned(),
            unlocked,
            introduction_done: record.is_some_and(|r| r.introduction_completed),
            quiz_best_score: record.and_then(|r| r.quiz_score),
            assignment_best_score: record.and_then(|r| r.assignment_score),
            lesson_completed: record.is_some_and(|r| r.lesson_completed),
            stages: stage_statuses(lesson, record, &self.thresholds),
        }
    }
}

/// The lesson and the id of the module holding it.
fn lesson_of(course: &Course, lesson_id: LessonId) -> Result<(ModuleId, &Lesson), ProgressionError> {
    course
        .modules()
        .iter()
        .find_map(|m| {
            m.lessons()
                .iter()
                .find(|l| l.id() == lesson_id)
                .map(|l| (m.id(), l))
        })
        .ok_or(ProgressionError::UnknownLesson(lesson_id))
}
