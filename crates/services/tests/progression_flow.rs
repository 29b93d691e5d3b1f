use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use learn_core::demo::demo_course;
use learn_core::model::{
    AnswerId, CourseDraft, CourseId, LearnerId, LessonDraft, LessonId, LessonProgress,
    ModuleDraft, ModuleId, ProgressUpdate, Rating, Score,
};
use learn_core::quiz::QuizSession;
use learn_core::dashboard::{LeaderboardSort, LearnerRef};
use learn_core::time::{fixed_clock, fixed_now};
use services::{
    AssignmentEvaluator, CourseDashboards, CourseProgressionController, ErrorKind, Evaluation,
    EvaluatorError, ProgressStore, ProgressionError, QuizAdvance, StoredDashboards,
};
use storage::repository::{
    CourseRepository, InMemoryRepository, ProgressRepository, StorageError,
};
use tokio::sync::Notify;

const LEARNER: LearnerId = LearnerId::new(1);
const COURSE: CourseId = CourseId::new(1);
const LESSON_A: LessonId = LessonId::new(1);
const LESSON_B: LessonId = LessonId::new(2);
const LESSON_C: LessonId = LessonId::new(3);

/// Hands out scores from a queue, one per call.
#[derive(Default)]
struct ScriptedEvaluator {
    scores: Mutex<VecDeque<u32>>,
}

impl ScriptedEvaluator {
    fn new(scores: &[u32]) -> Self {
        Self {
            scores: Mutex::new(scores.iter().copied().collect()),
        }
    }
}

#[async_trait]
impl AssignmentEvaluator for ScriptedEvaluator {
    async fn evaluate(&self, _lesson: LessonId, _code: &str) -> Result<Evaluation, EvaluatorError> {
        let next = self
            .scores
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| EvaluatorError::Unavailable("no scripted score left".into()))?;
        Ok(Evaluation {
            assignment_score: Score::new(next).unwrap(),
            message: format!("scored {next}"),
        })
    }
}

async fn controller_with(
    repo: &InMemoryRepository,
    evaluator: Arc<dyn AssignmentEvaluator>,
) -> CourseProgressionController {
    repo.upsert_course(&demo_course(), fixed_now()).await.unwrap();
    CourseProgressionController::new(
        fixed_clock(),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        ProgressStore::new(fixed_clock(), Arc::new(repo.clone())),
        evaluator,
    )
}

async fn enrolled(scores: &[u32]) -> (InMemoryRepository, CourseProgressionController) {
    let repo = InMemoryRepository::new();
    let controller = controller_with(&repo, Arc::new(ScriptedEvaluator::new(scores))).await;
    controller.enroll(LEARNER, COURSE).await.unwrap();
    (repo, controller)
}

async fn take_quiz(
    controller: &CourseProgressionController,
    lesson: LessonId,
    answers: &[u64],
) -> QuizAdvance {
    let mut session = controller.start_quiz(LEARNER, COURSE, lesson).await.unwrap();
    let mut last = None;
    for answer in answers {
        session.select_answer(AnswerId::new(*answer)).unwrap();
        last = Some(
            controller
                .advance_quiz(LEARNER, COURSE, &mut session)
                .await
                .unwrap(),
        );
    }
    last.expect("at least one answer")
}

#[tokio::test]
async fn concrete_scenario_unlocks_in_order() {
    let (_repo, controller) = enrolled(&[80]).await;

    let view = controller.course_view(LEARNER, COURSE).await.unwrap();
    assert!(view.lesson(LESSON_A).unwrap().unlocked);
    assert!(!view.lesson(LESSON_B).unwrap().unlocked);
    assert!(!view.lesson(LESSON_C).unwrap().unlocked);
    assert_eq!(view.current_lesson, Some(LESSON_A));

    controller
        .view_introduction(LEARNER, COURSE, LESSON_A)
        .await
        .unwrap();
    // Two of three correct.
    let quiz = take_quiz(&controller, LESSON_A, &[110, 121, 131]).await;
    let QuizAdvance::Completed { result, lesson, .. } = quiz else {
        panic!("quiz should be complete");
    };
    assert_eq!(result.score.value(), 67);
    assert!(!lesson.lesson_completed);

    let outcome = controller
        .submit_assignment(LEARNER, COURSE, LESSON_A, "fn main() {}")
        .await
        .unwrap();
    assert!(outcome.passed);
    assert!(outcome.lesson.lesson_completed);
    assert_eq!(outcome.next_lesson, Some(LESSON_B));

    let view = controller.course_view(LEARNER, COURSE).await.unwrap();
    assert!(view.lesson(LESSON_B).unwrap().unlocked);
    assert!(!view.lesson(LESSON_C).unwrap().unlocked);

    controller
        .view_introduction(LEARNER, COURSE, LESSON_B)
        .await
        .unwrap();
    let quiz = take_quiz(&controller, LESSON_B, &[211]).await;
    let QuizAdvance::Completed { result, lesson, .. } = quiz else {
        panic!("quiz should be complete");
    };
    assert_eq!(result.score, Score::ZERO);
    assert!(lesson.lesson_completed, "any quiz attempt passes the stage");

    let view = controller.course_view(LEARNER, COURSE).await.unwrap();
    assert!(view.lesson(LESSON_C).unwrap().unlocked);
    assert_eq!(view.current_lesson, Some(LESSON_C));
    assert!(!view.completed);
}

#[tokio::test]
async fn locked_lessons_refuse_every_action() {
    let (_repo, controller) = enrolled(&[]).await;

    let err = controller
        .open_lesson(LEARNER, COURSE, LESSON_B)
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressionError::Locked(id) if id == LESSON_B));
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    assert!(matches!(
        controller.start_quiz(LEARNER, COURSE, LESSON_B).await,
        Err(ProgressionError::Locked(_))
    ));
    assert!(matches!(
        controller
            .submit_assignment(LEARNER, COURSE, LESSON_C, "code")
            .await,
        Err(ProgressionError::Locked(_))
    ));
}

#[tokio::test]
async fn unenrolled_learner_sees_everything_locked() {
    let repo = InMemoryRepository::new();
    let controller = controller_with(&repo, Arc::new(ScriptedEvaluator::default())).await;

    let view = controller.course_view(LEARNER, COURSE).await.unwrap();
    assert!(!view.enrolled);
    assert!(view.lessons.iter().all(|l| !l.unlocked));

    let err = controller
        .open_lesson(LEARNER, COURSE, LESSON_A)
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressionError::NotEnrolled(_)));
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert!(matches!(
        controller.course_stats(LEARNER, COURSE).await,
        Err(ProgressionError::NotEnrolled(_))
    ));
}

#[tokio::test]
async fn unknown_lesson_and_empty_submission() {
    let (_repo, controller) = enrolled(&[]).await;

    let err = controller
        .open_lesson(LEARNER, COURSE, LessonId::new(999))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = controller
        .submit_assignment(LEARNER, COURSE, LESSON_A, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressionError::EmptySubmission));
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn assignment_best_score_never_regresses() {
    let (repo, controller) = enrolled(&[80, 40, 90]).await;

    let first = controller
        .submit_assignment(LEARNER, COURSE, LESSON_A, "v1")
        .await
        .unwrap();
    assert_eq!(first.best_score, Some(Score::new(80).unwrap()));

    let second = controller
        .submit_assignment(LEARNER, COURSE, LESSON_A, "v2")
        .await
        .unwrap();
    assert_eq!(second.evaluation.assignment_score.value(), 40);
    assert!(!second.passed);
    assert_eq!(second.best_score, Some(Score::new(80).unwrap()));

    let third = controller
        .submit_assignment(LEARNER, COURSE, LESSON_A, "v3")
        .await
        .unwrap();
    assert_eq!(third.best_score, Some(Score::new(90).unwrap()));

    let stored = repo
        .get_progress(LEARNER, COURSE, LESSON_A)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.assignment_score, Some(Score::new(90).unwrap()));
}

#[tokio::test]
async fn quiz_best_is_max_over_attempts_and_restart_is_idempotent() {
    let (_repo, controller) = enrolled(&[]).await;

    let answers = [110, 120, 131];
    let QuizAdvance::Completed { result: first, .. } =
        take_quiz(&controller, LESSON_A, &answers).await
    else {
        panic!("complete");
    };
    let QuizAdvance::Completed { result: again, best_score, .. } =
        take_quiz(&controller, LESSON_A, &answers).await
    else {
        panic!("complete");
    };
    assert_eq!(first.score, again.score);
    assert_eq!(best_score, Some(first.score));

    let QuizAdvance::Completed { best_score, .. } =
        take_quiz(&controller, LESSON_A, &[110, 121, 130]).await
    else {
        panic!("complete");
    };
    assert_eq!(best_score, Some(Score::MAX));

    let QuizAdvance::Completed { best_score, .. } =
        take_quiz(&controller, LESSON_A, &[111, 120, 131]).await
    else {
        panic!("complete");
    };
    assert_eq!(best_score, Some(Score::MAX));
}

#[tokio::test]
async fn advancing_without_selection_is_a_validation_error() {
    let (_repo, controller) = enrolled(&[]).await;
    let mut session = controller
        .start_quiz(LEARNER, COURSE, LESSON_A)
        .await
        .unwrap();
    let err = controller
        .advance_quiz(LEARNER, COURSE, &mut session)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(session.current_index(), Some(0));
}

/// Blocks every evaluation until released.
struct GatedEvaluator {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl AssignmentEvaluator for GatedEvaluator {
    async fn evaluate(&self, _lesson: LessonId, _code: &str) -> Result<Evaluation, EvaluatorError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Evaluation {
            assignment_score: Score::new(75).unwrap(),
            message: "ok".into(),
        })
    }
}

#[tokio::test]
async fn duplicate_submission_is_suppressed_while_in_flight() {
    let repo = InMemoryRepository::new();
    let gate = Arc::new(GatedEvaluator {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let controller = Arc::new(controller_with(&repo, gate.clone()).await);
    controller.enroll(LEARNER, COURSE).await.unwrap();

    let first = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            controller
                .submit_assignment(LEARNER, COURSE, LESSON_A, "first")
                .await
        })
    };
    gate.entered.notified().await;

    let err = controller
        .submit_assignment(LEARNER, COURSE, LESSON_A, "second")
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressionError::StageInFlight { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);

    gate.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert_eq!(outcome.best_score, Some(Score::new(75).unwrap()));

    // The guard is released once the first submission finishes.
    let again = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move {
            controller
                .submit_assignment(LEARNER, COURSE, LESSON_A, "third")
                .await
        }
    });
    gate.entered.notified().await;
    gate.release.notify_one();
    assert!(again.await.unwrap().is_ok());
}

#[tokio::test]
async fn evaluator_failure_releases_the_guard() {
    let (_repo, controller) = enrolled(&[]).await;
    let err = controller
        .submit_assignment(LEARNER, COURSE, LESSON_A, "code")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
    let err = controller
        .submit_assignment(LEARNER, COURSE, LESSON_A, "code")
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressionError::Evaluator(_)));
}

#[tokio::test]
async fn stageless_lesson_completes_on_open_and_hidden_modules_are_skipped() {
    let repo = InMemoryRepository::new();
    let course = CourseDraft {
        id: CourseId::new(5),
        name: "Reading list".into(),
        description: None,
        modules: vec![
            ModuleDraft {
                id: ModuleId::new(1),
                name: "Drafts".into(),
                order: 1,
                is_visible: false,
                lessons: vec![LessonDraft {
                    id: LessonId::new(50),
                    topic: "Hidden".into(),
                    order: 1,
                    introduction: Some("Not yet".into()),
                    quiz: Vec::new(),
                    assignment: None,
                }],
            },
            ModuleDraft {
                id: ModuleId::new(2),
                name: "Readings".into(),
                order: 2,
                is_visible: true,
                lessons: vec![
                    LessonDraft {
                        id: LessonId::new(51),
                        topic: "Preface".into(),
                        order: 1,
                        introduction: Some("   ".into()),
                        quiz: Vec::new(),
                        assignment: None,
                    },
                    LessonDraft {
                        id: LessonId::new(52),
                        topic: "Chapter 1".into(),
                        order: 2,
                        introduction: Some("Read it".into()),
                        quiz: Vec::new(),
                        assignment: None,
                    },
                ],
            },
        ],
    }
    .validate()
    .unwrap();
    repo.upsert_course(&course, fixed_now()).await.unwrap();
    let controller = controller_with(&repo, Arc::new(ScriptedEvaluator::default())).await;
    let course_id = course.id();
    controller.enroll(LEARNER, course_id).await.unwrap();

    let view = controller.course_view(LEARNER, course_id).await.unwrap();
    assert_eq!(view.lessons.len(), 2);
    assert!(view.lesson(LessonId::new(50)).is_none());
    assert!(matches!(
        controller
            .open_lesson(LEARNER, course_id, LessonId::new(50))
            .await,
        Err(ProgressionError::Locked(_))
    ));

    let preface = controller
        .open_lesson(LEARNER, course_id, LessonId::new(51))
        .await
        .unwrap();
    assert!(preface.stages.is_empty());
    assert!(preface.lesson_completed);

    let chapter = controller
        .view_introduction(LEARNER, course_id, LessonId::new(52))
        .await
        .unwrap();
    assert!(chapter.lesson_completed);
    let view = controller.course_view(LEARNER, course_id).await.unwrap();
    assert!(view.completed);
    assert_eq!(view.current_lesson, None);
}

#[tokio::test]
async fn stats_follow_progress() {
    let (_repo, controller) = enrolled(&[80]).await;
    controller
        .view_introduction(LEARNER, COURSE, LESSON_A)
        .await
        .unwrap();
    take_quiz(&controller, LESSON_A, &[110, 121, 131]).await;
    controller
        .submit_assignment(LEARNER, COURSE, LESSON_A, "code")
        .await
        .unwrap();

    let stats = controller.course_stats(LEARNER, COURSE).await.unwrap();
    assert_eq!(stats.lesson_count, 3);
    assert_eq!(stats.completed_lessons, 1);
    assert_eq!(stats.started_quizzes, 1);
    assert_eq!(stats.started_assignments, 1);
    assert_eq!(stats.quiz_score_percentage, 34);
    assert_eq!(stats.assignment_score_percentage, 40);
}

/// Passes reads through but rejects writes as if the token expired.
struct ExpiringProgress {
    inner: InMemoryRepository,
}

#[async_trait]
impl ProgressRepository for ExpiringProgress {
    async fn get_progress(
        &self,
        learner: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        self.inner.get_progress(learner, course_id, lesson_id).await
    }

    async fn upsert_progress(
        &self,
        _learner: LearnerId,
        _course_id: CourseId,
        _lesson_id: LessonId,
        _update: &ProgressUpdate,
        _at: DateTime<Utc>,
    ) -> Result<LessonProgress, StorageError> {
        Err(StorageError::Unauthenticated)
    }

    async fn list_progress(
        &self,
        learner: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        self.inner.list_progress(learner, course_id).await
    }

    async fn list_course_progress(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<(LearnerId, LessonProgress)>, StorageError> {
        self.inner.list_course_progress(course_id).await
    }
}

#[tokio::test]
async fn auth_failure_at_quiz_end_discards_the_attempt() {
    let repo = InMemoryRepository::new();
    repo.upsert_course(&demo_course(), fixed_now()).await.unwrap();
    let controller = CourseProgressionController::new(
        fixed_clock(),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        ProgressStore::new(
            fixed_clock(),
            Arc::new(ExpiringProgress {
                inner: repo.clone(),
            }),
        ),
        Arc::new(ScriptedEvaluator::default()),
    );
    controller.enroll(LEARNER, COURSE).await.unwrap();

    let mut session: QuizSession = controller
        .start_quiz(LEARNER, COURSE, LESSON_A)
        .await
        .unwrap();
    for answer in [110, 121] {
        session.select_answer(AnswerId::new(answer)).unwrap();
        controller
            .advance_quiz(LEARNER, COURSE, &mut session)
            .await
            .unwrap();
    }
    session.select_answer(AnswerId::new(130)).unwrap();
    let err = controller
        .advance_quiz(LEARNER, COURSE, &mut session)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    assert!(!session.is_complete());
    assert_eq!(session.current_index(), None);
    assert!(
        repo.get_progress(LEARNER, COURSE, LESSON_A)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn absent_stages_are_rejected() {
    let (repo, controller) = enrolled(&[]).await;
    for lesson in [LESSON_A, LESSON_B] {
        repo.upsert_progress(
            LEARNER,
            COURSE,
            lesson,
            &ProgressUpdate::completed(),
            fixed_now(),
        )
        .await
        .unwrap();
    }

    let err = controller
        .submit_assignment(LEARNER, COURSE, LESSON_B, "code")
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressionError::StageAbsent { .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(matches!(
        controller.start_quiz(LEARNER, COURSE, LESSON_C).await,
        Err(ProgressionError::StageAbsent { .. })
    ));
}

#[tokio::test]
async fn only_enrolled_learners_rate_and_the_latest_rating_counts() {
    let (_repo, controller) = enrolled(&[]).await;
    let stranger = LearnerId::new(9);

    let err = controller
        .rate_course(stranger, COURSE, Rating::new(5).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressionError::NotEnrolled(_)));
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(controller.course_rating(COURSE).await.unwrap().average, None);

    controller.enroll(stranger, COURSE).await.unwrap();
    controller
        .rate_course(LEARNER, COURSE, Rating::new(1).unwrap())
        .await
        .unwrap();
    controller
        .rate_course(LEARNER, COURSE, Rating::new(3).unwrap())
        .await
        .unwrap();
    let summary = controller
        .rate_course(stranger, COURSE, Rating::new(4).unwrap())
        .await
        .unwrap();
    assert_eq!(summary.count, Some(2));
    assert_eq!(summary.rounded_average(), Some(3.5));

    let missing = controller
        .rate_course(LEARNER, CourseId::new(404), Rating::new(4).unwrap())
        .await
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn dashboards_rank_learners_who_used_the_controller() {
    let (repo, controller) = enrolled(&[90]).await;
    let second = LearnerId::new(2);
    controller.enroll(second, COURSE).await.unwrap();

    controller
        .view_introduction(LEARNER, COURSE, LESSON_A)
        .await
        .unwrap();
    take_quiz(&controller, LESSON_A, &[110, 121, 130]).await;
    controller
        .submit_assignment(LEARNER, COURSE, LESSON_A, "code")
        .await
        .unwrap();
    controller
        .view_introduction(second, COURSE, LESSON_A)
        .await
        .unwrap();

    let dashboards = StoredDashboards::new(
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );
    let board = dashboards
        .leaderboard(COURSE, LeaderboardSort::AssignmentScore)
        .await
        .unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].learner, LearnerRef::Id(LEARNER));
    assert_eq!(board[0].stats.completed_lessons, 1);
    assert_eq!(board[1].stats.completed_lessons, 0);

    let lessons = dashboards.lesson_aggregates(COURSE).await.unwrap();
    assert_eq!(lessons[0].lesson_id, LESSON_A);
    assert_eq!(lessons[0].learner_count, 2);
    assert_eq!(lessons[0].completed_count, 1);
    assert_eq!(lessons[0].completion_percentage(), 50);
    assert_eq!(lessons[0].assignment_score_percentage, 45);
}

#[tokio::test]
async fn stored_progress_refuses_unenrolled_learners() {
    let (repo, _controller) = enrolled(&[]).await;
    let err = repo
        .upsert_progress(
            LearnerId::new(42),
            COURSE,
            LESSON_A,
            &ProgressUpdate::completed(),
            fixed_now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Forbidden));
}
