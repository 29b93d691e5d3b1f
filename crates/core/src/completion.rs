//! When a lesson counts as completed.
//!
//! Each stage that structurally exists on a lesson has to be passed:
//! the introduction viewed once, the quiz attempted at least once (any score),
//! and the assignment's best score at or above the pass threshold.

use std::fmt;

use crate::model::{Lesson, LessonProgress, ScoreThresholds};

/// One of the three parts a lesson can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Introduction,
    Quiz,
    Assignment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Introduction => "introduction",
            Stage::Quiz => "quiz",
            Stage::Assignment => "assignment",
        };
        f.write_str(name)
    }
}

/// Stage presence plus pass state, for one lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStatus {
    pub stage: Stage,
    pub passed: bool,
}

/// Stages present on `lesson`, in play order.
#[must_use]
pub fn present_stages(lesson: &Lesson) -> Vec<Stage> {
    let mut stages = Vec::with_capacity(3);
    if lesson.has_introduction() {
        stages.push(Stage::Introduction);
    }
    if lesson.has_quiz() {
        stages.push(Stage::Quiz);
    }
    if lesson.has_assignment() {
        stages.push(Stage::Assignment);
    }
    stages
}

#[must_use]
pub fn stage_passed(
    stage: Stage,
    progress: Option<&LessonProgress>,
    thresholds: &ScoreThresholds,
) -> bool {
    let Some(progress) = progress else {
        return false;
    };
    match stage {
        Stage::Introduction => progress.introduction_completed,
        Stage::Quiz => progress.quiz_attempted(),
        Stage::Assignment => progress
            .assignment_score
            .is_some_and(|score| thresholds.passes(score)),
    }
}

#[must_use]
pub fn stage_statuses(
    lesson: &Lesson,
    progress: Option<&LessonProgress>,
    thresholds: &ScoreThresholds,
) -> Vec<StageStatus> {
    present_stages(lesson)
        .into_iter()
        .map(|stage| StageStatus {
            stage,
            passed: stage_passed(stage, progress, thresholds),
        })
        .collect()
}

/// True once every present stage is passed.
///
/// A lesson without any stage is complete as soon as it has a progress record,
/// i.e. once the learner has opened it.
#[must_use]
pub fn is_lesson_complete(
    lesson: &Lesson,
    progress: Option<&LessonProgress>,
    thresholds: &ScoreThresholds,
) -> bool {
    if progress.is_none() {
        return false;
    }
    present_stages(lesson)
        .into_iter()
        .all(|stage| stage_passed(stage, progress, thresholds))
}
