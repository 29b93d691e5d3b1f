use crate::model::{Course, ProgressSnapshot, Score};

/// Per-learner aggregate over one course, as shown on the stats dashboard.
///
/// Only visible lessons count. Score percentages are the mean best score over
/// lessons that have the stage, with unattempted lessons counting as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CourseStats {
    pub lesson_count: u32,
    pub completed_lessons: u32,
    pub started_quizzes: u32,
    pub started_assignments: u32,
    pub quiz_score_percentage: u32,
    pub assignment_score_percentage: u32,
}

impl CourseStats {
    #[must_use]
    pub fn compute(course: &Course, progress: &ProgressSnapshot) -> Self {
        let mut stats = Self::default();
        let mut quiz = MeanScore::default();
        let mut assignment = MeanScore::default();

        for lesson in course.visible_lessons() {
            stats.lesson_count += 1;
            let record = progress.get(lesson.id());
            if record.is_some_and(|p| p.lesson_completed) {
                stats.completed_lessons += 1;
            }
            if lesson.has_quiz() {
                let best = record.and_then(|p| p.quiz_score);
                if best.is_some() {
                    stats.started_quizzes += 1;
                }
                quiz.add(best);
            }
            if lesson.has_assignment() {
                let best = record.and_then(|p| p.assignment_score);
                if best.is_some() {
                    stats.started_assignments += 1;
                }
                assignment.add(best);
            }
        }

        stats.quiz_score_percentage = quiz.percentage();
        stats.assignment_score_percentage = assignment.percentage();
        stats
    }

    /// Share of lessons completed, rounded half-up.
    #[must_use]
    pub fn completion_percentage(&self) -> u32 {
        Score::from_ratio(self.completed_lessons, self.lesson_count)
            .map_or(0, Score::value)
    }
}

/// Running mean of best scores where a missing score counts as 0.
#[derive(Default)]
pub(crate) struct MeanScore {
    sum: u64,
    count: u64,
}

impl MeanScore {
    pub(crate) fn add(&mut self, score: Option<Score>) {
        self.sum += u64::from(score.map_or(0, Score::value));
        self.count += 1;
    }

    /// Rounded half-up; 0 when nothing was added.
    pub(crate) fn percentage(&self) -> u32 {
        if self.count == 0 {
            return 0;
        }
        let rounded = (self.sum * 2 + self.count) / (self.count * 2);
        u32::try_from(rounded).unwrap_or(100)
    }
}
