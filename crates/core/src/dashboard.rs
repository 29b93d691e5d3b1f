//! Cross-learner views of a course: leaderboard rows, per-lesson aggregates
//! for authors and the overview across several courses.

use std::collections::HashSet;
use std::fmt;

use crate::model::{Course, LearnerId, LessonId, ProgressSnapshot, Score};
use crate::stats::{CourseStats, MeanScore};

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

//
// ─── LEADERBOARD ───────────────────────────────────────────────────────────────
//

/// Owner of a leaderboard row. Local stores know learner ids, the remote API
/// only reports usernames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LearnerRef {
    Id(LearnerId),
    Username(String),
}

impl fmt::Display for LearnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearnerRef::Id(id) => write!(f, "learner {id}"),
            LearnerRef::Username(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerStats {
    pub learner: LearnerRef,
    pub stats: CourseStats,
}

/// Column a leaderboard is ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeaderboardSort {
    #[default]
    Completion,
    QuizScore,
    AssignmentScore,
}

impl LeaderboardSort {
    fn key(self, stats: &CourseStats) -> u32 {
        match self {
            LeaderboardSort::Completion => stats.completed_lessons,
            LeaderboardSort::QuizScore => stats.quiz_score_percentage,
            LeaderboardSort::AssignmentScore => stats.assignment_score_percentage,
        }
    }
}

/// Best first. Ties fall back to completed lessons, then to the learner.
pub fn sort_leaderboard(rows: &mut [LearnerStats], sort: LeaderboardSort) {
    rows.sort_by(|a, b| {
        sort.key(&b.stats)
            .cmp(&sort.key(&a.stats))
            .then_with(|| b.stats.completed_lessons.cmp(&a.stats.completed_lessons))
            .then_with(|| a.learner.cmp(&b.learner))
    });
}

//
// ─── AGGREGATES ────────────────────────────────────────────────────────────────
//

/// One lesson across every enrolled learner.
///
/// Score percentages are means over all enrolled learners, with learners who
/// never attempted the stage counting as 0. Both are 0 for a lesson without
/// the stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonAggregate {
    pub lesson_id: LessonId,
    pub topic: String,
    pub learner_count: u32,
    pub completed_count: u32,
    pub quiz_score_percentage: u32,
    pub assignment_score_percentage: u32,
}

impl LessonAggregate {
    /// Share of enrolled learners who completed the lesson.
    #[must_use]
    pub fn completion_percentage(&self) -> u32 {
        Score::from_ratio(self.completed_count, self.learner_count).map_or(0, Score::value)
    }
}

/// Totals over a set of courses, as shown to a course author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverviewStats {
    pub courses_count: u32,
    /// Distinct learners enrolled in at least one of the courses.
    pub students_count: u32,
    /// Completed visible lessons summed over every learner.
    pub completed_lessons: u32,
}

impl OverviewStats {
    #[must_use]
    pub fn compute(rosters: &[CourseRoster]) -> Self {
        let mut students = HashSet::new();
        let mut completed = 0_usize;
        for roster in rosters {
            for (learner, snapshot) in &roster.learners {
                students.insert(*learner);
                completed += roster
                    .course
                    .visible_lessons()
                    .filter(|lesson| snapshot.is_completed(lesson.id()))
                    .count();
            }
        }
        Self {
            courses_count: count(rosters.len()),
            students_count: count(students.len()),
            completed_lessons: count(completed),
        }
    }
}

/// A course with the progress of every enrolled learner, including learners
/// who have not started yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseRoster {
    pub course: Course,
    pub learners: Vec<(LearnerId, ProgressSnapshot)>,
}

impl CourseRoster {
    #[must_use]
    pub fn new(course: Course) -> Self {
        Self {
            course,
            learners: Vec::new(),
        }
    }

    /// Unsorted leaderboard rows, one per enrolled learner.
    #[must_use]
    pub fn learner_stats(&self) -> Vec<LearnerStats> {
        self.learners
            .iter()
            .map(|(learner, snapshot)| LearnerStats {
                learner: LearnerRef::Id(*learner),
                stats: CourseStats::compute(&self.course, snapshot),
            })
            .collect()
    }

    /// One entry per visible lesson, in course order.
    #[must_use]
    pub fn lesson_aggregates(&self) -> Vec<LessonAggregate> {
        self.course
            .visible_lessons()
            .map(|lesson| {
                let mut quiz = MeanScore::default();
                let mut assignment = MeanScore::default();
                let mut completed = 0_usize;
                for (_, snapshot) in &self.learners {
                    let record = snapshot.get(lesson.id());
                    if record.is_some_and(|p| p.lesson_completed) {
                        completed += 1;
                    }
                    if lesson.has_quiz() {
                        quiz.add(record.and_then(|p| p.quiz_score));
                    }
                    if lesson.has_assignment() {
                        assignment.add(record.and_then(|p| p.assignment_score));
                    }
                }
                LessonAggregate {
                    lesson_id: lesson.id(),
                    topic: lesson.topic().to_owned(),
                    learner_count: count(self.learners.len()),
                    completed_count: count(completed),
                    quiz_score_percentage: quiz.percentage(),
                    assignment_score_percentage: assignment.percentage(),
                }
            })
            .collect()
    }
}
