use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::model::ids::LessonId;
use crate::model::score::Score;

//
// ─── LESSON PROGRESS ───────────────────────────────────────────────────────────
//

/// One learner's progress through one lesson.
///
/// Flags only move from `false` to `true` and scores only move up, so a record
/// can be merged with any later update without losing history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonProgress {
    pub lesson_id: LessonId,
    pub introduction_completed: bool,
    pub quiz_score: Option<Score>,
    pub assignment_score: Option<Score>,
    pub lesson_completed: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    /// Fresh record with every flag false and no scores.
    #[must_use]
    pub fn empty(lesson_id: LessonId) -> Self {
        Self {
            lesson_id,
            introduction_completed: false,
            quiz_score: None,
            assignment_score: None,
            lesson_completed: false,
            updated_at: None,
        }
    }

    /// Merge a partial update into this record.
    ///
    /// Absent fields are left alone. A `false` flag never clears a `true` one
    /// and a lower score never replaces a higher one.
    pub fn merge(&mut self, update: &ProgressUpdate, at: DateTime<Utc>) {
        if let Some(done) = update.introduction_completed {
            self.introduction_completed |= done;
        }
        if let Some(score) = update.quiz_score {
            self.quiz_score = Some(Score::best_of(self.quiz_score, score));
        }
        if let Some(score) = update.assignment_score {
            self.assignment_score = Some(Score::best_of(self.assignment_score, score));
        }
        if let Some(done) = update.lesson_completed {
            self.lesson_completed |= done;
        }
        self.updated_at = Some(at);
    }

    /// True once the learner has finished at least one quiz attempt.
    #[must_use]
    pub fn quiz_attempted(&self) -> bool {
        self.quiz_score.is_some()
    }
}

/// Partial update to a `LessonProgress`; `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub introduction_completed: Option<bool>,
    pub quiz_score: Option<Score>,
    pub assignment_score: Option<Score>,
    pub lesson_completed: Option<bool>,
}

impl ProgressUpdate {
    #[must_use]
    pub fn introduction_viewed() -> Self {
        Self {
            introduction_completed: Some(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn quiz(score: Score) -> Self {
        Self {
            quiz_score: Some(score),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn assignment(score: Score) -> Self {
        Self {
            assignment_score: Some(score),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn completed() -> Self {
        Self {
            lesson_completed: Some(true),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

//
// ─── SNAPSHOT ──────────────────────────────────────────────────────────────────
//

/// Lesson-keyed view of a learner's progress in one course.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    records: HashMap<LessonId, LessonProgress>,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, lesson_id: LessonId) -> Option<&LessonProgress> {
        self.records.get(&lesson_id)
    }

    /// Missing records count as not completed.
    #[must_use]
    pub fn is_completed(&self, lesson_id: LessonId) -> bool {
        self.records
            .get(&lesson_id)
            .is_some_and(|p| p.lesson_completed)
    }

    pub fn insert(&mut self, progress: LessonProgress) {
        self.records.insert(progress.lesson_id, progress);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LessonProgress> {
        self.records.values()
    }
}

impl FromIterator<LessonProgress> for ProgressSnapshot {
    fn from_iter<I: IntoIterator<Item = LessonProgress>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn score(v: u32) -> Score {
        Score::new(v).unwrap()
    }

    #[test]
    fn merge_keeps_true_flags() {
        let mut p = LessonProgress::empty(LessonId::new(1));
        p.merge(&ProgressUpdate::introduction_viewed(), fixed_now());
        p.merge(
            &ProgressUpdate {
                introduction_completed: Some(false),
                lesson_completed: Some(false),
                ..ProgressUpdate::default()
            },
            fixed_now(),
        );
        assert!(p.introduction_completed);
        assert!(!p.lesson_completed);
    }

    #[test]
    fn merge_never_lowers_scores() {
        let mut p = LessonProgress::empty(LessonId::new(1));
        p.merge(&ProgressUpdate::assignment(score(80)), fixed_now());
        p.merge(&ProgressUpdate::assignment(score(40)), fixed_now());
        assert_eq!(p.assignment_score, Some(score(80)));

        p.merge(&ProgressUpdate::quiz(score(33)), fixed_now());
        p.merge(&ProgressUpdate::quiz(score(67)), fixed_now());
        assert_eq!(p.quiz_score, Some(score(67)));
        assert_eq!(p.updated_at, Some(fixed_now()));
    }

    #[test]
    fn empty_update_only_touches_timestamp() {
        let mut p = LessonProgress::empty(LessonId::new(3));
        let before = p.clone();
        p.merge(&ProgressUpdate::default(), fixed_now());
        assert_eq!(p.updated_at, Some(fixed_now()));
        p.updated_at = None;
        assert_eq!(p, before);
        assert!(ProgressUpdate::default().is_empty());
    }

    #[test]
    fn snapshot_defaults_to_locked() {
        let mut done = LessonProgress::empty(LessonId::new(1));
        done.lesson_completed = true;
        let snapshot: ProgressSnapshot = vec![done, LessonProgress::empty(LessonId::new(2))]
            .into_iter()
            .collect();
        assert!(snapshot.is_completed(LessonId::new(1)));
        assert!(!snapshot.is_completed(LessonId::new(2)));
        assert!(!snapshot.is_completed(LessonId::new(3)));
        assert_eq!(snapshot.len(), 2);
    }
}
