use chrono::{DateTime, Utc};

use crate::model::ids::{CourseId, LearnerId};

/// Grants a learner progress tracking in a course.
///
/// Existence is the "is enrolled" signal; the record is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    learner: LearnerId,
    course_id: CourseId,
    enrolled_at: DateTime<Utc>,
}

impl Enrollment {
    #[must_use]
    pub fn new(learner: LearnerId, course_id: CourseId, enrolled_at: DateTime<Utc>) -> Self {
        Self {
            learner,
            course_id,
            enrolled_at,
        }
    }

    #[must_use]
    pub fn learner(&self) -> LearnerId {
        self.learner
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }
}
