mod course;
mod creator;
mod enrollment;
mod ids;
mod progress;
mod rating;
mod score;

pub use course::{
    Answer, Course, CourseDraft, CourseError, Lesson, LessonDraft, LessonLocation, Module,
    ModuleDraft, PublicationError, Question, QuestionDraft,
};
pub use creator::{CreatorState, CreatorStateError};
pub use enrollment::Enrollment;
pub use ids::{AnswerId, CourseId, LearnerId, LessonId, ModuleId, ParseIdError, QuestionId};
pub use progress::{LessonProgress, ProgressSnapshot, ProgressUpdate};
pub use rating::{Rating, RatingError, RatingSummary};
pub use score::{Score, ScoreError, ScoreThresholds, ScoreTier};
