use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{AnswerId, CourseId, LessonId, ModuleId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course name cannot be empty")]
    EmptyName,

    #[error("module orders must be 1..=n without gaps, found {found:?}")]
    InvalidModuleOrder { found: Vec<u32> },

    #[error("lesson orders in module {module} must be 1..=n without gaps, found {found:?}")]
    InvalidLessonOrder { module: ModuleId, found: Vec<u32> },

    #[error("duplicate module id {0}")]
    DuplicateModuleId(ModuleId),

    #[error("duplicate lesson id {0}")]
    DuplicateLessonId(LessonId),

    #[error("question {0} has no answers")]
    QuestionWithoutAnswers(QuestionId),
}

/// First rule a course breaks before it can be published.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PublicationError {
    #[error("course description cannot be empty")]
    EmptyDescription,

    #[error("course needs at least {required} modules, has {found}")]
    TooFewModules { required: usize, found: usize },

    #[error("module \"{module}\" needs at least {required} lessons, has {found}")]
    TooFewLessons {
        module: String,
        required: usize,
        found: usize,
    },

    #[error("lesson \"{lesson}\" has no introduction")]
    MissingIntroduction { lesson: String },

    #[error("lesson \"{lesson}\" has no assignment")]
    MissingAssignment { lesson: String },

    #[error("lesson \"{lesson}\" needs at least {required} quiz questions, has {found}")]
    TooFewQuestions {
        lesson: String,
        required: usize,
        found: usize,
    },

    #[error("question \"{question}\" in lesson \"{lesson}\" needs at least {required} answers, has {found}")]
    TooFewAnswers {
        lesson: String,
        question: String,
        required: usize,
        found: usize,
    },
}

const MIN_MODULES: usize = 2;
const MIN_LESSONS_PER_MODULE: usize = 2;
const MIN_QUESTIONS_PER_LESSON: usize = 3;
const MIN_ANSWERS_PER_QUESTION: usize = 3;

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Unvalidated course tree, as stored or received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseDraft {
    pub id: CourseId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub modules: Vec<ModuleDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDraft {
    pub id: ModuleId,
    pub name: String,
    pub order: u32,
    pub is_visible: bool,
    pub lessons: Vec<LessonDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonDraft {
    pub id: LessonId,
    pub topic: String,
    pub order: u32,
    #[serde(default)]
    pub introduction: Option<String>,
    #[serde(default)]
    pub quiz: Vec<QuestionDraft>,
    #[serde(default)]
    pub assignment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub id: QuestionId,
    pub prompt: String,
    pub answers: Vec<Answer>,
}

impl CourseDraft {
    /// Validate the tree and sort modules and lessons by their order.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if the name is blank, orders are not dense from 1,
    /// ids repeat, or a question has no answers.
    pub fn validate(self) -> Result<Course, CourseError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(CourseError::EmptyName);
        }

        let mut modules = self.modules;
        modules.sort_by_key(|m| m.order);
        check_dense(modules.iter().map(|m| m.order))
            .map_err(|found| CourseError::InvalidModuleOrder { found })?;

        let mut module_ids = HashSet::new();
        let mut lesson_ids = HashSet::new();
        let mut validated = Vec::with_capacity(modules.len());
        for module in modules {
            if !module_ids.insert(module.id) {
                return Err(CourseError::DuplicateModuleId(module.id));
            }
            let mut lessons = module.lessons;
            lessons.sort_by_key(|l| l.order);
            check_dense(lessons.iter().map(|l| l.order)).map_err(|found| {
                CourseError::InvalidLessonOrder {
                    module: module.id,
                    found,
                }
            })?;

            let mut built = Vec::with_capacity(lessons.len());
            for lesson in lessons {
                if !lesson_ids.insert(lesson.id) {
                    return Err(CourseError::DuplicateLessonId(lesson.id));
                }
                built.push(lesson.validate()?);
            }

            validated.push(Module {
                id: module.id,
                name: module.name.trim().to_owned(),
                order: module.order,
                is_visible: module.is_visible,
                lessons: built,
            });
        }

        Ok(Course {
            id: self.id,
            name,
            description: normalize_text(self.description),
            modules: validated,
        })
    }
}

impl LessonDraft {
    fn validate(self) -> Result<Lesson, CourseError> {
        let quiz = self
            .quiz
            .into_iter()
            .map(QuestionDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Lesson {
            id: self.id,
            topic: self.topic.trim().to_owned(),
            order: self.order,
            introduction: normalize_text(self.introduction),
            quiz,
            assignment: normalize_text(self.assignment),
        })
    }
}

impl QuestionDraft {
    fn validate(self) -> Result<Question, CourseError> {
        if self.answers.is_empty() {
            return Err(CourseError::QuestionWithoutAnswers(self.id));
        }
        Ok(Question {
            id: self.id,
            prompt: self.prompt,
            answers: self.answers,
        })
    }
}

fn check_dense(orders: impl Iterator<Item = u32>) -> Result<(), Vec<u32>> {
    let found: Vec<u32> = orders.collect();
    let dense = found
        .iter()
        .enumerate()
        .all(|(idx, order)| usize::try_from(*order).is_ok_and(|o| o == idx + 1));
    if dense { Ok(()) } else { Err(found) }
}

fn normalize_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty())
}

//
// ─── COURSE TREE ───────────────────────────────────────────────────────────────
//

/// A single choice within a quiz question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub text: String,
    pub is_correct: bool,
}

impl Answer {
    #[must_use]
    pub fn new(id: AnswerId, text: impl Into<String>, is_correct: bool) -> Self {
        Self {
            id,
            text: text.into(),
            is_correct,
        }
    }
}

/// A quiz question with at least one answer.
///
/// The number of correct answers is not enforced here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    answers: Vec<Answer>,
}

impl Question {
    /// # Errors
    ///
    /// Returns `CourseError::QuestionWithoutAnswers` if `answers` is empty.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        answers: Vec<Answer>,
    ) -> Result<Self, CourseError> {
        QuestionDraft {
            id,
            prompt: prompt.into(),
            answers,
        }
        .validate()
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    /// First answer carrying `id`, if any.
    #[must_use]
    pub fn answer(&self, id: AnswerId) -> Option<&Answer> {
        self.answers.iter().find(|a| a.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    id: LessonId,
    topic: String,
    order: u32,
    introduction: Option<String>,
    quiz: Vec<Question>,
    assignment: Option<String>,
}

impl Lesson {
    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn introduction(&self) -> Option<&str> {
        self.introduction.as_deref()
    }

    #[must_use]
    pub fn quiz(&self) -> &[Question] {
        &self.quiz
    }

    #[must_use]
    pub fn assignment(&self) -> Option<&str> {
        self.assignment.as_deref()
    }

    #[must_use]
    pub fn has_introduction(&self) -> bool {
        self.introduction.is_some()
    }

    /// An empty quiz means the lesson has no quiz stage.
    #[must_use]
    pub fn has_quiz(&self) -> bool {
        !self.quiz.is_empty()
    }

    #[must_use]
    pub fn has_assignment(&self) -> bool {
        self.assignment.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    id: ModuleId,
    name: String,
    order: u32,
    is_visible: bool,
    lessons: Vec<Lesson>,
}

impl Module {
    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Hidden modules stay in the tree but take no part in progression.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }
}

/// Position of a lesson inside a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonLocation {
    /// Index into `Course::modules`, hidden modules included.
    pub module_index: usize,
    pub lesson_index: usize,
    pub module_visible: bool,
}

/// A validated course: modules and lessons sorted by order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CourseDraft", into = "CourseDraft")]
pub struct Course {
    id: CourseId,
    name: String,
    description: Option<String>,
    modules: Vec<Module>,
}

impl TryFrom<CourseDraft> for Course {
    type Error = CourseError;

    fn try_from(draft: CourseDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<Course> for CourseDraft {
    fn from(course: Course) -> Self {
        course.to_draft()
    }
}

impl Course {
    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// Visible modules in course order.
    pub fn visible_modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.iter().filter(|m| m.is_visible)
    }

    /// Lessons of visible modules in course order.
    pub fn visible_lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.visible_modules().flat_map(|m| m.lessons.iter())
    }

    #[must_use]
    pub fn lesson(&self, id: LessonId) -> Option<&Lesson> {
        self.modules
            .iter()
            .flat_map(|m| m.lessons.iter())
            .find(|l| l.id == id)
    }

    #[must_use]
    pub fn locate(&self, id: LessonId) -> Option<LessonLocation> {
        self.modules
            .iter()
            .enumerate()
            .find_map(|(module_index, module)| {
                module
                    .lessons
                    .iter()
                    .position(|l| l.id == id)
                    .map(|lesson_index| LessonLocation {
                        module_index,
                        lesson_index,
                        module_visible: module.is_visible,
                    })
            })
    }

    /// The lesson following `id` in visible course order.
    #[must_use]
    pub fn next_lesson(&self, id: LessonId) -> Option<&Lesson> {
        let mut lessons = self.visible_lessons();
        lessons.by_ref().find(|l| l.id == id)?;
        lessons.next()
    }

    /// Check the authoring rules a course must meet before it goes public.
    ///
    /// # Errors
    ///
    /// Returns the first `PublicationError` found, walking the tree in order.
    pub fn check_publishable(&self) -> Result<(), PublicationError> {
        if self.description.is_none() {
            return Err(PublicationError::EmptyDescription);
        }
        if self.modules.len() < MIN_MODULES {
            return Err(PublicationError::TooFewModules {
                required: MIN_MODULES,
                found: self.modules.len(),
            });
        }
        for module in &self.modules {
            if module.lessons.len() < MIN_LESSONS_PER_MODULE {
                return Err(PublicationError::TooFewLessons {
                    module: module.name.clone(),
                    required: MIN_LESSONS_PER_MODULE,
                    found: module.lessons.len(),
                });
            }
            for lesson in &module.lessons {
                if !lesson.has_introduction() {
                    return Err(PublicationError::MissingIntroduction {
                        lesson: lesson.topic.clone(),
                    });
                }
                if !lesson.has_assignment() {
                    return Err(PublicationError::MissingAssignment {
                        lesson: lesson.topic.clone(),
                    });
                }
                if lesson.quiz.len() < MIN_QUESTIONS_PER_LESSON {
                    return Err(PublicationError::TooFewQuestions {
                        lesson: lesson.topic.clone(),
                        required: MIN_QUESTIONS_PER_LESSON,
                        found: lesson.quiz.len(),
                    });
                }
                if let Some(question) = lesson
                    .quiz
                    .iter()
                    .find(|q| q.answers.len() < MIN_ANSWERS_PER_QUESTION)
                {
                    return Err(PublicationError::TooFewAnswers {
                        lesson: lesson.topic.clone(),
                        question: question.prompt.clone(),
                        required: MIN_ANSWERS_PER_QUESTION,
                        found: question.answers.len(),
                    });
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn to_draft(&self) -> CourseDraft {
        CourseDraft {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            modules: self
                .modules
                .iter()
                .map(|m| ModuleDraft {
                    id: m.id,
                    name: m.name.clone(),
                    order: m.order,
                    is_visible: m.is_visible,
                    lessons: m
                        .lessons
                        .iter()
                        .map(|l| LessonDraft {
                            id: l.id,
                            topic: l.topic.clone(),
                            order: l.order,
                            introduction: l.introduction.clone(),
                            quiz: l
                                .quiz
                                .iter()
                                .map(|q| QuestionDraft {
                                    id: q.id,
                                    prompt: q.prompt.clone(),
                                    answers: q.answers.clone(),
                                })
                                .collect(),
                            assignment: l.assignment.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: u64, answers: usize) -> QuestionDraft {
        QuestionDraft {
            id: QuestionId::new(id),
            prompt: format!("Q{id}"),
            answers: (0..answers)
                .map(|i| Answer::new(AnswerId::new(id * 10 + i as u64), "a", i == 0))
                .collect(),
        }
    }

    fn lesson(id: u64, order: u32) -> LessonDraft {
        LessonDraft {
            id: LessonId::new(id),
            topic: format!("Lesson {id}"),
            order,
            introduction: Some("intro".into()),
            quiz: vec![question(id * 100 + 1, 3), question(id * 100 + 2, 3), question(id * 100 + 3, 3)],
            assignment: Some("write code".into()),
        }
    }

    fn module(id: u64, order: u32, lessons: Vec<LessonDraft>) -> ModuleDraft {
        ModuleDraft {
            id: ModuleId::new(id),
            name: format!("Module {id}"),
            order,
            is_visible: true,
            lessons,
        }
    }

    fn draft(modules: Vec<ModuleDraft>) -> CourseDraft {
        CourseDraft {
            id: CourseId::new(1),
            name: "Rust".into(),
            description: Some("systems".into()),
            modules,
        }
    }

    #[test]
    fn validate_sorts_by_order() {
        let course = draft(vec![
            module(2, 2, vec![lesson(3, 1)]),
            module(1, 1, vec![lesson(2, 2), lesson(1, 1)]),
        ])
        .validate()
        .unwrap();

        assert_eq!(course.modules()[0].id(), ModuleId::new(1));
        assert_eq!(course.modules()[0].lessons()[0].id(), LessonId::new(1));
        assert_eq!(course.modules()[1].id(), ModuleId::new(2));
    }

    #[test]
    fn validate_rejects_gaps_and_duplicates() {
        let err = draft(vec![module(1, 1, vec![]), module(2, 3, vec![])])
            .validate()
            .unwrap_err();
        assert_eq!(err, CourseError::InvalidModuleOrder { found: vec![1, 3] });

        let err = draft(vec![module(1, 1, vec![lesson(1, 1), lesson(2, 1)])])
            .validate()
            .unwrap_err();
        assert!(matches!(err, CourseError::InvalidLessonOrder { .. }));

        let err = draft(vec![
            module(1, 1, vec![lesson(1, 1)]),
            module(2, 2, vec![lesson(1, 1)]),
        ])
        .validate()
        .unwrap_err();
        assert_eq!(err, CourseError::DuplicateLessonId(LessonId::new(1)));
    }

    #[test]
    fn validate_rejects_question_without_answers() {
        let mut l = lesson(1, 1);
        l.quiz.push(question(9, 0));
        let err = draft(vec![module(1, 1, vec![l])]).validate().unwrap_err();
        assert_eq!(err, CourseError::QuestionWithoutAnswers(QuestionId::new(9)));
    }

    #[test]
    fn blank_stage_text_counts_as_absent() {
        let mut l = lesson(1, 1);
        l.introduction = Some("   ".into());
        l.assignment = None;
        let course = draft(vec![module(1, 1, vec![l])]).validate().unwrap();
        let lesson = course.lesson(LessonId::new(1)).unwrap();
        assert!(!lesson.has_introduction());
        assert!(!lesson.has_assignment());
        assert!(lesson.has_quiz());
    }

    #[test]
    fn next_lesson_skips_hidden_modules() {
        let mut hidden = module(2, 2, vec![lesson(3, 1)]);
        hidden.is_visible = false;
        let course = draft(vec![
            module(1, 1, vec![lesson(1, 1), lesson(2, 2)]),
            hidden,
            module(3, 3, vec![lesson(4, 1)]),
        ])
        .validate()
        .unwrap();

        assert_eq!(course.next_lesson(LessonId::new(1)).unwrap().id(), LessonId::new(2));
        assert_eq!(course.next_lesson(LessonId::new(2)).unwrap().id(), LessonId::new(4));
        assert!(course.next_lesson(LessonId::new(4)).is_none());
        assert!(course.next_lesson(LessonId::new(3)).is_none());
    }

    #[test]
    fn publishable_course_passes() {
        let course = draft(vec![
            module(1, 1, vec![lesson(1, 1), lesson(2, 2)]),
            module(2, 2, vec![lesson(3, 1), lesson(4, 2)]),
        ])
        .validate()
        .unwrap();
        assert_eq!(course.check_publishable(), Ok(()));
    }

    #[test]
    fn publication_reports_first_failure() {
        let course = draft(vec![module(1, 1, vec![lesson(1, 1), lesson(2, 2)])])
            .validate()
            .unwrap();
        assert_eq!(
            course.check_publishable(),
            Err(PublicationError::TooFewModules { required: 2, found: 1 })
        );

        let mut short = lesson(4, 2);
        short.quiz[1] = question(402, 2);
        let course = draft(vec![
            module(1, 1, vec![lesson(1, 1), lesson(2, 2)]),
            module(2, 2, vec![lesson(3, 1), short]),
        ])
        .validate()
        .unwrap();
        assert!(matches!(
            course.check_publishable(),
            Err(PublicationError::TooFewAnswers { found: 2, .. })
        ));
    }

    #[test]
    fn serde_goes_through_validation() {
        let course = draft(vec![module(1, 1, vec![lesson(1, 1)])]).validate().unwrap();
        let json = serde_json::to_string(&course).unwrap();
        let back: Course = serde_json::from_str(&json).unwrap();
        assert_eq!(back, course);

        let broken = json.replace("\"order\":1,\"is_visible\"", "\"order\":5,\"is_visible\"");
        assert!(serde_json::from_str::<Course>(&broken).is_err());
    }
}
