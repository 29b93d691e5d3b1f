//! A small built-in course, used by the `seed` command and by tests.
//!
//! Module 1 holds lesson 1 (introduction, three-question quiz, assignment) and
//! lesson 2 (introduction, one-question quiz). Module 2 holds lesson 3
//! (introduction, assignment).

use crate::model::{
    Answer, AnswerId, Course, CourseDraft, CourseId, LessonDraft, LessonId, ModuleDraft, ModuleId,
    QuestionDraft, QuestionId,
};

pub const DEMO_COURSE_ID: CourseId = CourseId::new(1);

fn question(id: u64, prompt: &str, answers: &[(&str, bool)]) -> QuestionDraft {
    QuestionDraft {
        id: QuestionId::new(id),
        prompt: prompt.to_owned(),
        answers: answers
            .iter()
            .enumerate()
            .map(|(i, (text, ok))| Answer::new(AnswerId::new(id * 10 + i as u64), *text, *ok))
            .collect(),
    }
}

/// Course draft for the demo course, before validation.
#[must_use]
pub fn demo_course_draft() -> CourseDraft {
    CourseDraft {
        id: DEMO_COURSE_ID,
        name: "Rust foundations".into(),
        description: Some("Ownership, borrowing and error handling.".into()),
        modules: vec![
            ModuleDraft {
                id: ModuleId::new(1),
                name: "Ownership".into(),
                order: 1,
                is_visible: true,
                lessons: vec![
                    LessonDraft {
                        id: LessonId::new(1),
                        topic: "Moves and copies".into(),
                        order: 1,
                        introduction: Some("Every value has exactly one owner.".into()),
                        quiz: vec![
                            question(
                                11,
                                "What happens to a String after `let b = a;`?",
                                &[("It is moved into b", true), ("It is copied", false)],
                            ),
                            question(
                                12,
                                "Which type is Copy?",
                                &[("Vec<u8>", false), ("u32", true), ("String", false)],
                            ),
                            question(
                                13,
                                "When is a value dropped?",
                                &[("When its owner goes out of scope", true), ("Never", false)],
                            ),
                        ],
                        assignment: Some("Write a function that takes ownership of a Vec.".into()),
                    },
                    LessonDraft {
                        id: LessonId::new(2),
                        topic: "Borrowing".into(),
                        order: 2,
                        introduction: Some("References borrow without taking ownership.".into()),
                        quiz: vec![question(
                            21,
                            "How many mutable borrows may coexist?",
                            &[("One", true), ("Any number", false)],
                        )],
                        assignment: None,
                    },
                ],
            },
            ModuleDraft {
                id: ModuleId::new(2),
                name: "Errors".into(),
                order: 2,
                is_visible: true,
                lessons: vec![LessonDraft {
                    id: LessonId::new(3),
                    topic: "The ? operator".into(),
                    order: 1,
                    introduction: Some("`?` propagates errors to the caller.".into()),
                    quiz: Vec::new(),
                    assignment: Some("Parse a config file and propagate every error.".into()),
                }],
            },
        ],
    }
}

/// The validated demo course.
///
/// # Panics
///
/// Panics if the built-in draft stops validating.
#[must_use]
pub fn demo_course() -> Course {
    demo_course_draft()
        .validate()
        .expect("demo course should validate")
}
