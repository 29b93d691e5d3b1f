//! Lesson gating.
//!
//! A lesson is open once every lesson before it, in visible course order, is
//! completed. Hidden modules are skipped entirely and empty modules never
//! block anything.

use crate::model::{Course, LessonId, ProgressSnapshot};

/// Whether `lesson_id` is accessible given `progress`.
///
/// Deterministic and side-effect free; safe to call on every render. Unknown
/// lessons and lessons in hidden modules are locked.
#[must_use]
pub fn is_lesson_unlocked(course: &Course, progress: &ProgressSnapshot, lesson_id: LessonId) -> bool {
    for lesson in course.visible_lessons() {
        if lesson.id() == lesson_id {
            return true;
        }
        if !progress.is_completed(lesson.id()) {
            return false;
        }
    }
    false
}

/// Every unlocked lesson, in course order.
///
/// This is the completed prefix of the visible lessons plus the first lesson
/// that is not yet completed.
#[must_use]
pub fn unlocked_lessons(course: &Course, progress: &ProgressSnapshot) -> Vec<LessonId> {
    let mut unlocked = Vec::new();
    for lesson in course.visible_lessons() {
        unlocked.push(lesson.id());
        if !progress.is_completed(lesson.id()) {
            break;
        }
    }
    unlocked
}

/// True when every visible lesson is completed.
#[must_use]
pub fn is_course_completed(course: &Course, progress: &ProgressSnapshot) -> bool {
    let mut lessons = course.visible_lessons().peekable();
    lessons.peek().is_some() && lessons.all(|l| progress.is_completed(l.id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::demo_course;
    use crate::model::{
        CourseDraft, CourseId, LessonDraft, LessonProgress, ModuleDraft, ModuleId,
    };
    use proptest::prelude::*;

    fn done(ids: &[u64]) -> ProgressSnapshot {
        ids.iter()
            .map(|id| {
                let mut p = LessonProgress::empty(LessonId::new(*id));
                p.lesson_completed = true;
                p
            })
            .collect()
    }

    /// Builds a course from `(visible, lesson_count)` pairs; lesson ids are 1..
    fn shaped_course(shape: &[(bool, usize)]) -> crate::model::Course {
        let mut next_lesson = 1_u64;
        let modules = shape
            .iter()
            .enumerate()
            .map(|(idx, (visible, count))| {
                let lessons = (0..*count)
                    .map(|pos| {
                        let id = next_lesson;
                        next_lesson += 1;
                        LessonDraft {
                            id: LessonId::new(id),
                            topic: format!("L{id}"),
                            order: u32::try_from(pos + 1).unwrap(),
                            introduction: Some("intro".into()),
                            quiz: Vec::new(),
                            assignment: None,
                        }
                    })
                    .collect();
                ModuleDraft {
                    id: ModuleId::new(idx as u64 + 1),
                    name: format!("M{idx}"),
                    order: u32::try_from(idx + 1).unwrap(),
                    is_visible: *visible,
                    lessons,
                }
            })
            .collect();
        CourseDraft {
            id: CourseId::new(1),
            name: "shaped".into(),
            description: None,
            modules,
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn only_first_lesson_open_initially() {
        let course = demo_course();
        let progress = ProgressSnapshot::new();
        assert!(is_lesson_unlocked(&course, &progress, LessonId::new(1)));
        assert!(!is_lesson_unlocked(&course, &progress, LessonId::new(2)));
        assert!(!is_lesson_unlocked(&course, &progress, LessonId::new(3)));
        assert_eq!(unlocked_lessons(&course, &progress), vec![LessonId::new(1)]);
    }

    #[test]
    fn next_module_waits_for_whole_previous_module() {
        let course = demo_course();
        let progress = done(&[1]);
        assert!(is_lesson_unlocked(&course, &progress, LessonId::new(2)));
        assert!(!is_lesson_unlocked(&course, &progress, LessonId::new(3)));

        let progress = done(&[1, 2]);
        assert!(is_lesson_unlocked(&course, &progress, LessonId::new(3)));
        assert!(!is_course_completed(&course, &progress));
        assert!(is_course_completed(&course, &done(&[1, 2, 3])));
    }

    #[test]
    fn completed_later_lesson_does_not_bypass_gate() {
        let course = demo_course();
        let progress = done(&[2]);
        assert!(!is_lesson_unlocked(&course, &progress, LessonId::new(3)));
    }

    #[test]
    fn empty_and_hidden_modules_do_not_block() {
        // M1 empty, M2 hidden with lesson 1, M3 with lessons 2 and 3.
        let course = shaped_course(&[(true, 0), (false, 1), (true, 2)]);
        let progress = ProgressSnapshot::new();
        assert!(!is_lesson_unlocked(&course, &progress, LessonId::new(1)));
        assert!(is_lesson_unlocked(&course, &progress, LessonId::new(2)));
        assert!(!is_lesson_unlocked(&course, &progress, LessonId::new(3)));
        assert!(is_lesson_unlocked(&course, &done(&[2]), LessonId::new(3)));
    }

    #[test]
    fn unknown_lesson_and_empty_course_are_locked() {
        let course = shaped_course(&[]);
        assert!(!is_lesson_unlocked(&course, &ProgressSnapshot::new(), LessonId::new(1)));
        assert!(unlocked_lessons(&course, &ProgressSnapshot::new()).is_empty());
        assert!(!is_course_completed(&course, &ProgressSnapshot::new()));
        assert!(!is_lesson_unlocked(&demo_course(), &ProgressSnapshot::new(), LessonId::new(99)));
    }

    fn shape_strategy() -> impl Strategy<Value = Vec<(bool, usize)>> {
        prop::collection::vec((prop::bool::weighted(0.8), 0_usize..4), 0..5)
    }

    proptest! {
        #[test]
        fn unlocking_is_monotone_in_progress(
            shape in shape_strategy(),
            base in prop::collection::vec(any::<bool>(), 16),
            extra in prop::collection::vec(any::<bool>(), 16),
        ) {
            let course = shaped_course(&shape);
            let total: usize = shape.iter().map(|(_, n)| n).sum();
            let smaller: Vec<u64> = (0..total).filter(|i| base[*i]).map(|i| i as u64 + 1).collect();
            let larger: Vec<u64> = (0..total).filter(|i| base[*i] || extra[*i]).map(|i| i as u64 + 1).collect();
            let p = done(&smaller);
            let p_prime = done(&larger);
            for id in 1..=total as u64 {
                let lesson = LessonId::new(id);
                if is_lesson_unlocked(&course, &p, lesson) {
                    prop_assert!(is_lesson_unlocked(&course, &p_prime, lesson));
                }
            }
        }

        #[test]
        fn first_visible_lesson_is_always_open(
            shape in shape_strategy(),
            bits in prop::collection::vec(any::<bool>(), 16),
        ) {
            let course = shaped_course(&shape);
            let total: usize = shape.iter().map(|(_, n)| n).sum();
            let completed: Vec<u64> = (0..total).filter(|i| bits[*i]).map(|i| i as u64 + 1).collect();
            if let Some(first) = course.visible_lessons().next() {
                prop_assert!(is_lesson_unlocked(&course, &done(&completed), first.id()));
                prop_assert!(is_lesson_unlocked(&course, &ProgressSnapshot::new(), first.id()));
            }
        }
    }
}
