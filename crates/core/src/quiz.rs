use std::fmt;
use thiserror::Error;

use crate::model::{AnswerId, Lesson, LessonId, Question, QuestionId, Score, ScoreError};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("lesson {0} has no quiz questions")]
    Empty(LessonId),

    #[error("quiz has too many questions: {0}")]
    TooManyQuestions(usize),

    #[error("quiz has not been started")]
    NotStarted,

    #[error("quiz already completed")]
    Completed,

    #[error("answer {answer} does not belong to question {question}")]
    UnknownAnswer {
        question: QuestionId,
        answer: AnswerId,
    },

    #[error("select an answer before moving on")]
    NoAnswerSelected,

    #[error(transparent)]
    Score(#[from] ScoreError),
}

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

/// Final outcome of one quiz attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizResult {
    pub lesson_id: LessonId,
    pub correct: u32,
    pub total: u32,
    pub score: Score,
}

/// What `advance` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizStep {
    /// Moved on to the question at `index`.
    Next { index: usize },
    /// The last question was scored.
    Completed(QuizResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizState {
    NotStarted,
    InProgress {
        current_index: usize,
        correct_count: u32,
        selected: Option<AnswerId>,
    },
    Completed(QuizResult),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One learner's attempt at one lesson quiz.
///
/// Nothing is persisted mid-attempt: dropping the session loses it, and
/// `restart` begins again at question 1 with no correct answers.
#[derive(Clone)]
pub struct QuizSession {
    lesson_id: LessonId,
    questions: Vec<Question>,
    total: u32,
    state: QuizState,
}

impl QuizSession {
    /// Build a session that has not started yet.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Empty` if the lesson has no questions.
    pub fn new(lesson_id: LessonId, questions: Vec<Question>) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::Empty(lesson_id));
        }
        let total = u32::try_from(questions.len())
            .map_err(|_| QuizError::TooManyQuestions(questions.len()))?;
        Ok(Self {
            lesson_id,
            questions,
            total,
            state: QuizState::NotStarted,
        })
    }

    /// Build a session for `lesson` and place it on the first question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Empty` if the lesson has no quiz stage.
    pub fn start(lesson: &Lesson) -> Result<Self, QuizError> {
        let mut session = Self::new(lesson.id(), lesson.quiz().to_vec())?;
        session.begin();
        Ok(session)
    }

    /// Enter the first question. No effect unless the session is `NotStarted`.
    pub fn begin(&mut self) {
        if self.state == QuizState::NotStarted {
            self.state = QuizState::InProgress {
                current_index: 0,
                correct_count: 0,
                selected: None,
            };
        }
    }

    /// Discard the attempt and return to `NotStarted`.
    pub fn restart(&mut self) {
        self.state = QuizState::NotStarted;
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn state(&self) -> QuizState {
        self.state
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            QuizState::InProgress { current_index, .. } => Some(current_index),
            _ => None,
        }
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.current_index().and_then(|idx| self.questions.get(idx))
    }

    #[must_use]
    pub fn selected(&self) -> Option<AnswerId> {
        match self.state {
            QuizState::InProgress { selected, .. } => selected,
            _ => None,
        }
    }

    #[must_use]
    pub fn result(&self) -> Option<QuizResult> {
        match self.state {
            QuizState::Completed(result) => Some(result),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.state, QuizState::Completed(_))
    }

    /// Record the learner's choice for the current question without advancing.
    ///
    /// Selecting again replaces the earlier choice.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NotStarted` / `QuizError::Completed` outside an
    /// attempt and `QuizError::UnknownAnswer` for an id the current question
    /// does not offer.
    pub fn select_answer(&mut self, answer_id: AnswerId) -> Result<(), QuizError> {
        let question = self.in_progress_question()?;
        if question.answer(answer_id).is_none() {
            return Err(QuizError::UnknownAnswer {
                question: question.id(),
                answer: answer_id,
            });
        }
        if let QuizState::InProgress { selected, .. } = &mut self.state {
            *selected = Some(answer_id);
        }
        Ok(())
    }

    /// Score the current question and move on, or finish the attempt.
    ///
    /// Only the current question is looked at; earlier ones are fixed once
    /// advanced past.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::NoAnswerSelected` when nothing is selected, and
    /// `QuizError::NotStarted` / `QuizError::Completed` outside an attempt.
    pub fn advance(&mut self) -> Result<QuizStep, QuizError> {
        let QuizState::InProgress {
            current_index,
            correct_count,
            selected,
        } = self.state
        else {
            return Err(self.not_in_progress());
        };
        let answer_id = selected.ok_or(QuizError::NoAnswerSelected)?;
        let question = self
            .questions
            .get(current_index)
            .ok_or(QuizError::Completed)?;

        // First answer with a matching id decides; zero-correct questions never score.
        let is_correct = question.answer(answer_id).is_some_and(|a| a.is_correct);
        let correct_count = if is_correct {
            correct_count.saturating_add(1)
        } else {
            correct_count
        };

        let next_index = current_index + 1;
        if next_index < self.questions.len() {
            self.state = QuizState::InProgress {
                current_index: next_index,
                correct_count,
                selected: None,
            };
            return Ok(QuizStep::Next { index: next_index });
        }

        let result = QuizResult {
            lesson_id: self.lesson_id,
            correct: correct_count,
            total: self.total,
            score: Score::from_ratio(correct_count, self.total)?,
        };
        self.state = QuizState::Completed(result);
        Ok(QuizStep::Completed(result))
    }

    fn in_progress_question(&self) -> Result<&Question, QuizError> {
        match self.state {
            QuizState::InProgress { current_index, .. } => self
                .questions
                .get(current_index)
                .ok_or(QuizError::Completed),
            _ => Err(self.not_in_progress()),
        }
    }

    fn not_in_progress(&self) -> QuizError {
        match self.state {
            QuizState::Completed(_) => QuizError::Completed,
            _ => QuizError::NotStarted,
        }
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("lesson_id", &self.lesson_id)
            .field("questions_len", &self.questions.len())
            .field("state", &self.state)
            .finish()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
