use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CreatorStateError {
    #[error("unknown creator state: {0}")]
    Unknown(String),

    #[error("cannot move course wizard from {from} to {to}")]
    IllegalTransition { from: CreatorState, to: CreatorState },
}

/// Step of the course authoring wizard.
///
/// Steps run strictly in declaration order; `Edit` is terminal and loops on
/// itself once a course has been through every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CreatorState {
    Details,
    ModuleTopics,
    LessonTopics,
    LessonContent,
    Edit,
}

impl CreatorState {
    pub const ALL: [CreatorState; 5] = [
        CreatorState::Details,
        CreatorState::ModuleTopics,
        CreatorState::LessonTopics,
        CreatorState::LessonContent,
        CreatorState::Edit,
    ];

    /// Transition table: the single step that follows this one.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            CreatorState::Details => CreatorState::ModuleTopics,
            CreatorState::ModuleTopics => CreatorState::LessonTopics,
            CreatorState::LessonTopics => CreatorState::LessonContent,
            CreatorState::LessonContent | CreatorState::Edit => CreatorState::Edit,
        }
    }

    #[must_use]
    pub fn can_transition_to(self, to: CreatorState) -> bool {
        self.next() == to
    }

    /// # Errors
    ///
    /// Returns `CreatorStateError::IllegalTransition` unless `to` is `self.next()`.
    pub fn transition_to(self, to: CreatorState) -> Result<CreatorState, CreatorStateError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(CreatorStateError::IllegalTransition { from: self, to })
        }
    }

    #[must_use]
    pub fn as_tag(self) -> &'static str {
        match self {
            CreatorState::Details => "details",
            CreatorState::ModuleTopics => "module-topics",
            CreatorState::LessonTopics => "lesson-topics",
            CreatorState::LessonContent => "lesson-content",
            CreatorState::Edit => "edit",
        }
    }
}

impl fmt::Display for CreatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

impl FromStr for CreatorState {
    type Err = CreatorStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_tag() == s)
            .ok_or_else(|| CreatorStateError::Unknown(s.to_owned()))
    }
}

impl TryFrom<String> for CreatorState {
    type Error = CreatorStateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CreatorState> for String {
    fn from(state: CreatorState) -> Self {
        state.as_tag().to_owned()
    }
}
