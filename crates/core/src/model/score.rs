use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("score must be between 0 and 100, got {0}")]
    OutOfRange(u32),

    #[error("cannot score a ratio with zero total")]
    ZeroTotal,

    #[error("correct count ({correct}) exceeds total ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("score thresholds must satisfy borderline <= pass <= strong <= 100")]
    InvalidThresholds,
}

//
// ─── SCORE ─────────────────────────────────────────────────────────────────────
//

/// Percentage score in `0..=100`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Score(u8);

impl Score {
    pub const ZERO: Score = Score(0);
    pub const MAX: Score = Score(100);

    /// Creates a score from a whole percentage.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::OutOfRange` if `value > 100`.
    pub fn new(value: u32) -> Result<Self, ScoreError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Self)
            .ok_or(ScoreError::OutOfRange(value))
    }

    /// `round(correct / total * 100)`, with halves rounded up.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::ZeroTotal` for an empty total and
    /// `ScoreError::CorrectExceedsTotal` when `correct > total`.
    pub fn from_ratio(correct: u32, total: u32) -> Result<Self, ScoreError> {
        if total == 0 {
            return Err(ScoreError::ZeroTotal);
        }
        if correct > total {
            return Err(ScoreError::CorrectExceedsTotal { correct, total });
        }
        let numerator = u64::from(correct) * 200 + u64::from(total);
        let percent = numerator / (u64::from(total) * 2);
        Self::new(u32::try_from(percent).unwrap_or(u32::MAX))
    }

    #[must_use]
    pub fn value(self) -> u32 {
        u32::from(self.0)
    }

    /// Keeps the better of two optional scores.
    #[must_use]
    pub fn best_of(current: Option<Score>, candidate: Score) -> Score {
        current.map_or(candidate, |c| c.max(candidate))
    }
}

impl TryFrom<u32> for Score {
    type Error = ScoreError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for u32 {
    fn from(score: Score) -> Self {
        score.value()
    }
}

impl fmt::Debug for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Score({}%)", self.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

//
// ─── THRESHOLDS ────────────────────────────────────────────────────────────────
//

/// Display tier for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    /// At or above the strong threshold.
    Strong,
    /// At or above the borderline threshold but below strong.
    Borderline,
    Failing,
}

/// Score cut-offs used for pass/fail and display tiers.
///
/// `pass` gates assignment completion; `strong` and `borderline` only drive
/// presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreThresholds {
    pass: Score,
    strong: Score,
    borderline: Score,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            pass: Score(70),
            strong: Score(75),
            borderline: Score(50),
        }
    }
}

impl ScoreThresholds {
    /// Creates custom thresholds.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::InvalidThresholds` unless
    /// `borderline <= pass <= strong`.
    pub fn new(pass: Score, strong: Score, borderline: Score) -> Result<Self, ScoreError> {
        if borderline > pass || pass > strong {
            return Err(ScoreError::InvalidThresholds);
        }
        Ok(Self {
            pass,
            strong,
            borderline,
        })
    }

    #[must_use]
    pub fn pass(&self) -> Score {
        self.pass
    }

    #[must_use]
    pub fn strong(&self) -> Score {
        self.strong
    }

    #[must_use]
    pub fn borderline(&self) -> Score {
        self.borderline
    }

    /// Inclusive lower bound: a score equal to `pass` passes.
    #[must_use]
    pub fn passes(&self, score: Score) -> bool {
        score >= self.pass
    }

    #[must_use]
    pub fn tier(&self, score: Score) -> ScoreTier {
        if score >= self.strong {
            ScoreTier::Strong
        } else if score >= self.borderline {
            ScoreTier::Borderline
        } else {
            ScoreTier::Failing
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
