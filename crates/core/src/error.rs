use thiserror::Error;

use crate::model::{CourseError, CreatorStateError, PublicationError, RatingError, ScoreError};
use crate::quiz::QuizError;

/// Any domain rule violation raised by this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Publication(#[from] PublicationError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Creator(#[from] CreatorStateError),
    #[error(transparent)]
    Rating(#[from] RatingError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CreatorState, Rating, Score};

    fn parse_step(raw: &str, score: u32) -> Result<(CreatorState, Score), Error> {
        Ok((raw.parse()?, Score::new(score)?))
    }

    #[test]
    fn domain_errors_convert_with_question_mark() {
        assert!(matches!(parse_step("nowhere", 10), Err(Error::Creator(_))));
        assert!(matches!(parse_step("edit", 101), Err(Error::Score(_))));

        let stars = |raw: u32| -> Result<Rating, Error> { Ok(Rating::new(raw)?) };
        assert!(matches!(stars(0), Err(Error::Rating(_))));
    }
}
