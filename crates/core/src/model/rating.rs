use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum RatingError {
    #[error("rating must be between 1 and 5, got {0}")]
    OutOfRange(u32),

    #[error("average rating must be between 0 and 5, got {0}")]
    InvalidAverage(f64),
}

/// A learner's star rating of a course, `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 5;

    /// # Errors
    ///
    /// Returns `RatingError::OutOfRange` outside `1..=5`.
    pub fn new(value: u32) -> Result<Self, RatingError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            u8::try_from(value)
                .map(Self)
                .map_err(|_| RatingError::OutOfRange(value))
        } else {
            Err(RatingError::OutOfRange(value))
        }
    }

    #[must_use]
    pub fn value(self) -> u32 {
        u32::from(self.0)
    }
}

impl TryFrom<u32> for Rating {
    type Error = RatingError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u32 {
    fn from(rating: Rating) -> Self {
        rating.value()
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/5", self.0)
    }
}

/// Course-wide rating: the mean of every learner's latest rating.
///
/// `count` is `None` when the backend only reports the average.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: Option<u32>,
}

impl RatingSummary {
    #[must_use]
    pub fn from_ratings(ratings: impl IntoIterator<Item = Rating>) -> Self {
        let (sum, count) = ratings
            .into_iter()
            .fold((0_u32, 0_u32), |(sum, count), r| (sum + r.value(), count + 1));
        let average = (count > 0).then(|| f64::from(sum) / f64::from(count));
        Self {
            average,
            count: Some(count),
        }
    }

    /// Summary from a bare average reported by a remote backend.
    ///
    /// # Errors
    ///
    /// Returns `RatingError::InvalidAverage` unless `0 <= average <= 5`.
    pub fn from_average(average: f64) -> Result<Self, RatingError> {
        if !(0.0..=f64::from(Rating::MAX)).contains(&average) {
            return Err(RatingError::InvalidAverage(average));
        }
        Ok(Self {
            average: Some(average),
            count: None,
        })
    }

    /// Average rounded to one decimal, the way course cards show it.
    #[must_use]
    pub fn rounded_average(&self) -> Option<f64> {
        self.average.map(|a| (a * 10.0).round() / 10.0)
    }
}

impl fmt::Display for RatingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.rounded_average(), self.count) {
            (None, _) => f.write_str("no ratings yet"),
            (Some(avg), Some(1)) => write!(f, "{avg:.1}/5 (1 rating)"),
            (Some(avg), Some(n)) => write!(f, "{avg:.1}/5 ({n} ratings)"),
            (Some(avg), None) => write!(f, "{avg:.1}/5"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_to_five_stars() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert_eq!(Rating::new(5).unwrap().value(), 5);
        assert!(serde_json::from_str::<Rating>("9").is_err());
        assert_eq!(serde_json::from_str::<Rating>("3").unwrap(), Rating::new(3).unwrap());
    }

    #[test]
    fn summary_averages_and_rounds_to_one_decimal() {
        let ratings = [4, 5, 4].map(|v| Rating::new(v).unwrap());
        let summary = RatingSummary::from_ratings(ratings);
        assert_eq!(summary.count, Some(3));
        assert_eq!(summary.rounded_average(), Some(4.3));
        assert_eq!(summary.to_string(), "4.3/5 (3 ratings)");

        let empty = RatingSummary::from_ratings(std::iter::empty());
        assert_eq!(empty.average, None);
        assert_eq!(empty.to_string(), "no ratings yet");
    }

    #[test]
    fn remote_average_is_range_checked() {
        assert!(RatingSummary::from_average(5.5).is_err());
        assert!(RatingSummary::from_average(f64::NAN).is_err());
        assert_eq!(
            RatingSummary::from_average(3.25).unwrap().to_string(),
            "3.3/5"
        );
    }
}
