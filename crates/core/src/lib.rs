#![forbid(unsafe_code)]

pub mod completion;
pub mod dashboard;
pub mod demo;
pub mod error;
pub mod model;
pub mod quiz;
pub mod stats;
pub mod time;
pub mod unlock;

pub use error::Error;
pub use time::Clock;
