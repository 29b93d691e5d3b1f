pub mod repository;
pub mod sqlite;

pub use repository::{
    CourseRepository, EnrollmentRepository, InMemoryRepository, ProgressRepository,
    RatingRepository, Storage, StorageError,
};
