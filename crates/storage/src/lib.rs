#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    BadgeRepository, EventRepository, FeedbackRepository, InMemoryRepository, LearnerRepository,
    ProgressRepository, Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
