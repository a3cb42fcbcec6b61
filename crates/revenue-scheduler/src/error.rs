use thiserror::Error;

/// Errors that can occur within the scheduler itself.
///
/// Stage failures are not errors at this level: they are recorded in the
/// task history and reflected in the run outcome.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The provided schedule definition is invalid or unsupported.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// No job with the given name exists in the store.
    #[error("Job not found: {name}")]
    JobNotFound { name: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
