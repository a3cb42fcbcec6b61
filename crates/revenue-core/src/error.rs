use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RevenueError {
    /// The relational source is unreachable or rejected the query.
    #[error("Data source error: {0}")]
    Connectivity(String),

    /// A stage's expected input snapshot does not exist.
    #[error("Missing input: {} does not exist", .path.display())]
    MissingInput { path: PathBuf },

    /// Input exists but a column is missing or a value does not coerce.
    #[error("Schema error in {origin}: {reason}")]
    Schema { origin: String, reason: String },

    /// The output location could not be written.
    #[error("Write failed for {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RevenueError {
    /// Short error code string recorded in task history.
    pub fn code(&self) -> &'static str {
        match self {
            RevenueError::Connectivity(_) => "CONNECTIVITY_ERROR",
            RevenueError::MissingInput { .. } => "MISSING_INPUT",
            RevenueError::Schema { .. } => "SCHEMA_ERROR",
            RevenueError::Write { .. } => "WRITE_ERROR",
            RevenueError::Render(_) => "RENDER_ERROR",
            RevenueError::Config(_) => "CONFIG_ERROR",
            RevenueError::Io(_) => "IO_ERROR",
        }
    }

    pub fn schema(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        RevenueError::Schema {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RevenueError::Write {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, RevenueError>;
