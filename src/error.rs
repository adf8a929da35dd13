//! Error handling module for partsql
//!
//! Provides the error taxonomy for a partitioned SQL run using thiserror.
//! Errors split into two groups: pre-dispatch errors abort before any shard
//! is touched, shard-scoped errors are recorded against a single job.

use thiserror::Error;

/// Main error type for partsql
#[derive(Error, Debug)]
pub enum PartSqlError {
    /// Operation name is not registered
    #[error("Unknown SQL template '{name}'")]
    TemplateNotFound { name: String },

    /// Chunk size must be a positive integer
    #[error("Invalid chunk size {0}: must be a positive integer")]
    InvalidChunkSize(i64),

    /// Target shards could not be resolved
    #[error("Shard resolution failed: {0}")]
    ShardResolution(String),

    /// Operator declined the multi-shard confirmation prompt
    #[error("Aborted: execution on {shards} databases was not confirmed")]
    UserDeclined { shards: usize },

    /// Drain-loop batch did not return exactly one row with one integer column
    #[error("Protocol violation on {shard}: {detail}")]
    ProtocolViolation { shard: String, detail: String },

    /// Statement failed on the server
    #[error("Execution failed on {shard}: {message}")]
    Execution { shard: String, message: String },

    /// Could not open a connection to the shard
    #[error("Connection to {shard} failed: {message}")]
    Connect { shard: String, message: String },

    /// Job task panicked before reaching a terminal state
    #[error("Job on {shard} panicked")]
    TaskPanicked { shard: String },

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors (confirmation prompt, config file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for partsql operations
pub type Result<T> = std::result::Result<T, PartSqlError>;

impl PartSqlError {
    /// Create a template lookup error
    pub fn template_not_found(name: impl Into<String>) -> Self {
        Self::TemplateNotFound { name: name.into() }
    }

    /// Create a shard resolution error
    pub fn shard_resolution(msg: impl Into<String>) -> Self {
        Self::ShardResolution(msg.into())
    }

    /// Create a drain-loop protocol error
    pub fn protocol(shard: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            shard: shard.into(),
            detail: detail.into(),
        }
    }

    /// Create a statement execution error
    pub fn execution(shard: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            shard: shard.into(),
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connect(shard: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            shard: shard.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for errors raised before any job is created.
    pub fn is_pre_dispatch(&self) -> bool {
        matches!(
            self,
            Self::TemplateNotFound { .. }
                | Self::InvalidChunkSize(_)
                | Self::ShardResolution(_)
                | Self::UserDeclined { .. }
        )
    }
}
