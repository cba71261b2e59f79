//! Error types for verdict-core

use thiserror::Error;

/// Result type alias for verdict operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type shared by engines, the registry and the runtime
#[derive(Error, Debug)]
pub enum Error {
    /// An engine with the same name is already registered
    #[error("Engine already registered: {0}")]
    DuplicateEngineName(String),

    /// An engine was requested by name but is not registered
    #[error("Engine not found: {0}")]
    EngineNotFound(String),

    /// An engine's run failed
    #[error("Engine {engine} failed: {reason}")]
    Execution {
        engine: String,
        reason: String,
    },

    /// An engine did not finish before the batch deadline
    #[error("Engine {engine} timed out after {after_ms}ms")]
    Timeout {
        engine: String,
        after_ms: u64,
    },

    /// An envelope carried quality metadata outside its valid range
    #[error("Invalid quality metadata from {engine}: {field} = {value}")]
    InvalidQualityMeta {
        engine: String,
        field: &'static str,
        value: f64,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for an [`Error::Execution`] raised by an engine
    pub fn execution(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Execution {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error belongs to a single engine rather than the batch
    pub fn is_engine_local(&self) -> bool {
        matches!(
            self,
            Self::Execution { .. } | Self::Timeout { .. } | Self::InvalidQualityMeta { .. }
        )
    }
}

/// Convert anyhow::Error to Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(format!("{err:#}"))
    }
}
