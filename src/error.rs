use thiserror::Error;

use crate::types::{BoundValues, ParamKey};

/// Error type for dbrs operations
#[derive(Debug, Error)]
pub enum DbRsError {
    /// A bound value outside {null, boolean, integer, float, string}.
    #[error("Invalid value for placeholder {placeholder}: {actual_type} cannot be bound")]
    InvalidArgument {
        placeholder: ParamKey,
        actual_type: &'static str,
    },

    #[error("Bound values must be a JSON object or array, got {actual_type}")]
    InvalidBoundValues { actual_type: &'static str },

    #[error("Query failed: {source} (query: {query})")]
    Query {
        query: String,
        values: BoundValues,
        #[source]
        source: DriverError,
    },

    #[error("Connection failed: {source} (target: {target})")]
    Connection {
        target: String,
        #[source]
        source: DriverError,
    },

    #[error("Invalid connection string: {0}")]
    InvalidDsn(String),
}

impl DbRsError {
    /// The driver error behind a wrapped failure, if any.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            DbRsError::Query { source, .. } | DbRsError::Connection { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Error raised by a [`DatabaseDriver`](crate::DatabaseDriver) implementation.
#[derive(Debug, Error)]
pub enum DriverError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Query mixes positional and named placeholders")]
    MixedPlaceholders,

    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Unsupported column type: {0}")]
    UnsupportedColumnType(String),

    #[error("Could not decode {type_name} value: {source}")]
    Decode {
        type_name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for dbrs operations
pub type Result<T> = std::result::Result<T, DbRsError>;
