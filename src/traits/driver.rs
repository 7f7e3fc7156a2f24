use async_trait::async_trait;

use crate::error::DriverError;
use crate::types::{Binding, RawQueryResult};

/// How fetched values are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueMode {
    /// Keep the type the database reported.
    #[default]
    Native,
    /// Coerce every non-null value to text.
    Stringify,
}

/// Handle settings applied once when a [`Connection`](crate::Connection) is
/// created.
///
/// Errors are always reported through `Result` and rows are always keyed by
/// column name, so only the value representation is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandleConfig {
    pub value_mode: ValueMode,
}

/// Trait for database driver implementations.
/// Drivers are responsible for:
/// - Preparing statements and binding each [`Binding`] under its placeholder
/// - Executing queries and converting results to RawQueryResult
/// - Reporting generated identifiers
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Apply handle settings. Called once by `Connection::new`.
    async fn configure(&self, config: HandleConfig) -> Result<(), DriverError>;

    /// Run a statement and collect every row it returns.
    async fn query(&self, sql: &str, params: &[Binding]) -> Result<RawQueryResult, DriverError>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, sql: &str, params: &[Binding]) -> Result<u64, DriverError>;

    /// Identifier generated by the most recent insert, as reported by the
    /// database. Drivers that track identifiers per sequence use `sequence`.
    async fn last_insert_id(&self, sequence: Option<&str>) -> Result<String, DriverError>;

    /// Run an insert and report the identifier it generated.
    ///
    /// The default runs [`execute`](Self::execute) then
    /// [`last_insert_id`](Self::last_insert_id) as two calls; drivers shared
    /// between tasks override it so no other write lands in between.
    async fn insert_returning_id(
        &self,
        sql: &str,
        params: &[Binding],
        sequence: Option<&str>,
    ) -> Result<String, DriverError> {
        self.execute(sql, params).await?;
        self.last_insert_id(sequence).await
    }
}
