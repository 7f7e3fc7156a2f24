use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::DriverError;
use crate::traits::{DatabaseDriver, HandleConfig, ValueMode};
use crate::types::{Binding, RawQueryResult, RowValue};

/// A recorded query execution for verification.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    pub sql: String,
    pub params: Vec<Binding>,
}

/// A scripted outcome for the next driver call.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Rows(RawQueryResult),
    AffectedRows(u64),
    Failure(String),
}

/// An in-memory database driver for testing.
///
/// Allows configuring expected responses and verifying executed queries.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use dbrs::drivers::{InMemoryTestDriver, InMemoryTestResponseBuilder};
///
/// let driver = Arc::new(
///     InMemoryTestDriver::new().with_response(
///         InMemoryTestResponseBuilder::new()
///             .columns(&["id", "name"])
///             .row(vec![1.into(), "Alice".into()])
///             .build(),
///     ),
/// );
/// ```
pub struct InMemoryTestDriver {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    insert_ids: Mutex<VecDeque<String>>,
    recorded_queries: Mutex<Vec<RecordedQuery>>,
    config: Mutex<Option<HandleConfig>>,
    default_response: RawQueryResult,
}

impl InMemoryTestDriver {
    /// Create a new in-memory test driver with no pre-configured responses.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            insert_ids: Mutex::new(VecDeque::new()),
            recorded_queries: Mutex::new(Vec::new()),
            config: Mutex::new(None),
            default_response: RawQueryResult::empty(),
        }
    }

    /// Add a result set to be returned by the next call.
    /// Responses are returned in FIFO order.
    pub fn with_response(self, response: RawQueryResult) -> Self {
        self.push(ScriptedResponse::Rows(response))
    }

    /// Add multiple result sets to be returned by subsequent calls.
    pub fn with_responses(self, responses: impl IntoIterator<Item = RawQueryResult>) -> Self {
        let mut queue = self.responses.lock().unwrap();
        for response in responses {
            queue.push_back(ScriptedResponse::Rows(response));
        }
        drop(queue);
        self
    }

    /// Make the next call report `count` affected rows.
    pub fn with_affected_rows(self, count: u64) -> Self {
        self.push(ScriptedResponse::AffectedRows(count))
    }

    /// Make the next call fail with a driver error.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(ScriptedResponse::Failure(message.into()))
    }

    /// Queue the identifier returned by the next `last_insert_id` call.
    pub fn with_insert_id(self, id: impl Into<String>) -> Self {
        self.insert_ids.lock().unwrap().push_back(id.into());
        self
    }

    /// Set a default response to use when no queued responses remain.
    pub fn with_default_response(mut self, response: RawQueryResult) -> Self {
        self.default_response = response;
        self
    }

    fn push(self, response: ScriptedResponse) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    fn record(&self, sql: &str, params: &[Binding]) -> Option<ScriptedResponse> {
        self.recorded_queries.lock().unwrap().push(RecordedQuery {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        self.responses.lock().unwrap().pop_front()
    }

    /// The configuration applied by `configure`, if it has been called.
    pub fn applied_config(&self) -> Option<HandleConfig> {
        *self.config.lock().unwrap()
    }

    /// Get all recorded queries that have been executed.
    pub fn recorded_queries(&self) -> Vec<RecordedQuery> {
        self.recorded_queries.lock().unwrap().clone()
    }

    /// Get the last recorded query, if any.
    pub fn last_query(&self) -> Option<RecordedQuery> {
        self.recorded_queries.lock().unwrap().last().cloned()
    }

    /// Clear all recorded queries.
    pub fn clear_recorded_queries(&self) {
        self.recorded_queries.lock().unwrap().clear();
    }

    /// Assert that the last query matches the expected SQL and parameters.
    pub fn assert_last_query(&self, expected_sql: &str, expected_params: &[Binding]) {
        let last = self.last_query().expect("No queries were recorded");
        assert_eq!(
            last.sql, expected_sql,
            "SQL mismatch.\nExpected: {}\nActual: {}",
            expected_sql, last.sql
        );
        assert_eq!(
            last.params, expected_params,
            "Parameters mismatch.\nExpected: {:?}\nActual: {:?}",
            expected_params, last.params
        );
    }

    /// Assert that exactly n queries were executed.
    pub fn assert_query_count(&self, expected: usize) {
        let actual = self.recorded_queries.lock().unwrap().len();
        assert_eq!(
            actual, expected,
            "Query count mismatch. Expected: {}, Actual: {}",
            expected, actual
        );
    }
}

impl Default for InMemoryTestDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for InMemoryTestDriver {
    async fn configure(&self, config: HandleConfig) -> Result<(), DriverError> {
        *self.config.lock().unwrap() = Some(config);
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Binding]) -> Result<RawQueryResult, DriverError> {
        let mut result = match self.record(sql, params) {
            Some(ScriptedResponse::Rows(rows)) => rows,
            Some(ScriptedResponse::AffectedRows(_)) => RawQueryResult::empty(),
            Some(ScriptedResponse::Failure(message)) => return Err(DriverError::Other(message)),
            None => self.default_response.clone(),
        };

        if self.applied_config().map(|c| c.value_mode) == Some(ValueMode::Stringify) {
            for value in result.rows.iter_mut().flatten() {
                *value = std::mem::replace(value, RowValue::Null).into_text();
            }
        }
        Ok(result)
    }

    async fn execute(&self, sql: &str, params: &[Binding]) -> Result<u64, DriverError> {
        match self.record(sql, params) {
            Some(ScriptedResponse::AffectedRows(count)) => Ok(count),
            Some(ScriptedResponse::Rows(rows)) => Ok(rows.rows.len() as u64),
            Some(ScriptedResponse::Failure(message)) => Err(DriverError::Other(message)),
            None => Ok(0),
        }
    }

    async fn last_insert_id(&self, _sequence: Option<&str>) -> Result<String, DriverError> {
        Ok(self
            .insert_ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "0".to_string()))
    }
}

/// Builder for creating test responses easily.
pub struct InMemoryTestResponseBuilder {
    columns: Vec<String>,
    rows: Vec<Vec<RowValue>>,
}

impl InMemoryTestResponseBuilder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Set the column names for the response.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add a row of values.
    pub fn row(mut self, values: Vec<RowValue>) -> Self {
        self.rows.push(values);
        self
    }

    /// Build the RawQueryResult.
    pub fn build(self) -> RawQueryResult {
        RawQueryResult::new(self.columns, self.rows)
    }
}

impl Default for InMemoryTestResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
