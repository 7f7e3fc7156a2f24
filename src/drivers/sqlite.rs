use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::types::{Null, ValueRef};
use rusqlite::{Connection, Statement};

use crate::error::DriverError;
use crate::traits::{DatabaseDriver, HandleConfig, ValueMode};
use crate::types::{BindValue, Binding, Placeholder, RawQueryResult, RowValue};

/// SQLite driver implementation using rusqlite.
///
/// Calls run on the caller's thread; the connection is serialized behind a
/// mutex.
pub struct SqliteDriver {
    conn: Mutex<Connection>,
    stringify: AtomicBool,
}

impl SqliteDriver {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DriverError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wrap an already open rusqlite connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            stringify: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DriverError> {
        self.conn
            .lock()
            .map_err(|_| DriverError::Other("sqlite connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl DatabaseDriver for SqliteDriver {
    async fn configure(&self, config: HandleConfig) -> Result<(), DriverError> {
        self.stringify
            .store(config.value_mode == ValueMode::Stringify, Ordering::Relaxed);
        Ok(())
    }

    async fn query(&self, sql: &str, params: &[Binding]) -> Result<RawQueryResult, DriverError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        bind_all(&mut stmt, params)?;

        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let stringify = self.stringify.load(Ordering::Relaxed);

        let mut rows = stmt.raw_query();
        let mut result_rows = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(extract_value(row.get_ref(i)?, stringify));
            }
            result_rows.push(values);
        }

        Ok(RawQueryResult::new(columns, result_rows))
    }

    async fn execute(&self, sql: &str, params: &[Binding]) -> Result<u64, DriverError> {
        let conn: MutexGuard<'_, Connection> = self.lock()?;
        execute_on(&conn, sql, params)
    }

    async fn last_insert_id(&self, _sequence: Option<&str>) -> Result<String, DriverError> {
        Ok(self.lock()?.last_insert_rowid().to_string())
    }

    async fn insert_returning_id(
        &self,
        sql: &str,
        params: &[Binding],
        _sequence: Option<&str>,
    ) -> Result<String, DriverError> {
        let conn = self.lock()?;
        execute_on(&conn, sql, params)?;
        Ok(conn.last_insert_rowid().to_string())
    }
}

fn execute_on(conn: &Connection, sql: &str, params: &[Binding]) -> Result<u64, DriverError> {
    let mut stmt = conn.prepare(sql)?;
    bind_all(&mut stmt, params)?;

    // Statements that yield rows (RETURNING, PRAGMA) are stepped to completion.
    if stmt.column_count() > 0 {
        let mut rows = stmt.raw_query();
        while rows.next()?.is_some() {}
        drop(rows);
        drop(stmt);
        return Ok(conn.changes() as u64);
    }

    Ok(stmt.raw_execute()? as u64)
}

fn bind_all(stmt: &mut Statement<'_>, params: &[Binding]) -> Result<(), DriverError> {
    for binding in params {
        let index = match &binding.placeholder {
            Placeholder::Positional(position) => *position,
            Placeholder::Named(name) => {
                let name = sqlite_parameter_name(name);
                stmt.parameter_index(&name)?
                    .ok_or(DriverError::UnknownParameter(name))?
            }
        };
        match &binding.value {
            BindValue::Null => stmt.raw_bind_parameter(index, Null)?,
            BindValue::Bool(b) => stmt.raw_bind_parameter(index, *b)?,
            BindValue::Int(i) => stmt.raw_bind_parameter(index, *i)?,
            BindValue::Str(s) => stmt.raw_bind_parameter(index, s.as_str())?,
        }
    }
    Ok(())
}

/// SQLite parameter names carry their prefix; bare names default to `:`.
fn sqlite_parameter_name(name: &str) -> String {
    if name.starts_with([':', '@', '$']) {
        name.to_string()
    } else {
        format!(":{}", name)
    }
}

fn extract_value(value: ValueRef<'_>, stringify: bool) -> RowValue {
    let value = match value {
        ValueRef::Null => RowValue::Null,
        ValueRef::Integer(i) => RowValue::Int(i),
        ValueRef::Real(f) => RowValue::Float(f),
        ValueRef::Text(bytes) => RowValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => RowValue::Blob(bytes.to_vec()),
    };
    if stringify {
        value.into_text()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{resolve_bindings, BoundValues};

    async fn users_driver() -> SqliteDriver {
        let driver = SqliteDriver::open_in_memory().unwrap();
        driver
            .execute(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL)",
                &[],
            )
            .await
            .unwrap();
        driver
    }

    #[test]
    fn test_parameter_name_prefix() {
        assert_eq!(sqlite_parameter_name("name"), ":name");
        assert_eq!(sqlite_parameter_name(":name"), ":name");
        assert_eq!(sqlite_parameter_name("@name"), "@name");
        assert_eq!(sqlite_parameter_name("$name"), "$name");
    }

    #[tokio::test]
    async fn test_named_and_positional_binding() {
        let driver = users_driver().await;

        let named = resolve_bindings(&BoundValues::new().with("name", "Ann").with(":score", 1.5));
        let affected = driver
            .execute(
                "INSERT INTO users (name, score) VALUES (:name, :score)",
                &named,
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let positional = resolve_bindings(&BoundValues::new().with(7, "Ann"));
        let result = driver
            .query("SELECT id, name, score FROM users WHERE name = ?", &positional)
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["id", "name", "score"]);
        assert_eq!(
            result.rows,
            vec![vec![
                RowValue::Int(1),
                RowValue::Text("Ann".to_string()),
                RowValue::Float(1.5),
            ]]
        );
    }

    #[tokio::test]
    async fn test_unknown_named_parameter() {
        let driver = users_driver().await;
        let bindings = resolve_bindings(&BoundValues::new().with("missing", 1));
        let err = driver
            .query("SELECT * FROM users WHERE id = :id", &bindings)
            .await
            .unwrap_err();
        assert!(matches!(err, DriverError::UnknownParameter(name) if name == ":missing"));
    }

    #[tokio::test]
    async fn test_stringify_mode() {
        let driver = users_driver().await;
        driver
            .configure(HandleConfig {
                value_mode: ValueMode::Stringify,
            })
            .await
            .unwrap();
        driver
            .execute("INSERT INTO users (name, score) VALUES ('Bo', 2.0)", &[])
            .await
            .unwrap();

        let result = driver.query("SELECT id, score FROM users", &[]).await.unwrap();
        assert_eq!(
            result.rows,
            vec![vec![
                RowValue::Text("1".to_string()),
                RowValue::Text("2".to_string()),
            ]]
        );
    }

    #[tokio::test]
    async fn test_last_insert_id_and_returning() {
        let driver = users_driver().await;
        driver
            .execute("INSERT INTO users (name) VALUES ('a'), ('b')", &[])
            .await
            .unwrap();
        assert_eq!(driver.last_insert_id(None).await.unwrap(), "2");

        let affected = driver
            .execute("UPDATE users SET name = 'c' RETURNING id", &[])
            .await
            .unwrap();
        assert_eq!(affected, 2);
    }

    #[tokio::test]
    async fn test_insert_returning_id() {
        let driver = users_driver().await;
        let bindings = resolve_bindings(&BoundValues::new().with("name", "Ann"));
        let id = driver
            .insert_returning_id("INSERT INTO users (name) VALUES (:name)", &bindings, None)
            .await
            .unwrap();
        assert_eq!(id, "1");
    }
}
