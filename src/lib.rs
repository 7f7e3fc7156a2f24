//! dbrs - a thin query-execution wrapper over SQLite and PostgreSQL handles
//!
//! Queries are complete SQL strings; values are bound by position (`?`) or by
//! name (`:name`). Driver failures come back as [`DbRsError::Query`] with the
//! query text and bound values attached.
//!
//! # Example
//! ```ignore
//! use dbrs::{bound, Connection, InsertId};
//!
//! let conn = Connection::connect("sqlite::memory:").await?;
//! conn.statement("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", &bound! {})
//!     .await?;
//!
//! let id = conn
//!     .insert_get_id("INSERT INTO users (name) VALUES (:name)", &bound! { "name" => "Ann" }, None)
//!     .await?;
//! assert_eq!(id, InsertId::Int(1));
//!
//! let row = conn
//!     .select_first("SELECT * FROM users WHERE id = ?", &bound! { 1 => 1 })
//!     .await?;
//! ```

#[macro_use]
mod macros;

pub mod config;
pub mod drivers;
pub mod error;
pub mod traits;
pub mod types;

mod connection;

// Re-export main types for convenient access
pub use config::{ConnectOptions, PostgresDsn};
pub use connection::Connection;
pub use error::{DbRsError, DriverError, Result};
pub use traits::{DatabaseDriver, HandleConfig, ValueMode};
pub use types::{BoundValues, InsertId, ParamKey, RawQueryResult, Row, RowValue, SqlValue};
