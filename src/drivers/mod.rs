mod in_memory_test;
#[cfg(feature = "postgres")]
mod placeholders;
#[cfg(feature = "sqlite")]
mod sqlite;
#[cfg(feature = "postgres")]
mod tokio_postgres;

pub use self::in_memory_test::{
    InMemoryTestDriver, InMemoryTestResponseBuilder, RecordedQuery, ScriptedResponse,
};
#[cfg(feature = "sqlite")]
pub use self::sqlite::SqliteDriver;
#[cfg(feature = "postgres")]
pub use self::tokio_postgres::TokioPostgresDriver;
