pub mod db_pool;
pub mod executor;
pub mod registry;
pub mod schema;

use r2d2::Pool;
use regex::Regex;
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

use crate::db::db_pool::SqliteConnectionManager;

#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite rejected a statement, including generated SQL.
    #[error("SQL execution failed: {0}")]
    Execution(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("table '{0}' not found")]
    TableNotFound(String),
    #[error("database '{0}' not found")]
    DatabaseNotFound(String),
    #[error("invalid identifier '{0}': use letters, digits and underscores only")]
    InvalidIdentifier(String),
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database task failed: {0}")]
    Task(String),
}

impl DbError {
    pub fn kind(&self) -> &'static str {
        match self {
            DbError::Execution(_) => "execution_error",
            DbError::TableNotFound(_) | DbError::DatabaseNotFound(_) => "not_found",
            DbError::InvalidIdentifier(_) | DbError::InvalidUpload(_) => "invalid_input",
            DbError::Pool(_) | DbError::Io(_) | DbError::Task(_) => "internal_error",
        }
    }
}

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("identifier pattern is valid"));

/// Basic identifier check for names that end up in paths or URLs.
pub fn is_safe_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Quotes an identifier for SQLite, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Where a request's connection comes from.
///
/// Either way the connection lives only for the closure passed to
/// [`with_connection`](Self::with_connection) and is released on every exit path.
#[derive(Clone)]
pub enum DbHandle {
    Pooled(Pool<SqliteConnectionManager>),
    File(PathBuf),
}

impl DbHandle {
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        match self {
            DbHandle::Pooled(pool) => {
                let conn = pool.get()?;
                f(&conn)
            }
            DbHandle::File(path) => {
                let conn = Connection::open_with_flags(
                    path,
                    OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI,
                )?;
                f(&conn)
            }
        }
    }

    /// Runs `f` on the blocking thread pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T, DbError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, DbError> + Send + 'static,
    {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || handle.with_connection(f))
            .await
            .map_err(|e| DbError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_check() {
        assert!(is_safe_identifier("northwind"));
        assert!(is_safe_identifier("_sales_2024"));
        assert!(!is_safe_identifier("2024_sales"));
        assert!(!is_safe_identifier("../etc/passwd"));
        assert!(!is_safe_identifier("drop table;"));
        assert!(!is_safe_identifier(""));
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_identifier("Order Details"), "\"Order Details\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[tokio::test]
    async fn file_handle_runs_closure_on_blocking_pool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (41);")
            .unwrap();

        let value: i64 = DbHandle::File(path)
            .run(|conn| Ok(conn.query_row("SELECT x + 1 FROM t", [], |row| row.get(0))?))
            .await
            .unwrap();

        assert_eq!(value, 42);
    }

    #[test]
    fn missing_file_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");

        let result = DbHandle::File(path.clone()).with_connection(|_| Ok(()));

        assert!(matches!(result, Err(DbError::Execution(_))));
        assert!(!path.exists());
    }

    #[test]
    fn pooled_handle_reuses_manager_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pooled.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER);")
            .unwrap();

        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::new(&path))
            .unwrap();
        let handle = DbHandle::Pooled(pool);

        handle
            .with_connection(|conn| Ok(conn.execute("INSERT INTO t VALUES (7)", [])?))
            .unwrap();
        let count: i64 = handle
            .with_connection(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?))
            .unwrap();

        assert_eq!(count, 1);
    }
}
