use r2d2::ManageConnection;
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;

/// Hands out connections to one existing SQLite file.
pub struct SqliteConnectionManager {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqliteConnectionManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            // No SQLITE_OPEN_CREATE: a mistyped path must fail instead of creating an empty file.
            flags: OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        }
    }
}

impl ManageConnection for SqliteConnectionManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        Connection::open_with_flags(&self.path, self.flags)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute_batch("SELECT 1")
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
