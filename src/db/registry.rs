use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::db::schema::{self, SchemaDescriptor};
use crate::db::{DbError, DbHandle, is_safe_identifier};

const ACCEPTED_EXTENSIONS: [&str; 3] = ["db", "sqlite", "sqlite3"];

/// A SQLite file uploaded through the API, with its schema discovered once at upload.
#[derive(Debug)]
pub struct UploadedDatabase {
    pub id: String,
    pub path: PathBuf,
    pub schema: Vec<SchemaDescriptor>,
    pub uploaded_at: DateTime<Utc>,
}

impl UploadedDatabase {
    pub fn table(&self, name: &str) -> Option<&SchemaDescriptor> {
        self.schema.iter().find(|table| table.table_name == name)
    }

    pub fn table_names(&self) -> Vec<String> {
        self.schema.iter().map(|t| t.table_name.clone()).collect()
    }

    pub fn handle(&self) -> DbHandle {
        DbHandle::File(self.path.clone())
    }
}

/// Uploaded databases keyed by id. Re-uploading a file with the same stem replaces it.
pub struct DatabaseRegistry {
    upload_dir: PathBuf,
    databases: RwLock<HashMap<String, Arc<UploadedDatabase>>>,
}

impl DatabaseRegistry {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            databases: RwLock::new(HashMap::new()),
        }
    }

    /// Stores `bytes` under an id derived from `file_name` and discovers its schema.
    ///
    /// The file is written to a temporary path first and only moved into place
    /// once it has been read as a SQLite database, so a rejected upload leaves
    /// nothing behind.
    pub async fn register(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Arc<UploadedDatabase>, DbError> {
        let id = database_id(file_name)?;
        let upload_dir = self.upload_dir.clone();
        let target = upload_dir.join(format!("{}.db", id));
        let path = target.clone();

        let schema = tokio::task::spawn_blocking(move || store(&upload_dir, &target, &bytes))
            .await
            .map_err(|e| DbError::Task(e.to_string()))??;

        let database = Arc::new(UploadedDatabase {
            path,
            id: id.clone(),
            schema,
            uploaded_at: Utc::now(),
        });

        info!(
            "Registered database '{}' with tables {:?}",
            id,
            database.table_names()
        );

        self.databases.write().await.insert(id, Arc::clone(&database));
        Ok(database)
    }

    pub async fn get(&self, id: &str) -> Result<Arc<UploadedDatabase>, DbError> {
        self.databases
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DbError::DatabaseNotFound(id.to_string()))
    }

    /// All uploads, sorted by id.
    pub async fn list(&self) -> Vec<Arc<UploadedDatabase>> {
        let mut databases: Vec<_> = self.databases.read().await.values().cloned().collect();
        databases.sort_by(|a, b| a.id.cmp(&b.id));
        databases
    }

    pub async fn len(&self) -> usize {
        self.databases.read().await.len()
    }
}

fn database_id(file_name: &str) -> Result<String, DbError> {
    let path = Path::new(file_name);
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(DbError::InvalidUpload(format!(
            "only .db, .sqlite and .sqlite3 files are supported, got '{}'",
            file_name
        )));
    }

    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default();

    if !is_safe_identifier(stem) {
        return Err(DbError::InvalidIdentifier(stem.to_string()));
    }

    Ok(stem.to_string())
}

fn store(upload_dir: &Path, target: &Path, bytes: &[u8]) -> Result<Vec<SchemaDescriptor>, DbError> {
    std::fs::create_dir_all(upload_dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".upload-")
        .suffix(".db")
        .tempfile_in(upload_dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;

    let schema = {
        let conn = Connection::open_with_flags(temp.path(), OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        schema::discover(&conn)?
    };
    debug!("Discovered {} table(s) in upload", schema.len());

    temp.persist(target).map_err(|e| DbError::Io(e.error))?;
    Ok(schema)
}
