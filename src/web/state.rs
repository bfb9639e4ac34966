use crate::config::AppConfig;
use crate::db::DbHandle;
use crate::db::registry::DatabaseRegistry;
use crate::sql::SqlContract;
use std::path::PathBuf;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub contract: SqlContract,
    /// Database at `database.path`, if one was found at startup.
    pub default_db: Option<DbHandle>,
    pub databases: DatabaseRegistry,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, contract: SqlContract, default_db: Option<DbHandle>) -> Self {
        let upload_dir = PathBuf::from(&config.data_dir).join("uploads");

        Self {
            config,
            contract,
            default_db,
            databases: DatabaseRegistry::new(upload_dir),
            startup_time: chrono::Utc::now(),
        }
    }
}
