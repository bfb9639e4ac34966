use clap::Parser;
use r2d2::Pool;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

mod cli;
mod config;
mod db;
mod llm;
mod sql;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs, Command};
use crate::db::DbHandle;
use crate::db::db_pool::SqliteConnectionManager;
use crate::sql::{ContractConfig, SqlContract};
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.json_logs);

    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Some(Command::Generate(generate)) => cli::run_generate(config, generate).await,
        Some(Command::Serve) | None => match serve(config).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Server error: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Initializing LLM backend: {} ({})", config.llm.backend, config.llm.model);
    let model = llm::build_model(&config.llm)?;
    let contract = SqlContract::new(model, ContractConfig::from_llm_config(&config.llm));

    let data_dir = PathBuf::from(&config.data_dir);
    if !data_dir.exists() {
        info!("Creating data directory: {}", config.data_dir);
        std::fs::create_dir_all(&data_dir)?;
    }

    let default_db = open_default_pool(&config)?;

    let app_state = Arc::new(AppState::new(config.clone(), contract, default_db));

    info!("Starting NL-SQL server on {}:{}", config.web.host, config.web.port);
    web::run_server(config.web, app_state).await?;
    info!("Server stopped gracefully");

    Ok(())
}

fn open_default_pool(config: &AppConfig) -> Result<Option<DbHandle>, Box<dyn std::error::Error>> {
    let path = Path::new(&config.database.path);
    if !path.exists() {
        warn!(
            "Default database '{}' not found; /api/schema and /api/query are disabled",
            config.database.path
        );
        return Ok(None);
    }

    info!("Initializing SQLite connection pool for {}", path.display());
    let pool = Pool::builder()
        .max_size(config.database.pool_size)
        .build(SqliteConnectionManager::new(path))?;

    let handle = DbHandle::Pooled(pool);
    let tables = handle.with_connection(db::schema::list_tables_with_info)?;
    for table in &tables {
        info!(
            "Table {}: {} row(s), {} column(s)",
            table.name, table.row_count, table.column_count
        );
    }

    Ok(Some(handle))
}
